//! JSON bridge to the scripting runtime.
//!
//! The scripting side sends one JSON object per call, tagged by `method`:
//!
//! ```json
//! { "method": "set", "url": "https://example.com", "cookie": { "name": "a", "value": "1" } }
//! { "method": "getAll", "useWebKitEngine": true }
//! ```
//!
//! and receives either `{"ok": true, "value": ...}` or
//! `{"ok": false, "error": {"code": "...", "message": "..."}}`. The reply is the
//! settled value of the Promise on the scripting side.
//!
//! ```rust
//! # use std::sync::Arc;
//! # use gosub_cookies::cookies::InMemoryCookieStore;
//! # use gosub_cookies::{bridge, CookieManager};
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (handle, _workers) = CookieManager::new(None, Arc::new(InMemoryCookieStore::new())).start().unwrap();
//! let reply = bridge::dispatch_json(&handle, r#"{"method": "clearAll"}"#).await;
//! assert_eq!(reply, r#"{"ok":true,"value":true}"#);
//! # }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::cookies::CookieDescriptor;
use crate::engine::errors::CookieError;
use crate::engine::handle::CookieManagerHandle;

/// Method names the bridge answers to.
pub const METHODS: [&str; 8] = [
    "set",
    "setFromResponse",
    "get",
    "getAll",
    "clearByName",
    "clearAll",
    "flush",
    "removeSessionCookies",
];

/// A decoded bridge call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum BridgeCall {
    Set {
        url: String,
        cookie: CookieDescriptor,
        #[serde(default, rename = "useWebKitEngine", alias = "useWebKit")]
        use_webkit: bool,
    },
    SetFromResponse {
        url: String,
        /// Raw `Set-Cookie` header value.
        cookie: String,
    },
    Get {
        url: String,
        #[serde(default, rename = "useWebKitEngine", alias = "useWebKit")]
        use_webkit: bool,
    },
    GetAll {
        #[serde(default, rename = "useWebKitEngine", alias = "useWebKit")]
        use_webkit: bool,
    },
    ClearByName {
        url: String,
        name: String,
        #[serde(default, rename = "useWebKitEngine", alias = "useWebKit")]
        use_webkit: bool,
    },
    ClearAll {
        #[serde(default, rename = "useWebKitEngine", alias = "useWebKit")]
        use_webkit: bool,
    },
    Flush,
    RemoveSessionCookies,
}

/// Error half of a bridge reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeError {
    pub code: String,
    pub message: String,
}

impl From<&CookieError> for BridgeError {
    fn from(err: &CookieError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Decodes a raw JSON call.
///
/// A call without a known `method` is a [`CookieError::NotFound`]; malformed
/// JSON or arguments are a [`CookieError::Validation`].
pub fn parse_call(raw: &str) -> Result<BridgeCall, CookieError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| CookieError::validation(format!("Malformed bridge call: {e}")))?;

    let method = match value.get("method") {
        Some(Value::String(method)) => method.as_str(),
        _ => return Err(CookieError::validation("Bridge call has no method")),
    };
    if !METHODS.contains(&method) {
        return Err(CookieError::NotFound(format!("Unknown bridge method: {method}")));
    }

    let method = method.to_string();
    serde_json::from_value(value)
        .map_err(|e| CookieError::validation(format!("Invalid arguments for {method}: {e}")))
}

/// Executes a decoded call against the manager and returns its JSON value.
pub async fn dispatch(handle: &CookieManagerHandle, call: BridgeCall) -> Result<Value, CookieError> {
    match call {
        BridgeCall::Set { url, cookie, use_webkit } => to_value(handle.set(&url, cookie, use_webkit).await?),
        BridgeCall::SetFromResponse { url, cookie } => to_value(handle.set_from_response(&url, &cookie).await?),
        BridgeCall::Get { url, use_webkit } => to_value(handle.get(&url, use_webkit).await?),
        BridgeCall::GetAll { use_webkit } => to_value(handle.get_all(use_webkit).await?),
        BridgeCall::ClearByName { url, name, use_webkit } => {
            to_value(handle.clear_by_name(&url, &name, use_webkit).await?)
        }
        BridgeCall::ClearAll { use_webkit } => to_value(handle.clear_all(use_webkit).await?),
        BridgeCall::Flush => {
            handle.flush().await?;
            Ok(Value::Null)
        }
        BridgeCall::RemoveSessionCookies => to_value(handle.remove_session_cookies().await?),
    }
}

/// Decodes, executes and encodes one call. Never fails: errors become an
/// `{"ok": false, ...}` reply.
pub async fn dispatch_json(handle: &CookieManagerHandle, raw: &str) -> String {
    let result = match parse_call(raw) {
        Ok(call) => dispatch(handle, call).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(value) => json!({ "ok": true, "value": value }).to_string(),
        Err(e) => {
            log::debug!("Bridge call failed: {e}");
            json!({ "ok": false, "error": BridgeError::from(&e) }).to_string()
        }
    }
}

fn to_value(value: impl Serialize) -> Result<Value, CookieError> {
    serde_json::to_value(value).map_err(|e| CookieError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_calls_with_engine_flag_and_alias() {
        let call = parse_call(r#"{"method":"getAll","useWebKitEngine":true}"#).unwrap();
        assert_eq!(call, BridgeCall::GetAll { use_webkit: true });

        let call = parse_call(r#"{"method":"clearAll","useWebKit":true}"#).unwrap();
        assert_eq!(call, BridgeCall::ClearAll { use_webkit: true });

        let call = parse_call(r#"{"method":"get","url":"https://example.com"}"#).unwrap();
        assert_eq!(
            call,
            BridgeCall::Get {
                url: "https://example.com".into(),
                use_webkit: false
            }
        );

        assert_eq!(parse_call(r#"{"method":"flush"}"#).unwrap(), BridgeCall::Flush);
    }

    #[test]
    fn parses_cookie_descriptor() {
        let call = parse_call(
            r#"{"method":"set","url":"https://example.com","cookie":{"name":"a","value":"1","httpOnly":true,"expiration":"2030-01-01T00:00:00.000Z"}}"#,
        )
        .unwrap();

        let BridgeCall::Set { cookie, use_webkit, .. } = call else {
            panic!("expected a set call");
        };
        assert!(!use_webkit);
        assert_eq!(cookie.name, "a");
        assert_eq!(cookie.http_only, Some(true));
        assert_eq!(cookie.expires.as_deref(), Some("2030-01-01T00:00:00.000Z"));
    }

    #[test]
    fn unknown_method_is_not_found() {
        let err = parse_call(r#"{"method":"getFromResponse","url":"https://example.com"}"#).unwrap_err();
        assert_eq!(err.code(), "NotFoundError");
    }

    #[test]
    fn malformed_calls_are_validation_errors() {
        assert_eq!(parse_call("not json").unwrap_err().code(), "ValidationError");
        assert_eq!(parse_call(r#"{"url":"x"}"#).unwrap_err().code(), "ValidationError");
        assert_eq!(parse_call(r#"{"method":"get"}"#).unwrap_err().code(), "ValidationError");
    }

    #[test]
    fn bridge_error_carries_code_and_message() {
        let err = BridgeError::from(&CookieError::validation("bad name"));
        assert_eq!(
            err,
            BridgeError {
                code: "ValidationError".into(),
                message: "bad name".into()
            }
        );
    }
}
