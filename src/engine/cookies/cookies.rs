//! Cookie core types.
//!
//! This module defines the **type-erased handles** used by the workers and the
//! stores, the serializable [`Cookie`] record and the [`CookieDescriptor`] the
//! scripting side sends in.
//!
//! # Concurrency model
//! - [`CookieJarHandle`] is `Arc<RwLock<dyn CookieJar + Send + Sync>>`.
//!   Only the engine worker that owns the jar takes the **write lock**; stores
//!   take a **read lock** to snapshot it during `persist_all`.
//! - [`CookieStoreHandle`] is `Arc<dyn CookieStore + Send + Sync>`.
//!   Stores manage their own internal synchronization; the trait methods take `&self`.
//!
//! The [`Cookie`] struct is what callers receive. It serializes to the bridge
//! shape (`httpOnly`, ISO 8601 `expires`, absent optional fields omitted):
//!
//! ```rust
//! use gosub_cookies::cookies::Cookie;
//!
//! let c = Cookie::new("session", "abc123", "example.com");
//! let json = serde_json::to_value(&c).unwrap();
//! assert_eq!(json["path"], "/");
//! assert_eq!(json["httpOnly"], false);
//! assert!(json.get("expires").is_none());
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

use crate::engine::cookies::dates;
use crate::engine::cookies::store::CookieStore;
use crate::engine::cookies::validate;
use crate::engine::cookies::CookieJar;
use crate::engine::errors::CookieError;

/// A handle to a cookie jar trait object.
///
/// Reference-counted and read/write-locked. Locks are only ever held for
/// short synchronous sections, never across an `.await`.
pub type CookieJarHandle = Arc<RwLock<dyn CookieJar + Send + Sync>>;

/// A handle to a cookie store trait object.
///
/// Store implementations must be **`Send + Sync` and internally synchronized**,
/// since callers hold only `&self` when invoking trait methods.
pub type CookieStoreHandle = Arc<dyn CookieStore + Send + Sync>;

/// Cookies keyed by name, as returned by `get` and `get_all`.
pub type CookieMap = BTreeMap<String, Cookie>;

/// A cookie as stored by the jar and handed to callers.
///
/// `(name, domain, path)` identifies a cookie within one jar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Cookie name (case-sensitive).
    pub name: String,

    /// Raw cookie value (not URL-decoded).
    pub value: String,

    /// Domain scope, lower-case, without a leading dot.
    pub domain: String,

    /// Path scope, always starts with `/`.
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Expiration timestamp. Session cookies have `None`.
    #[serde(default, with = "dates::iso8601_option", skip_serializing_if = "Option::is_none")]
    pub expires: Option<OffsetDateTime>,

    /// If `true`, the cookie is only sent over HTTPS.
    #[serde(default)]
    pub secure: bool,

    /// If `true`, the cookie is hidden from page scripts. Informational only.
    #[serde(default)]
    pub http_only: bool,
}

impl Cookie {
    /// A session cookie with path `/` and no flags.
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
            version: None,
            expires: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn is_session(&self) -> bool {
        self.expires.is_none()
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    /// Whether `other` has the same `(name, domain, path)` identity.
    pub fn same_identity(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    /// Whether this cookie would be sent with a request to `url`: domain match,
    /// path match, and `https` for secure cookies.
    pub fn matches_url(&self, url: &Url) -> bool {
        let host = validate::url_host(url);
        validate::domain_matches(&host, &self.domain)
            && validate::path_matches(url.path(), &self.path)
            && (!self.secure || url.scheme() == "https")
    }
}

/// Renders the cookie as an RFC 6265 `Set-Cookie` header value.
impl Display for Cookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(expires) = self.expires.and_then(|t| dates::format_rfc1123(t).ok()) {
            write!(f, "; expires={expires}")?;
        }
        write!(f, "; domain={}; path={}", self.domain, self.path)?;
        if self.secure {
            f.write_str("; secure")?;
        }
        if self.http_only {
            f.write_str("; httponly")?;
        }
        Ok(())
    }
}

/// Builds a [`CookieMap`]. When names collide the most specific cookie wins:
/// longest path first, then longest domain.
pub fn cookie_map(mut cookies: Vec<Cookie>) -> CookieMap {
    cookies.sort_by(|a, b| {
        b.path
            .len()
            .cmp(&a.path.len())
            .then_with(|| b.domain.len().cmp(&a.domain.len()))
    });

    let mut map = CookieMap::new();
    for cookie in cookies {
        map.entry(cookie.name.clone()).or_insert(cookie);
    }
    map
}

/// A cookie as described by the scripting side in a `set` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieDescriptor {
    pub name: String,
    #[serde(default)]
    pub value: String,
    /// Defaults to the host of the URL the cookie is set for.
    #[serde(default)]
    pub domain: Option<String>,
    /// Defaults to `/`.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// ISO 8601 timestamp.
    #[serde(default, alias = "expiration", alias = "expiresAt")]
    pub expires: Option<String>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default)]
    pub http_only: Option<bool>,
}

impl CookieDescriptor {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn expires(mut self, expires: impl Into<String>) -> Self {
        self.expires = Some(expires.into());
        self
    }

    pub fn secure(mut self, on: bool) -> Self {
        self.secure = Some(on);
        self
    }

    pub fn http_only(mut self, on: bool) -> Self {
        self.http_only = Some(on);
        self
    }

    /// Validates the descriptor against the URL it is set for and normalizes it
    /// into a [`Cookie`].
    pub fn into_cookie(self, url: &Url) -> Result<Cookie, CookieError> {
        validate::validate_name(&self.name)?;

        let host = validate::url_host(url);
        let domain = match self.domain.as_deref().map(str::trim) {
            Some(domain) if !domain.is_empty() => validate::normalize_domain(domain)?,
            _ => validate::normalize_domain(&host)?,
        };
        if !validate::domain_matches(&host, &domain) {
            return Err(CookieError::validation(format!(
                "Cookie URL host {host} and domain {domain} mismatched. The cookie won't set correctly."
            )));
        }

        let path = match self.path.as_deref().map(str::trim) {
            None | Some("") => "/".to_string(),
            Some(path) if path.starts_with('/') => path.to_string(),
            Some(path) => {
                return Err(CookieError::validation(format!("Cookie path must start with '/': {path:?}")))
            }
        };

        let expires = match self.expires.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(dates::parse_iso8601(raw)?),
        };

        Ok(Cookie {
            name: self.name,
            value: self.value,
            domain,
            path,
            version: self.version.filter(|v| !v.is_empty()),
            expires,
            secure: self.secure.unwrap_or(false),
            http_only: self.http_only.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn descriptor_defaults_domain_and_path() {
        let cookie = CookieDescriptor::new("session", "abc123")
            .into_cookie(&url("https://www.example.com/account"))
            .unwrap();
        assert_eq!(cookie.domain, "www.example.com");
        assert_eq!(cookie.path, "/");
        assert!(!cookie.secure);
        assert!(!cookie.http_only);
        assert!(cookie.is_session());
    }

    #[test]
    fn descriptor_strips_leading_dot_and_checks_host() {
        let cookie = CookieDescriptor::new("a", "1")
            .domain(".Example.com")
            .into_cookie(&url("https://www.example.com/"))
            .unwrap();
        assert_eq!(cookie.domain, "example.com");

        let err = CookieDescriptor::new("a", "1")
            .domain("other.org")
            .into_cookie(&url("https://www.example.com/"))
            .unwrap_err();
        assert_eq!(err.code(), "ValidationError");
        assert!(err.to_string().contains("mismatched"));
    }

    #[test]
    fn descriptor_rejects_bad_input() {
        let u = url("https://example.com/");
        assert!(CookieDescriptor::new("", "1").into_cookie(&u).is_err());
        assert!(CookieDescriptor::new("a=b", "1").into_cookie(&u).is_err());
        assert!(CookieDescriptor::new("a", "1").path("docs").into_cookie(&u).is_err());
        assert!(CookieDescriptor::new("a", "1").expires("soon").into_cookie(&u).is_err());
    }

    #[test]
    fn descriptor_deserializes_bridge_fields() {
        let json = r#"{
            "name": "a", "value": "1", "domain": "example.com", "path": "/x",
            "version": "1", "expiration": "2030-01-01T00:00:00.000Z",
            "secure": true, "httpOnly": true
        }"#;
        let descriptor: CookieDescriptor = serde_json::from_str(json).unwrap();
        let cookie = descriptor.into_cookie(&url("https://example.com/x")).unwrap();
        assert_eq!(cookie.path, "/x");
        assert_eq!(cookie.version.as_deref(), Some("1"));
        assert_eq!(cookie.expires, Some(datetime!(2030-01-01 00:00:00 UTC)));
        assert!(cookie.secure && cookie.http_only);
    }

    #[test]
    fn serialized_shape() {
        let mut c = Cookie::new("session", "abc123", "example.com");
        c.expires = Some(datetime!(2030-01-01 00:00:00 UTC));
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "session",
                "value": "abc123",
                "domain": "example.com",
                "path": "/",
                "expires": "2030-01-01T00:00:00.000Z",
                "secure": false,
                "httpOnly": false
            })
        );
        let back: Cookie = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn url_matching_honors_secure() {
        let mut c = Cookie::new("a", "1", "example.com");
        c.path = "/docs".into();
        assert!(c.matches_url(&url("http://www.example.com/docs/x")));
        assert!(!c.matches_url(&url("http://www.example.com/other")));
        c.secure = true;
        assert!(!c.matches_url(&url("http://example.com/docs")));
        assert!(c.matches_url(&url("https://example.com/docs")));
    }

    #[test]
    fn expiry() {
        let now = datetime!(2025-06-01 00:00:00 UTC);
        let mut c = Cookie::new("a", "1", "example.com");
        assert!(!c.is_expired_at(now));
        c.expires = Some(datetime!(2025-01-01 00:00:00 UTC));
        assert!(c.is_expired_at(now));
    }

    #[test]
    fn most_specific_cookie_wins_name_collisions() {
        let mut root = Cookie::new("id", "root", "example.com");
        let mut deep = Cookie::new("id", "deep", "example.com");
        deep.path = "/account".into();
        let sub = Cookie::new("id", "sub", "www.example.com");
        root.secure = true;

        let map = cookie_map(vec![root.clone(), sub.clone(), deep.clone()]);
        assert_eq!(map.len(), 1);
        assert_eq!(map["id"].value, "deep");

        let map = cookie_map(vec![root, sub]);
        assert_eq!(map["id"].value, "sub");
    }

    #[test]
    fn display_renders_set_cookie() {
        let mut c = Cookie::new("a", "1", "example.com");
        c.expires = Some(datetime!(2015-10-21 07:28:00 UTC));
        c.secure = true;
        c.http_only = true;
        assert_eq!(
            c.to_string(),
            "a=1; expires=Wed, 21 Oct 2015 07:28:00 GMT; domain=example.com; path=/; secure; httponly"
        );
    }
}
