//! Commands sent from a [`CookieManagerHandle`](crate::CookieManagerHandle) to
//! an engine worker.
//!
//! Every command carries a `oneshot` sender on which the worker delivers the
//! result. Arguments are already validated and normalized by the handle, so a
//! worker only ever sees well-formed cookies and URLs.

use std::fmt::{Debug, Formatter};

use http::HeaderMap;
use tokio::sync::oneshot;
use url::Url;

use crate::engine::cookies::{Cookie, CookieMap};
use crate::engine::errors::CookieError;

/// Reply channel of a command.
pub type Reply<T> = oneshot::Sender<Result<T, CookieError>>;

pub enum CookieCommand {
    // ****************************************
    // ** Mutations
    /// Insert or overwrite a cookie. An expired cookie deletes its identity.
    Set { cookie: Cookie, reply: Reply<bool> },
    /// Store every `Set-Cookie` header of a response. Replies with the number stored.
    StoreResponse {
        url: Url,
        headers: HeaderMap,
        reply: Reply<usize>,
    },
    /// Remove every cookie named `name` that is visible to `url`.
    ClearByName {
        url: Url,
        name: String,
        reply: Reply<bool>,
    },
    /// Remove all cookies.
    ClearAll { reply: Reply<bool> },
    /// Remove every cookie without an expiry. Replies with the number removed.
    RemoveSessionCookies { reply: Reply<usize> },

    // ****************************************
    // ** Queries
    /// Cookies visible to `url`.
    Get { url: Url, reply: Reply<CookieMap> },
    /// All non-expired cookies.
    GetAll { reply: Reply<CookieMap> },

    // ****************************************
    // ** Worker control
    /// Write buffered changes to the store.
    Flush { reply: Reply<()> },
    /// Flush and stop the worker.
    Shutdown { reply: Reply<()> },
}

impl Debug for CookieCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CookieCommand::Set { cookie, .. } => write!(f, "Set({}@{}{})", cookie.name, cookie.domain, cookie.path),
            CookieCommand::StoreResponse { url, headers, .. } => {
                write!(f, "StoreResponse({url}, {} headers)", headers.len())
            }
            CookieCommand::ClearByName { url, name, .. } => write!(f, "ClearByName({url}, {name})"),
            CookieCommand::ClearAll { .. } => f.write_str("ClearAll"),
            CookieCommand::RemoveSessionCookies { .. } => f.write_str("RemoveSessionCookies"),
            CookieCommand::Get { url, .. } => write!(f, "Get({url})"),
            CookieCommand::GetAll { .. } => f.write_str("GetAll"),
            CookieCommand::Flush { .. } => f.write_str("Flush"),
            CookieCommand::Shutdown { .. } => f.write_str("Shutdown"),
        }
    }
}
