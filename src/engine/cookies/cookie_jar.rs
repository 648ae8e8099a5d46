//! Cookie jar abstraction and a simple in-memory implementation.
//!
//! A **cookie jar** holds every cookie of one cookie engine. The engine worker
//! is the only writer; it hands the jar validated [`Cookie`]s, response headers
//! to parse, or URLs to query.
//!
//! [`DefaultCookieJar`] keeps cookies **in memory only**. Persistence is added by
//! wrapping it in a [`PersistentCookieJar`](crate::cookies::PersistentCookieJar).
//!
//! ## Notes
//! - Cookies are bucketed by **domain**. Within a bucket a cookie is identified
//!   by `(name, path)`, so the jar-wide identity is `(name, domain, path)`.
//! - Expired cookies are never returned. They are dropped when a write touches
//!   their identity, or in bulk by [`CookieJar::purge_expired`].
//! - This module is **not** internally synchronized. Use it via a
//!   `CookieJarHandle = Arc<RwLock<dyn CookieJar + Send + Sync>>`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

use crate::engine::cookies::set_cookie::parse_set_cookie;
use crate::engine::cookies::{Cookie, CookieJarHandle};
use crate::engine::errors::CookieError;

/// A cookie jar keeps the cookies for one single cookie engine.
///
/// Mutating methods return `Result` because jars decorated with persistence
/// may fail to reach their storage; the in-memory jar never fails.
pub trait CookieJar: Send + Sync {
    /// Inserts `cookie`, replacing any cookie with the same `(name, domain, path)`.
    ///
    /// A cookie that is already expired removes the matching identity instead.
    fn set_cookie(&mut self, cookie: Cookie) -> Result<(), CookieError>;

    /// Stores all cookies from the `Set-Cookie` headers of a response from `url`.
    ///
    /// Malformed headers are skipped. Returns the number of cookies stored.
    fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap) -> Result<usize, CookieError>;

    /// Non-expired cookies that would be sent with a request to `url`.
    fn cookies_for_url(&self, url: &Url) -> Vec<Cookie>;

    /// Every non-expired cookie in the jar.
    fn all_cookies(&self) -> Vec<Cookie>;

    /// Drops expired cookies. Returns how many were removed.
    fn purge_expired(&mut self) -> Result<usize, CookieError>;

    /// Removes every cookie named `name` that is visible to `url`.
    /// Returns how many were removed; zero is not an error.
    fn remove_cookie(&mut self, url: &Url, name: &str) -> Result<usize, CookieError>;

    /// Removes every cookie without an expiry. Returns how many were removed.
    fn remove_session_cookies(&mut self) -> Result<usize, CookieError>;

    /// Removes all cookies from the jar.
    fn clear(&mut self) -> Result<(), CookieError>;

    /// Pushes any buffered state to durable storage. No-op for in-memory jars.
    fn flush(&mut self) -> Result<(), CookieError> {
        Ok(())
    }

    /// A clone of the current state, used for persistence.
    fn snapshot(&self) -> DefaultCookieJar;
}

/// Default cookie jar which holds the cookies of a single engine in memory.
///
/// This is also the snapshot format that stores persist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultCookieJar {
    /// Cookies bucketed by domain.
    pub entries: HashMap<String, Vec<Cookie>>,
}

impl DefaultCookieJar {
    /// Creates an empty in-memory cookie jar.
    pub fn new() -> Self {
        DefaultCookieJar {
            entries: HashMap::new(),
        }
    }

    /// Wraps the jar in a [`CookieJarHandle`].
    pub fn into_handle(self) -> CookieJarHandle {
        Arc::new(RwLock::new(self))
    }

    /// Number of cookies, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    pub fn set_cookie_at(&mut self, cookie: Cookie, now: OffsetDateTime) {
        let bucket = self.entries.entry(cookie.domain.clone()).or_default();
        let existing = bucket.iter().position(|c| c.same_identity(&cookie));

        match (existing, cookie.is_expired_at(now)) {
            (Some(idx), true) => {
                bucket.remove(idx);
            }
            (Some(idx), false) => bucket[idx] = cookie,
            (None, true) => {}
            (None, false) => bucket.push(cookie),
        }

        self.entries.retain(|_, bucket| !bucket.is_empty());
    }

    pub fn cookies_for_url_at(&self, url: &Url, now: OffsetDateTime) -> Vec<Cookie> {
        self.entries
            .values()
            .flatten()
            .filter(|c| !c.is_expired_at(now) && c.matches_url(url))
            .cloned()
            .collect()
    }

    pub fn all_cookies_at(&self, now: OffsetDateTime) -> Vec<Cookie> {
        self.entries
            .values()
            .flatten()
            .filter(|c| !c.is_expired_at(now))
            .cloned()
            .collect()
    }

    pub fn purge_expired_at(&mut self, now: OffsetDateTime) -> usize {
        self.remove_where(|c| c.is_expired_at(now))
    }

    fn remove_where(&mut self, mut pred: impl FnMut(&Cookie) -> bool) -> usize {
        let before = self.len();
        for bucket in self.entries.values_mut() {
            bucket.retain(|c| !pred(c));
        }
        self.entries.retain(|_, bucket| !bucket.is_empty());
        before - self.len()
    }
}

impl CookieJar for DefaultCookieJar {
    fn set_cookie(&mut self, cookie: Cookie) -> Result<(), CookieError> {
        self.set_cookie_at(cookie, OffsetDateTime::now_utc());
        Ok(())
    }

    fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap) -> Result<usize, CookieError> {
        let now = OffsetDateTime::now_utc();
        let mut stored = 0;

        for header in headers.get_all(http::header::SET_COOKIE) {
            let Ok(header_str) = header.to_str() else {
                log::warn!("Skipping non-ASCII Set-Cookie header from {url}");
                continue;
            };
            match parse_set_cookie(header_str, url, now) {
                Ok(cookie) => {
                    self.set_cookie_at(cookie, now);
                    stored += 1;
                }
                Err(e) => log::warn!("Skipping Set-Cookie header from {url}: {e}"),
            }
        }

        Ok(stored)
    }

    fn cookies_for_url(&self, url: &Url) -> Vec<Cookie> {
        self.cookies_for_url_at(url, OffsetDateTime::now_utc())
    }

    fn all_cookies(&self) -> Vec<Cookie> {
        self.all_cookies_at(OffsetDateTime::now_utc())
    }

    fn purge_expired(&mut self) -> Result<usize, CookieError> {
        Ok(self.purge_expired_at(OffsetDateTime::now_utc()))
    }

    fn remove_cookie(&mut self, url: &Url, name: &str) -> Result<usize, CookieError> {
        Ok(self.remove_where(|c| c.name == name && c.matches_url(url)))
    }

    fn remove_session_cookies(&mut self) -> Result<usize, CookieError> {
        Ok(self.remove_where(Cookie::is_session))
    }

    fn clear(&mut self) -> Result<(), CookieError> {
        self.entries.clear();
        Ok(())
    }

    fn snapshot(&self) -> DefaultCookieJar {
        self.clone()
    }
}
