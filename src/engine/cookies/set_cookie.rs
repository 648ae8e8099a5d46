//! `Set-Cookie` header parsing.
//!
//! Handles a subset of RFC 6265 §5.2: `Expires`, `Max-Age`, `Domain`, `Path`,
//! `Secure`, `HttpOnly` and the legacy `Version` attribute. Everything else
//! (`SameSite`, `Priority`, ...) is ignored.

use time::{Duration, OffsetDateTime};
use url::Url;

use crate::engine::cookies::{dates, validate, Cookie};
use crate::engine::errors::CookieError;

/// Parses one `Set-Cookie` header value received from `url`.
///
/// `now` anchors `Max-Age`. A `Max-Age` of zero or less yields a cookie that is
/// already expired, which the jar treats as a deletion.
pub fn parse_set_cookie(header: &str, url: &Url, now: OffsetDateTime) -> Result<Cookie, CookieError> {
    let mut parts = header.split(';');
    let pair = parts.next().unwrap_or_default();
    let Some((name, value)) = pair.split_once('=') else {
        return Err(CookieError::validation(format!("Malformed Set-Cookie header: {header:?}")));
    };

    let name = name.trim();
    validate::validate_name(name)?;

    let host = validate::url_host(url);
    let mut cookie = Cookie::new(name, value.trim(), host.clone());
    cookie.path = validate::default_path(url);

    let mut expires_attr = None;
    let mut max_age = None;

    for part in parts {
        let part = part.trim();
        let (key, val) = match part.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (part, ""),
        };

        match key.to_ascii_lowercase().as_str() {
            "expires" => expires_attr = dates::parse_cookie_date(val),
            "max-age" => {
                // RFC 6265: a non-integer Max-Age is ignored
                if let Ok(seconds) = val.parse::<i64>() {
                    max_age = Some(seconds);
                }
            }
            "domain" if !val.is_empty() => {
                let domain = validate::normalize_domain(val)?;
                if !validate::domain_matches(&host, &domain) {
                    return Err(CookieError::validation(format!(
                        "Cookie URL host {host} and domain {domain} mismatched. The cookie won't set correctly."
                    )));
                }
                cookie.domain = domain;
            }
            // the last Path attribute wins, a relative one resets to the default path
            "path" if val.starts_with('/') => cookie.path = val.to_string(),
            "path" => cookie.path = validate::default_path(url),
            "secure" => cookie.secure = true,
            "httponly" => cookie.http_only = true,
            "version" if !val.is_empty() => cookie.version = Some(val.trim_matches('"').to_string()),
            _ => {}
        }
    }

    cookie.expires = match max_age {
        Some(seconds) if seconds <= 0 => Some(OffsetDateTime::UNIX_EPOCH),
        Some(seconds) => Some(dates::truncate_to_millis(now.saturating_add(Duration::seconds(seconds)))),
        None => expires_attr,
    };

    Ok(cookie)
}
