//! Input validation and RFC 6265 matching rules.

use url::{Host, Url};

use crate::engine::errors::CookieError;

pub(crate) const INVALID_URL_MISSING_HTTP: &str =
    "Invalid URL: It may be missing a protocol (ex. http:// or https://).";

/// Parses a URL handed over by the scripting side. Only `http` and `https`
/// URLs with a host are accepted.
pub fn parse_url(raw: &str) -> Result<Url, CookieError> {
    let url = Url::parse(raw.trim()).map_err(|_| CookieError::validation(INVALID_URL_MISSING_HTTP))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CookieError::validation(INVALID_URL_MISSING_HTTP));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(CookieError::validation(INVALID_URL_MISSING_HTTP)),
    }
}

/// Lower-cased host of `url`, which [`parse_url`] guarantees to exist.
pub(crate) fn url_host(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_ascii_lowercase()
}

/// A cookie name must be non-empty and free of control characters, `=` and `;`.
pub fn validate_name(name: &str) -> Result<(), CookieError> {
    if name.is_empty() {
        return Err(CookieError::validation("Cookie name must not be empty"));
    }
    if let Some(bad) = name.chars().find(|c| c.is_control() || *c == '=' || *c == ';') {
        return Err(CookieError::validation(format!(
            "Cookie name {name:?} contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

/// Strips a leading dot, lower-cases and checks that `domain` is a plausible host.
pub fn normalize_domain(domain: &str) -> Result<String, CookieError> {
    let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
    let invalid = || CookieError::validation(format!("Invalid cookie domain: {domain:?}"));

    if domain.is_empty() || domain.len() > 253 {
        return Err(invalid());
    }

    if domain.starts_with('[') {
        return match Host::parse(&domain) {
            Ok(Host::Ipv6(_)) => Ok(domain),
            _ => Err(invalid()),
        };
    }

    let labels_ok = domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    });
    if !labels_ok {
        return Err(invalid());
    }
    Ok(domain)
}

/// RFC 6265 §5.1.3 domain matching: `host` equals `domain` or is a subdomain of it.
/// IP hosts only match exactly.
pub fn domain_matches(host: &str, domain: &str) -> bool {
    if host.eq_ignore_ascii_case(domain) {
        return true;
    }
    if host.starts_with('[') || host.parse::<std::net::Ipv4Addr>().is_ok() {
        return false;
    }
    host.len() > domain.len()
        && host.to_ascii_lowercase().ends_with(&domain.to_ascii_lowercase())
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

/// RFC 6265 §5.1.4 path matching.
pub fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

/// RFC 6265 §5.1.4 default path: the request path up to (not including) its last `/`.
pub fn default_path(url: &Url) -> String {
    let path = url.path();
    if !path.starts_with('/') {
        return "/".to_string();
    }
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}
