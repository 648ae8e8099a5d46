//! Cookie timestamps.
//!
//! Two textual forms are in play:
//! - the **bridge form**, `YYYY-MM-DDTHH:MM:SS.mmmZ` (ISO 8601, UTC, millisecond
//!   precision), used for the `expires` field of serialized cookies;
//! - the **header form**, RFC 1123 (`Wed, 21 Oct 2015 07:28:00 GMT`), used by the
//!   `Expires` attribute of `Set-Cookie`.

use time::format_description::well_known::{Iso8601, Rfc2822, Rfc3339};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::engine::errors::CookieError;

const BRIDGE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

const RFC1123_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Formats `t` in the bridge form.
pub fn format_iso8601(t: OffsetDateTime) -> Result<String, time::error::Format> {
    t.to_offset(UtcOffset::UTC).format(BRIDGE_FORMAT)
}

/// Parses an ISO 8601 / RFC 3339 timestamp as sent by the scripting side.
pub fn parse_iso8601(s: &str) -> Result<OffsetDateTime, CookieError> {
    let s = s.trim();
    OffsetDateTime::parse(s, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(s, &Iso8601::DEFAULT))
        .map(truncate_to_millis)
        .map_err(|_| CookieError::validation(format!("Invalid cookie expiry date: {s}")))
}

/// Formats `t` for the `Expires` attribute of a `Set-Cookie` header.
pub fn format_rfc1123(t: OffsetDateTime) -> Result<String, time::error::Format> {
    t.to_offset(UtcOffset::UTC).format(RFC1123_FORMAT)
}

/// Parses the `Expires` attribute of a `Set-Cookie` header.
///
/// RFC 1123 is tried first, then RFC 2822 and RFC 3339. Returns `None` when
/// nothing matches; an unparsable `Expires` is ignored, not an error.
pub fn parse_cookie_date(s: &str) -> Option<OffsetDateTime> {
    let s = s.trim();
    PrimitiveDateTime::parse(s, RFC1123_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc2822))
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
        .ok()
        .map(truncate_to_millis)
}

/// Drops everything below millisecond precision, which is all the bridge form can carry.
pub fn truncate_to_millis(t: OffsetDateTime) -> OffsetDateTime {
    let millis = t.millisecond();
    t.replace_millisecond(millis).unwrap_or(t)
}

/// `serde` adapter for `Option<OffsetDateTime>` in the bridge form.
///
/// Empty strings deserialize as `None`, like an absent field.
pub mod iso8601_option {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(value: &Option<OffsetDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => {
                let formatted = super::format_iso8601(*t).map_err(serde::ser::Error::custom)?;
                s.serialize_some(&formatted)
            }
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<OffsetDateTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => super::parse_iso8601(s).map(Some).map_err(serde::de::Error::custom),
        }
    }
}
