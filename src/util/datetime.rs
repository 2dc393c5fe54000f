use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Text form used for storage and persisted configs.
///
/// Fixed-width up to the seconds field, so SQLite `TEXT` comparison orders
/// values chronologically. Fractional seconds are only printed when non-zero.
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 date or datetime into a naive broadcast-local datetime.
///
/// Accepts `2024-04-01`, `2024-04-01T21:00:00`, `2024-04-01 21:00`, and
/// RFC 3339 strings with an offset (the offset is dropped, the wall-clock
/// time is kept). A bare date means midnight.
pub fn parse_iso_datetime(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let s = s.trim();
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(chrono::NaiveTime::MIN))
}

/// Format a datetime in the storage text form.
pub fn format_iso_datetime(dt: &NaiveDateTime) -> String {
    dt.format(ISO_FORMAT).to_string()
}

/// `#[serde(with = "...")]` adapter for `NaiveDateTime` fields.
pub mod serde_iso_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_iso_datetime(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_iso_datetime(&raw).map_err(serde::de::Error::custom)
    }
}
