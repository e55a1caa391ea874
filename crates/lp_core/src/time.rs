//! crates/lp_core/src/time.rs
//! UTC timestamp shape, parsing and launch-hour arithmetic.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

/// Wire format for launch and trajectory instants.
pub const UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Strict RFC3339 "YYYY-MM-DDTHH:MM:SSZ"
#[inline]
pub fn is_rfc3339_utc_20(ts: &str) -> bool {
    let b = ts.as_bytes();
    if b.len() != 20 { return false; }
    let digits = |r: core::ops::Range<usize>| b[r].iter().all(|c| c.is_ascii_digit());
    digits(0..4)
        && b[4] == b'-'
        && digits(5..7)
        && b[7] == b'-'
        && digits(8..10)
        && b[10] == b'T'
        && digits(11..13)
        && b[13] == b':'
        && digits(14..16)
        && b[16] == b':'
        && digits(17..19)
        && b[19] == b'Z'
}

/// Shape check first, then calendar check (rejects 2025-02-30 etc.).
pub fn parse_utc_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if !is_rfc3339_utc_20(ts) { return None; }
    let naive = NaiveDateTime::parse_from_str(&ts[..19], "%Y-%m-%dT%H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

#[inline]
pub fn format_utc(t: &DateTime<Utc>) -> String {
    t.format(UTC_FORMAT).to_string()
}

/// Truncate to the start of the enclosing UTC hour.
pub fn hour_floor(t: DateTime<Utc>) -> DateTime<Utc> {
    let secs = t.timestamp();
    let floored = secs - secs.rem_euclid(3600);
    Utc.timestamp_opt(floored, 0).single().unwrap_or(t)
}

#[inline]
pub fn next_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    t + Duration::hours(1)
}

/// Drop sub-second precision; launch instants are whole seconds.
pub fn truncate_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_opt(t.timestamp(), 0).single().unwrap_or(t)
}

/// Serde adapter for `DateTime<Utc>` in the 20-char wire format.
#[cfg(feature = "serde")]
pub mod rfc3339 {
    use chrono::{DateTime, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_utc(t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_utc_timestamp(&raw)
            .ok_or_else(|| D::Error::custom(format!("bad UTC timestamp: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_and_calendar() {
        assert!(parse_utc_timestamp("2025-03-01T12:00:00Z").is_some());
        assert!(parse_utc_timestamp("2025-03-01T12:00:00").is_none());
        assert!(parse_utc_timestamp("2025-03-01 12:00:00Z").is_none());
        assert!(parse_utc_timestamp("2025-03-01T12:00:00+00:00").is_none());
        assert!(parse_utc_timestamp("2025-02-30T12:00:00Z").is_none());
        assert!(parse_utc_timestamp("2025-03-01T24:00:00Z").is_none());
    }

    #[test]
    fn floor_and_advance() {
        let t = parse_utc_timestamp("2025-03-01T12:34:56Z").unwrap();
        let h = hour_floor(t);
        assert_eq!(format_utc(&h), "2025-03-01T12:00:00Z");
        assert_eq!(format_utc(&next_hour(h)), "2025-03-01T13:00:00Z");
        assert_eq!(hour_floor(h), h);
    }

    #[test]
    fn advance_crosses_midnight() {
        let t = parse_utc_timestamp("2025-12-31T23:00:00Z").unwrap();
        assert_eq!(format_utc(&next_hour(t)), "2026-01-01T00:00:00Z");
    }
}
