//! crates/lp_core/src/fields.rs
//! The request field table: one ordered list of keys with one rule each.
//!
//! The same table drives validation, canonical (fingerprint) serialization and
//! the packed URL codec, so all three agree on what a request is and in which
//! order its fields appear. Adding a field means adding it here, nowhere else.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::time::parse_utc_timestamp;

/// Untrusted input value: forms and query strings give text, JSON gives numbers.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self { RawValue::Number(v) }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self { RawValue::Text(v.to_string()) }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self { RawValue::Text(v) }
}

/// Raw key/value input. Key order is irrelevant; the field table fixes it.
pub type RawRequest = BTreeMap<String, RawValue>;

/// Recognized request fields, in canonical order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Field {
    LaunchLatitude,
    LaunchLongitude,
    LaunchAltitude,
    LaunchDatetime,
    AscentRate,
    BurstAltitude,
    DescentRate,
}

/// One end of a numeric interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bound {
    Inclusive(f64),
    Exclusive(f64),
}

/// Numeric domain with the message to report when each end is violated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    pub lo: Bound,
    pub hi: Bound,
    pub below: &'static str,
    pub above: &'static str,
}

impl Interval {
    fn check(&self, x: f64) -> Result<(), &'static str> {
        let lo_ok = match self.lo {
            Bound::Inclusive(b) => x >= b,
            Bound::Exclusive(b) => x > b,
        };
        if !lo_ok { return Err(self.below); }
        let hi_ok = match self.hi {
            Bound::Inclusive(b) => x <= b,
            Bound::Exclusive(b) => x < b,
        };
        if !hi_ok { return Err(self.above); }
        Ok(())
    }
}

/// What kind of value a field holds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Domain {
    Number(Interval),
    Timestamp,
}

/// A checked field value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Instant(DateTime<Utc>),
}

pub const MSG_MISSING: &str = "Missing value";
pub const MSG_NOT_A_NUMBER: &str = "Not a number";
pub const MSG_BAD_TIMESTAMP: &str = "Not a UTC timestamp (YYYY-MM-DDTHH:MM:SSZ)";

const LATITUDE: Interval = Interval {
    lo: Bound::Inclusive(-90.0),
    hi: Bound::Inclusive(90.0),
    below: "Illegal latitude (should be decimal degrees)",
    above: "Illegal latitude (should be decimal degrees)",
};

const LONGITUDE: Interval = Interval {
    lo: Bound::Inclusive(-180.0),
    hi: Bound::Exclusive(360.0),
    below: "Illegal longitude (should be decimal degrees)",
    above: "Illegal longitude (should be decimal degrees)",
};

const ALTITUDE: Interval = Interval {
    lo: Bound::Exclusive(0.0),
    hi: Bound::Inclusive(50_000.0),
    below: "Must be positive",
    above: "Too large",
};

const RATE: Interval = Interval {
    lo: Bound::Exclusive(0.0),
    hi: Bound::Exclusive(50.0),
    below: "Must be positive",
    above: "Implausibly large",
};

impl Field {
    /// Canonical order. Fingerprints and packed URLs depend on it.
    pub const ALL: [Field; 7] = [
        Field::LaunchLatitude,
        Field::LaunchLongitude,
        Field::LaunchAltitude,
        Field::LaunchDatetime,
        Field::AscentRate,
        Field::BurstAltitude,
        Field::DescentRate,
    ];

    /// Wire key.
    pub const fn key(self) -> &'static str {
        match self {
            Field::LaunchLatitude => "launch_latitude",
            Field::LaunchLongitude => "launch_longitude",
            Field::LaunchAltitude => "launch_altitude",
            Field::LaunchDatetime => "launch_datetime",
            Field::AscentRate => "ascent_rate",
            Field::BurstAltitude => "burst_altitude",
            Field::DescentRate => "descent_rate",
        }
    }

    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.key() == key)
    }

    pub const fn domain(self) -> Domain {
        match self {
            Field::LaunchLatitude => Domain::Number(LATITUDE),
            Field::LaunchLongitude => Domain::Number(LONGITUDE),
            Field::LaunchAltitude | Field::BurstAltitude => Domain::Number(ALTITUDE),
            Field::AscentRate | Field::DescentRate => Domain::Number(RATE),
            Field::LaunchDatetime => Domain::Timestamp,
        }
    }

    /// Apply this field's rule to one raw value.
    pub fn check(self, raw: &RawValue) -> Result<FieldValue, &'static str> {
        match self.domain() {
            Domain::Number(interval) => {
                let x = legal_number(raw).ok_or(MSG_NOT_A_NUMBER)?;
                interval.check(x)?;
                Ok(FieldValue::Number(x))
            }
            Domain::Timestamp => match raw {
                RawValue::Text(s) => parse_utc_timestamp(s)
                    .map(FieldValue::Instant)
                    .ok_or(MSG_BAD_TIMESTAMP),
                RawValue::Number(_) => Err(MSG_BAD_TIMESTAMP),
            },
        }
    }
}

/// Finite number from either representation; `"inf"`/`"NaN"` are not legal.
fn legal_number(raw: &RawValue) -> Option<f64> {
    let x = match raw {
        RawValue::Number(x) => *x,
        RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
    };
    x.is_finite().then_some(x)
}
