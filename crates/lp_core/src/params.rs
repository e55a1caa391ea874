//! crates/lp_core/src/params.rs
//! Validated request parameters and the closed-schema validator.
//!
//! `validate` is the one rule set used by client pre-submit checks, the
//! server's authoritative check, and the packed URL decoder. It never stops at
//! the first problem: every recognized field is checked, then every
//! unrecognized key is reported.

use core::fmt;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::fields::{Field, FieldValue, RawRequest, RawValue, MSG_MISSING};
use crate::time::{format_utc, truncate_seconds};

/* ---------------- Problems ---------------- */

/// One validation finding.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "kebab-case"))]
pub enum Problem {
    /// Tied to one recognized field.
    FieldValidation {
        #[cfg_attr(feature = "serde", serde(rename = "key"))]
        field: Field,
        #[cfg_attr(feature = "serde", serde(rename = "msg"))]
        message: String,
    },
    /// Unrecognized key or structural problem.
    Other {
        #[cfg_attr(feature = "serde", serde(rename = "msg"))]
        message: String,
    },
}

impl Problem {
    pub fn field(field: Field, message: impl Into<String>) -> Self {
        Problem::FieldValidation { field, message: message.into() }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Problem::Other { message: message.into() }
    }

    pub fn message(&self) -> &str {
        match self {
            Problem::FieldValidation { message, .. } | Problem::Other { message } => message,
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::FieldValidation { field, message } => write!(f, "{}: {}", field.key(), message),
            Problem::Other { message } => f.write_str(message),
        }
    }
}

/* ---------------- Parameters ---------------- */

/// The canonical unit of work. Only constructible through `validate`.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestParameters {
    launch_latitude: f64,
    launch_longitude: f64,
    launch_altitude: f64,
    launch_datetime: DateTime<Utc>,
    ascent_rate: f64,
    burst_altitude: f64,
    descent_rate: f64,
}

/// Check every field, then every unknown key.
pub fn validate(raw: &RawRequest) -> Result<RequestParameters, Vec<Problem>> {
    let mut problems = Vec::new();
    let mut numbers = [0.0_f64; 7];
    let mut when: Option<DateTime<Utc>> = None;

    for (slot, field) in Field::ALL.into_iter().enumerate() {
        let Some(value) = raw.get(field.key()) else {
            problems.push(Problem::field(field, MSG_MISSING));
            continue;
        };
        match field.check(value) {
            Ok(FieldValue::Number(x)) => numbers[slot] = x,
            Ok(FieldValue::Instant(t)) => when = Some(t),
            Err(msg) => problems.push(Problem::field(field, msg)),
        }
    }

    // BTreeMap iteration keeps these sorted by key.
    for key in raw.keys() {
        if Field::from_key(key).is_none() {
            problems.push(Problem::other(format!("Unexpected key {key}")));
        }
    }

    if !problems.is_empty() {
        return Err(problems);
    }
    let Some(launch_datetime) = when else {
        return Err(vec![Problem::field(Field::LaunchDatetime, MSG_MISSING)]);
    };

    let [launch_latitude, launch_longitude, launch_altitude, _, ascent_rate, burst_altitude, descent_rate] =
        numbers;
    Ok(RequestParameters {
        launch_latitude,
        launch_longitude,
        launch_altitude,
        launch_datetime,
        ascent_rate,
        burst_altitude,
        descent_rate,
    })
}

/// Map a longitude in [-180, 360) onto [0, 360).
pub fn normalize_longitude(lon: f64) -> f64 {
    let n = lon.rem_euclid(360.0);
    // rem_euclid can round up to the modulus for tiny negative inputs
    if n >= 360.0 { 0.0 } else { n + 0.0 }
}

impl RequestParameters {
    #[inline] pub fn launch_latitude(&self) -> f64 { self.launch_latitude }
    #[inline] pub fn launch_longitude(&self) -> f64 { self.launch_longitude }
    #[inline] pub fn launch_altitude(&self) -> f64 { self.launch_altitude }
    #[inline] pub fn launch_datetime(&self) -> DateTime<Utc> { self.launch_datetime }
    #[inline] pub fn ascent_rate(&self) -> f64 { self.ascent_rate }
    #[inline] pub fn burst_altitude(&self) -> f64 { self.burst_altitude }
    #[inline] pub fn descent_rate(&self) -> f64 { self.descent_rate }

    /// Same scenario at another launch instant (sub-second part dropped).
    pub fn with_launch_datetime(&self, t: DateTime<Utc>) -> Self {
        RequestParameters { launch_datetime: truncate_seconds(t), ..self.clone() }
    }

    /// Same scenario with longitude mapped onto [0, 360).
    pub fn normalized(&self) -> Self {
        RequestParameters {
            launch_longitude: normalize_longitude(self.launch_longitude),
            ..self.clone()
        }
    }

    fn number(&self, field: Field) -> Option<f64> {
        match field {
            Field::LaunchLatitude => Some(self.launch_latitude),
            Field::LaunchLongitude => Some(self.launch_longitude),
            Field::LaunchAltitude => Some(self.launch_altitude),
            Field::AscentRate => Some(self.ascent_rate),
            Field::BurstAltitude => Some(self.burst_altitude),
            Field::DescentRate => Some(self.descent_rate),
            Field::LaunchDatetime => None,
        }
    }

    /// Text of one field as given (longitude not normalized).
    /// Numbers use the shortest representation that parses back exactly.
    pub fn text(&self, field: Field) -> String {
        match self.number(field) {
            Some(x) => format!("{x}"),
            None => format_utc(&self.launch_datetime),
        }
    }

    /// Text of one field for fingerprinting and storage.
    pub fn canonical_text(&self, field: Field) -> String {
        match self.number(field) {
            Some(x) if field == Field::LaunchLongitude => format!("{}", normalize_longitude(x)),
            // -0.0 and 0.0 are one value
            Some(x) => format!("{}", x + 0.0),
            None => format_utc(&self.launch_datetime),
        }
    }

    /// Back to an untyped request (numbers stay numbers).
    pub fn to_raw(&self) -> RawRequest {
        Field::ALL
            .into_iter()
            .map(|f| {
                let v = match self.number(f) {
                    Some(x) => RawValue::Number(x),
                    None => RawValue::Text(format_utc(&self.launch_datetime)),
                };
                (f.key().to_string(), v)
            })
            .collect()
    }
}

#[cfg(feature = "serde")]
impl Serialize for RequestParameters {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.to_raw().serialize(s)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for RequestParameters {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = RawRequest::deserialize(d)?;
        validate(&raw).map_err(|problems| {
            let joined: Vec<String> = problems.iter().map(ToString::to_string).collect();
            serde::de::Error::custom(joined.join("; "))
        })
    }
}
