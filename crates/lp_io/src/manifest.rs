//! crates/lp_io/src/manifest.rs
//! Gallery manifest: completed scenarios keyed by fingerprint.
//!
//! ```json
//! { "<fingerprint>": {
//!     "launch-time":      {"year":2025,"month":3,"day":1,"hour":12,"minute":0,"second":0},
//!     "landing-time":     {...},
//!     "landing-location": {"latitude":52.1,"longitude":1.2,"altitude":10.0} } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use lp_core::{Fingerprint, PredictionResult, TrajectoryPoint};

use crate::canonical_json::write_canonical_file;
use crate::IoResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl From<DateTime<Utc>> for CalendarTime {
    fn from(t: DateTime<Utc>) -> Self {
        CalendarTime {
            year: t.year(),
            month: t.month(),
            day: t.day(),
            hour: t.hour(),
            minute: t.minute(),
            second: t.second(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl From<&TrajectoryPoint> for Location {
    fn from(p: &TrajectoryPoint) -> Self {
        Location { latitude: p.latitude, longitude: p.longitude, altitude: p.altitude }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ManifestEntry {
    pub launch_time: CalendarTime,
    pub landing_time: CalendarTime,
    pub landing_location: Location,
}

impl ManifestEntry {
    /// `None` when the result has no landing point.
    pub fn new(launch: DateTime<Utc>, result: &PredictionResult) -> Option<Self> {
        let landing = result.last_point()?;
        Some(ManifestEntry {
            launch_time: launch.into(),
            landing_time: landing.datetime.into(),
            landing_location: landing.into(),
        })
    }
}

pub type Manifest = BTreeMap<Fingerprint, ManifestEntry>;

pub fn write_manifest(path: &Path, manifest: &Manifest) -> IoResult<()> {
    write_canonical_file(path, manifest)
}
