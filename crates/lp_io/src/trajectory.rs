//! crates/lp_io/src/trajectory.rs
//! Reader for `flight_path.csv`: one `timestamp,latitude,longitude,altitude`
//! row per line, timestamp in unix seconds.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{TimeZone, Utc};

use lp_core::TrajectoryPoint;

use crate::{IoError, IoResult};

pub fn parse_flight_path(text: &str) -> IoResult<Vec<TrajectoryPoint>> {
    let mut out = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let bad = |what: &str| IoError::Invalid(format!("flight_path.csv line {}: {what}", n + 1));
        let cols: Vec<&str> = line.split(',').map(str::trim).collect();
        let &[ts, lat, lon, alt] = cols.as_slice() else {
            return Err(bad("expected 4 columns"));
        };
        let num = |s: &str, what: &str| -> IoResult<f64> {
            s.parse::<f64>().ok().filter(|x| x.is_finite()).ok_or_else(|| bad(what))
        };
        let secs = num(ts, "bad timestamp")?;
        let datetime = Utc
            .timestamp_opt(secs.trunc() as i64, 0)
            .single()
            .ok_or_else(|| bad("timestamp out of range"))?;
        out.push(TrajectoryPoint {
            datetime,
            latitude: num(lat, "bad latitude")?,
            longitude: num(lon, "bad longitude")?,
            altitude: num(alt, "bad altitude")?,
        });
    }
    Ok(out)
}

/// `None` when the predictor has not written the file.
pub fn read_flight_path(path: &Path) -> IoResult<Option<Vec<TrajectoryPoint>>> {
    match fs::read_to_string(path) {
        Ok(text) => parse_flight_path(&text).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
