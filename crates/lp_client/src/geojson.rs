//! crates/lp_client/src/geojson.rs
//! Chain output as a GeoJSON feature: landing points joined by one line.

use serde_json::{json, Value};

use lp_core::time::format_utc;

use crate::chain::PollingChain;

/// Stored longitudes are in [0, 360); GeoJSON wants [-180, 180].
fn geo_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// `Feature<LineString>` with per-hour launch/landing records in `properties`.
/// An empty chain gives an empty coordinate list.
pub fn landing_line(chain: &PollingChain) -> Value {
    let coordinates: Vec<Value> = chain
        .landing_points()
        .map(|p| json!([geo_longitude(p.longitude), p.latitude, p.altitude]))
        .collect();
    let hours: Vec<Value> = chain
        .links()
        .iter()
        .map(|l| {
            json!({
                "fingerprint": l.fingerprint,
                "launch_time": format_utc(&l.launch_time),
                "landing_time": format_utc(&l.landing.datetime),
            })
        })
        .collect();
    json!({
        "type": "Feature",
        "geometry": { "type": "LineString", "coordinates": coordinates },
        "properties": { "hours": hours },
    })
}
