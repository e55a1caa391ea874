//! crates/lp_core/src/query.rs
//! Packed URL query: the seven fields comma-joined in table order.
//!
//! Decoding re-runs the shared validator. Anything malformed means "no
//! scenario in this link", never an error.

use crate::fields::{Field, RawRequest, RawValue};
use crate::params::{validate, RequestParameters};

const SEP: char = ',';

pub fn encode(p: &RequestParameters) -> String {
    let parts: Vec<String> = Field::ALL.into_iter().map(|f| p.text(f)).collect();
    parts.join(",")
}

pub fn decode(query: &str) -> Option<RequestParameters> {
    let body = query.strip_prefix('?').unwrap_or(query);
    let parts: Vec<&str> = body.split(SEP).collect();
    if parts.len() != Field::ALL.len() {
        return None;
    }
    let raw: RawRequest = Field::ALL
        .into_iter()
        .zip(parts)
        .map(|(f, text)| (f.key().to_string(), RawValue::from(text)))
        .collect();
    validate(&raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    const GOOD: &str = "52.2135,0.0964,50,2025-03-01T12:00:00Z,5,30000,5";

    #[test]
    fn decode_known_link() {
        let p = decode(GOOD).unwrap();
        assert_eq!(p.launch_altitude(), 50.0);
        assert_eq!(encode(&p), GOOD);
        assert_eq!(decode(&format!("?{GOOD}")), Some(p));
    }

    #[test]
    fn malformed_links_mean_no_scenario() {
        assert_eq!(decode(""), None);
        assert_eq!(decode("52.2,0.1,50,2025-03-01T12:00:00Z,5,30000"), None);
        assert_eq!(decode(&format!("{GOOD},1")), None);
        assert_eq!(decode("52.2,0.1,50,2025-03-01 12:00,5,30000,5"), None);
        assert_eq!(decode("91,0.1,50,2025-03-01T12:00:00Z,5,30000,5"), None);
        assert_eq!(decode("52.2,0.1,50,2025-03-01T12:00:00Z,50,30000,5"), None);
        assert_eq!(decode("52.2,x,50,2025-03-01T12:00:00Z,5,30000,5"), None);
    }

    fn valid_params() -> impl Strategy<Value = RequestParameters> {
        (
            -90.0f64..=90.0,
            -180.0f64..360.0,
            0.001f64..=50_000.0,
            0i64..4_000_000_000,
            0.001f64..49.999,
            0.001f64..=50_000.0,
            0.001f64..49.999,
        )
            .prop_map(|(lat, lon, alt, secs, up, burst, down)| {
                let t = Utc.timestamp_opt(secs, 0).unwrap();
                let mut raw = RawRequest::new();
                raw.insert("launch_latitude".into(), RawValue::Number(lat));
                raw.insert("launch_longitude".into(), RawValue::Number(lon));
                raw.insert("launch_altitude".into(), RawValue::Number(alt));
                raw.insert("launch_datetime".into(), RawValue::Text(crate::time::format_utc(&t)));
                raw.insert("ascent_rate".into(), RawValue::Number(up));
                raw.insert("burst_altitude".into(), RawValue::Number(burst));
                raw.insert("descent_rate".into(), RawValue::Number(down));
                validate(&raw).unwrap()
            })
    }

    proptest! {
        #[test]
        fn parse_of_serialize_is_identity(p in valid_params()) {
            prop_assert_eq!(decode(&encode(&p)), Some(p));
        }

        #[test]
        fn wrong_field_count_is_none(p in valid_params(), extra in 1usize..4) {
            let mut q = encode(&p);
            for _ in 0..extra { q.push_str(",1"); }
            prop_assert_eq!(decode(&q), None);
        }
    }
}
