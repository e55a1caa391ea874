//! crates/lp_io/src/scenario_ini.rs
//! `scenario.ini`: the file the external predictor reads.
//!
//! Section and key names are shared with the predictor executable and must
//! not change on their own:
//!
//! ```text
//! [launch-site]     latitude, longitude, altitude
//! [atmosphere]      (reserved, empty)
//! [altitude-model]  ascent-rate, descent-rate, burst-altitude
//! [launch-time]     hour, minute, second, day, month, year
//! ```
//!
//! Longitude is always written folded onto [0, 360).

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{Datelike, Timelike};

use lp_core::fields::{Field, RawRequest, RawValue};
use lp_core::RequestParameters;

use crate::IoError;

pub const SECTION_SITE: &str = "launch-site";
pub const SECTION_ATMOSPHERE: &str = "atmosphere";
pub const SECTION_MODEL: &str = "altitude-model";
pub const SECTION_TIME: &str = "launch-time";

pub fn render(p: &RequestParameters) -> String {
    let t = p.launch_datetime();
    let mut s = String::with_capacity(256);
    // Writing into a String cannot fail.
    let _ = write!(
        s,
        "[{SECTION_SITE}]\n\
         latitude = {}\n\
         longitude = {}\n\
         altitude = {}\n\
         [{SECTION_ATMOSPHERE}]\n\
         [{SECTION_MODEL}]\n\
         ascent-rate = {}\n\
         descent-rate = {}\n\
         burst-altitude = {}\n\
         [{SECTION_TIME}]\n\
         hour = {}\n\
         minute = {}\n\
         second = {}\n\
         day = {}\n\
         month = {}\n\
         year = {}\n",
        p.canonical_text(Field::LaunchLatitude),
        p.canonical_text(Field::LaunchLongitude),
        p.canonical_text(Field::LaunchAltitude),
        p.canonical_text(Field::AscentRate),
        p.canonical_text(Field::DescentRate),
        p.canonical_text(Field::BurstAltitude),
        t.hour(),
        t.minute(),
        t.second(),
        t.day(),
        t.month(),
        t.year(),
    );
    s
}

type Sections = BTreeMap<String, BTreeMap<String, String>>;

fn split_sections(text: &str) -> Result<Sections, IoError> {
    let mut out = Sections::new();
    let mut current: Option<String> = None;
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            out.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        let (Some(section), Some((k, v))) = (current.as_ref(), line.split_once('=')) else {
            return Err(IoError::Invalid(format!("scenario.ini line {}: unexpected `{line}`", n + 1)));
        };
        out.entry(section.clone())
            .or_default()
            .insert(k.trim().to_string(), v.trim().to_string());
    }
    Ok(out)
}

fn lookup<'a>(sections: &'a Sections, section: &str, key: &str) -> Result<&'a str, IoError> {
    sections
        .get(section)
        .and_then(|s| s.get(key))
        .map(String::as_str)
        .ok_or_else(|| IoError::Invalid(format!("scenario.ini: missing [{section}] {key}")))
}

fn time_part(sections: &Sections, key: &str) -> Result<u32, IoError> {
    let raw = lookup(sections, SECTION_TIME, key)?;
    raw.parse::<u32>()
        .map_err(|_| IoError::Invalid(format!("scenario.ini: [{SECTION_TIME}] {key} = {raw}")))
}

/// Reverse of `render`. The result goes through the shared validator.
pub fn parse(text: &str) -> Result<RequestParameters, IoError> {
    let sections = split_sections(text)?;

    let datetime = format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        time_part(&sections, "year")?,
        time_part(&sections, "month")?,
        time_part(&sections, "day")?,
        time_part(&sections, "hour")?,
        time_part(&sections, "minute")?,
        time_part(&sections, "second")?,
    );

    let pairs = [
        (Field::LaunchLatitude, lookup(&sections, SECTION_SITE, "latitude")?),
        (Field::LaunchLongitude, lookup(&sections, SECTION_SITE, "longitude")?),
        (Field::LaunchAltitude, lookup(&sections, SECTION_SITE, "altitude")?),
        (Field::LaunchDatetime, datetime.as_str()),
        (Field::AscentRate, lookup(&sections, SECTION_MODEL, "ascent-rate")?),
        (Field::BurstAltitude, lookup(&sections, SECTION_MODEL, "burst-altitude")?),
        (Field::DescentRate, lookup(&sections, SECTION_MODEL, "descent-rate")?),
    ];
    let raw: RawRequest = pairs
        .into_iter()
        .map(|(f, v)| (f.key().to_string(), RawValue::from(v)))
        .collect();

    lp_core::validate(&raw).map_err(|problems| {
        let joined: Vec<String> = problems.iter().map(ToString::to_string).collect();
        IoError::Invalid(format!("scenario.ini: {}", joined.join("; ")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(lon: &str) -> RequestParameters {
        lp_core::query::decode(&format!("52.2135,{lon},50,2025-03-01T09:05:07Z,5,30000,4.5")).unwrap()
    }

    #[test]
    fn renders_fixed_layout() {
        let text = render(&sample("-1.5"));
        assert_eq!(
            text,
            "[launch-site]\nlatitude = 52.2135\nlongitude = 358.5\naltitude = 50\n\
             [atmosphere]\n\
             [altitude-model]\nascent-rate = 5\ndescent-rate = 4.5\nburst-altitude = 30000\n\
             [launch-time]\nhour = 9\nminute = 5\nsecond = 7\nday = 1\nmonth = 3\nyear = 2025\n"
        );
    }

    #[test]
    fn parse_reverses_render_with_normalized_longitude() {
        let p = sample("-1.5");
        let back = parse(&render(&p)).unwrap();
        assert_eq!(back, p.normalized());
    }

    #[test]
    fn parse_tolerates_legacy_spacing_and_order() {
        let legacy = "[launch-site]\nlatitude = 52.2135\naltitude = 50\nlongitude = 0.5\n[atmosphere]\n\
                      [altitude-model]\nascent-rate = 5\ndescent-rate  = 4.5\nburst-altitude = 30000\n\
                      [launch-time]\nhour = 12\nmonth = 3\nsecond = 0\nyear = 2025\nday = 1\nminute = 0\n";
        let p = parse(legacy).unwrap();
        assert_eq!(p, sample("0.5").with_launch_datetime(
            lp_core::time::parse_utc_timestamp("2025-03-01T12:00:00Z").unwrap()
        ));
    }

    #[test]
    fn parse_rejects_missing_and_out_of_range() {
        assert!(matches!(parse("[launch-site]\nlatitude = 1\n"), Err(IoError::Invalid(_))));
        let bad = render(&sample("1")).replace("latitude = 52.2135", "latitude = 95");
        assert!(matches!(parse(&bad), Err(IoError::Invalid(_))));
        assert!(matches!(parse("latitude = 1\n"), Err(IoError::Invalid(_))));
    }
}
