//! crates/lp_pipeline/src/validate.rs
//! Authoritative server-side validation: the shared field table first, then
//! the clock-dependent launch window. No side effects.

use chrono::{DateTime, Duration, Utc};

use lp_core::fields::{Field, RawRequest};
use lp_core::{Problem, RequestParameters};

use crate::config::ConfigError;

/// Upper bound for both edges of the window, in hours (one leap year).
pub const MAX_WINDOW_HOURS: i64 = 24 * 366;

/// Accepted launch instants relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchWindow {
    pub grace: Duration,
    pub horizon: Duration,
}

impl LaunchWindow {
    /// `grace_hours` in `0..=MAX_WINDOW_HOURS`, `horizon_hours` in `1..=MAX_WINDOW_HOURS`.
    pub fn from_hours(grace_hours: i64, horizon_hours: i64) -> Result<Self, ConfigError> {
        let hours = |name: &str, h: i64, min: i64| {
            if !(min..=MAX_WINDOW_HOURS).contains(&h) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be between {min} and {MAX_WINDOW_HOURS}, got {h}"
                )));
            }
            Duration::try_hours(h)
                .ok_or_else(|| ConfigError::Invalid(format!("{name} out of range: {h}")))
        };
        Ok(LaunchWindow {
            grace: hours("grace_hours", grace_hours, 0)?,
            horizon: hours("horizon_hours", horizon_hours, 1)?,
        })
    }

    /// An edge that falls outside chrono's range does not bound anything.
    pub fn check(&self, p: &RequestParameters, now: DateTime<Utc>) -> Result<(), Problem> {
        let t = p.launch_datetime();
        if now.checked_sub_signed(self.grace).is_some_and(|earliest| t < earliest) {
            return Err(Problem::field(Field::LaunchDatetime, "Launch time is in the past"));
        }
        if now.checked_add_signed(self.horizon).is_some_and(|latest| t > latest) {
            return Err(Problem::field(
                Field::LaunchDatetime,
                format!("Launch time is more than {} hours ahead", self.horizon.num_hours()),
            ));
        }
        Ok(())
    }
}

impl Default for LaunchWindow {
    fn default() -> Self {
        LaunchWindow { grace: Duration::hours(1), horizon: Duration::hours(180) }
    }
}

pub fn validate_submission(
    raw: &RawRequest,
    window: &LaunchWindow,
    now: DateTime<Utc>,
) -> Result<RequestParameters, Vec<Problem>> {
    let p = lp_core::validate(raw)?;
    window.check(&p, now).map_err(|problem| vec![problem])?;
    Ok(p)
}
