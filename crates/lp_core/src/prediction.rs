//! crates/lp_core/src/prediction.rs
//! Prediction model: ordered flight stages, each an ordered run of points.

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum StageKind {
    Launch,
    Ascent,
    Burst,
    Descent,
    Land,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrajectoryPoint {
    #[cfg_attr(feature = "serde", serde(with = "crate::time::rfc3339"))]
    pub datetime: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stage {
    pub stage: StageKind,
    pub trajectory: Vec<TrajectoryPoint>,
}

/// One completed prediction. Stages are time-monotonic; the final point of
/// the final stage is the landing point.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PredictionResult {
    pub prediction: Vec<Stage>,
}

impl PredictionResult {
    /// Split a raw flight path at its altitude maximum.
    /// `None` for an empty path.
    pub fn from_trajectory(points: Vec<TrajectoryPoint>) -> Option<Self> {
        let first = *points.first()?;
        let last = *points.last()?;
        // First occurrence of the maximum.
        let mut peak = 0;
        for (i, p) in points.iter().enumerate() {
            if p.altitude > points[peak].altitude {
                peak = i;
            }
        }
        let burst = points[peak];
        let descent = points[peak + 1..].to_vec();
        let mut ascent = points;
        ascent.truncate(peak + 1);

        Some(PredictionResult {
            prediction: vec![
                Stage { stage: StageKind::Launch, trajectory: vec![first] },
                Stage { stage: StageKind::Ascent, trajectory: ascent },
                Stage { stage: StageKind::Burst, trajectory: vec![burst] },
                Stage { stage: StageKind::Descent, trajectory: descent },
                Stage { stage: StageKind::Land, trajectory: vec![last] },
            ],
        })
    }

    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        self.prediction.iter().find(|s| s.stage == kind)
    }

    /// Landing point: final point of the final non-empty stage.
    pub fn last_point(&self) -> Option<&TrajectoryPoint> {
        self.prediction.iter().rev().find_map(|s| s.trajectory.last())
    }

    pub fn burst_point(&self) -> Option<&TrajectoryPoint> {
        self.stage(StageKind::Burst).and_then(|s| s.trajectory.first())
    }

    pub fn launch_point(&self) -> Option<&TrajectoryPoint> {
        self.prediction.iter().find_map(|s| s.trajectory.first())
    }
}
