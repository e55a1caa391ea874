//! crates/lp_pipeline/src/results.rs
//! Reading what a predictor run left behind.

use chrono::{DateTime, Utc};

use lp_core::{Fingerprint, PredictionResult};
use lp_io::manifest::{Manifest, ManifestEntry};
use lp_io::progress::{Progress, ABANDONED_PREFIX};
use lp_io::trajectory::read_flight_path;
use lp_io::{IoError, ScenarioStore, StoreError};

use crate::invoke::process_exited;

/// State of one scenario as seen by a reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    NotFound,
    /// Known, no result yet.
    Pending,
    Failed(String),
    Complete(PredictionResult),
}

fn artifact(fp: &Fingerprint, source: IoError) -> StoreError {
    StoreError::Artifact { fingerprint: fp.clone(), source }
}

pub fn lookup(store: &ScenarioStore, fp: &Fingerprint) -> Result<Lookup, StoreError> {
    lookup_at(store, fp, Utc::now())
}

/// `lookup` against an explicit wall clock (run deadlines are wall-clock).
pub fn lookup_at(
    store: &ScenarioStore,
    fp: &Fingerprint,
    now: DateTime<Utc>,
) -> Result<Lookup, StoreError> {
    if !store.exists(fp) {
        return Ok(Lookup::NotFound);
    }
    let Some(progress) = Progress::read(&store.progress_path(fp)).map_err(|e| artifact(fp, e))? else {
        return Ok(Lookup::Pending);
    };
    if let Some(error) = &progress.error {
        return Ok(Lookup::Failed(error.clone()));
    }
    if progress.pred_running {
        if !is_orphaned(&progress, now) {
            return Ok(Lookup::Pending);
        }
        return Ok(match read_result(store, fp)? {
            complete @ Lookup::Complete(_) => complete,
            _ => Lookup::Failed(format!(
                "{ABANDONED_PREFIX} predictor stopped without recording an outcome"
            )),
        });
    }
    if !progress.pred_complete {
        return Ok(Lookup::Pending);
    }
    read_result(store, fp)
}

/// Marked running, but the process is gone or the deadline has passed, so no
/// supervisor will ever record the outcome.
fn is_orphaned(progress: &Progress, now: DateTime<Utc>) -> bool {
    progress.pred_running
        && (progress.is_overdue(now.timestamp())
            || progress.pid.and_then(process_exited).unwrap_or(false))
}

/// An orphaned run that left no usable flight path; safe to run again.
pub(crate) fn is_abandoned(
    store: &ScenarioStore,
    fp: &Fingerprint,
    progress: &Progress,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    if !is_orphaned(progress, now) {
        return Ok(false);
    }
    Ok(!matches!(read_result(store, fp)?, Lookup::Complete(_)))
}

fn read_result(store: &ScenarioStore, fp: &Fingerprint) -> Result<Lookup, StoreError> {
    let points = match read_flight_path(&store.flight_path_path(fp)) {
        Ok(Some(points)) => points,
        Ok(None) => return Ok(Lookup::Failed("predictor finished without a flight path".into())),
        Err(IoError::Invalid(msg)) => return Ok(Lookup::Failed(msg)),
        Err(e) => return Err(artifact(fp, e)),
    };
    Ok(match PredictionResult::from_trajectory(points) {
        Some(result) => Lookup::Complete(result),
        None => Lookup::Failed("empty flight path".into()),
    })
}

/// Gallery listing of every completed scenario in the store.
pub fn build_manifest(store: &ScenarioStore) -> Result<Manifest, StoreError> {
    let mut manifest = Manifest::new();
    for fp in store.list()? {
        let Lookup::Complete(result) = lookup(store, &fp)? else {
            continue;
        };
        let Some(params) = store.get_scenario(&fp)? else {
            continue;
        };
        if let Some(entry) = ManifestEntry::new(params.launch_datetime(), &result) {
            manifest.insert(fp, entry);
        }
    }
    Ok(manifest)
}
