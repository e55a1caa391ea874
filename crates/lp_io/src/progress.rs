//! crates/lp_io/src/progress.rs
//! `progress.json`: status of the predictor run for one scenario.
//! Rewritten atomically at each transition, so a reader never sees half a file.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::canonical_json::write_canonical_file;
use crate::hasher::sha256_canonical;
use crate::IoResult;

/// Prefix of `error` when the predictor could not be started.
pub const LAUNCH_FAILED_PREFIX: &str = "launch failed:";
/// Prefix of `error` when the watchdog killed the run.
pub const ALARM_PREFIX: &str = "alarm:";
/// Prefix of a failure inferred for a run whose supervisor went away.
pub const ABANDONED_PREFIX: &str = "abandoned:";
/// At most this many WARN/ERROR log lines are copied into `pred_output`.
pub const MAX_PRED_OUTPUT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Unix seconds when the run was started.
    pub run_time: i64,
    #[serde(default)]
    pub pred_running: bool,
    #[serde(default)]
    pub pred_complete: bool,
    #[serde(default)]
    pub warnings: bool,
    #[serde(default)]
    pub pred_output: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process id of a running predictor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Unix seconds after which a run still marked running is not believed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<i64>,
}

impl Progress {
    pub fn running(run_time: i64) -> Self {
        Progress { run_time, pred_running: true, ..Progress::default() }
    }

    /// Running under a supervisor that may not outlive `deadline`.
    pub fn started(run_time: i64, pid: Option<u32>, deadline: i64) -> Self {
        Progress { pid, deadline: Some(deadline), ..Progress::running(run_time) }
    }

    /// The process exited. `warnings` is set for a non-zero exit or when the
    /// log carried WARN/ERROR lines.
    pub fn finished(run_time: i64, success: bool, pred_output: Vec<String>) -> Self {
        Progress {
            run_time,
            pred_complete: true,
            warnings: !success || !pred_output.is_empty(),
            pred_output,
            ..Progress::default()
        }
    }

    pub fn failed(run_time: i64, error: impl Into<String>) -> Self {
        Progress { run_time, error: Some(error.into()), ..Progress::default() }
    }

    pub fn launch_failed(run_time: i64, reason: &str) -> Self {
        Progress::failed(run_time, format!("{LAUNCH_FAILED_PREFIX} {reason}"))
    }

    pub fn is_launch_failure(&self) -> bool {
        self.error.as_deref().is_some_and(|e| e.starts_with(LAUNCH_FAILED_PREFIX))
    }

    /// Still marked running past its deadline.
    pub fn is_overdue(&self, now: i64) -> bool {
        self.pred_running && self.deadline.is_some_and(|d| now > d)
    }

    /// Stable tag for this exact document; identifies one failed attempt.
    pub fn attempt_tag(&self) -> IoResult<String> {
        let mut hex = sha256_canonical(self)?;
        hex.truncate(16);
        Ok(hex)
    }

    /// `None` when the file does not exist yet.
    pub fn read(path: &Path) -> IoResult<Option<Progress>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write(&self, path: &Path) -> IoResult<()> {
        write_canonical_file(path, self)
    }
}

/// WARN/ERROR lines of a predictor log, capped at `MAX_PRED_OUTPUT`.
pub fn collect_warnings(log: &str) -> Vec<String> {
    log.lines()
        .filter(|l| l.contains("WARN") || l.contains("ERROR"))
        .map(|l| l.trim().to_string())
        .take(MAX_PRED_OUTPUT)
        .collect()
}
