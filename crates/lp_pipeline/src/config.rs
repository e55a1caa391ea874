//! crates/lp_pipeline/src/config.rs
//! Service configuration: one JSON file, every field defaulted.
//! Relative paths resolve against the directory holding the file.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validate::LaunchWindow;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config {}: {msg}", path.display())]
    Parse { path: PathBuf, msg: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServiceConfig {
    /// Scenario store root.
    pub preds_dir: PathBuf,
    /// Forecast dataset search path handed to the predictor.
    pub dataset_dir: PathBuf,
    /// Program spawned for each new scenario.
    pub predictor: PathBuf,
    /// Leading arguments, e.g. an interpreter script.
    pub predictor_args: Vec<String>,
    /// Watchdog limit for one predictor run.
    pub alarm_secs: u64,
    /// Defaults to `audit.jsonl` next to `preds_dir`.
    pub audit_log: Option<PathBuf>,
    /// Latest accepted launch, hours after now.
    pub horizon_hours: i64,
    /// Earliest accepted launch, hours before now.
    pub grace_hours: i64,
    pub bind: SocketAddr,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            preds_dir: PathBuf::from("./predict/preds"),
            dataset_dir: PathBuf::from("./datasets"),
            predictor: PathBuf::from("./predict.py"),
            predictor_args: Vec::new(),
            alarm_secs: 600,
            audit_log: None,
            horizon_hours: 180,
            grace_hours: 1,
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

fn join_under(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() { p.to_path_buf() } else { base.join(p) }
}

impl ServiceConfig {
    /// Read, resolve and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let cfg: ServiceConfig = serde_json::from_str(&text)
            .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), msg: e.to_string() })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let cfg = cfg.resolved_under(base);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Anchor relative paths at `base`. A bare program name (`python3`) is
    /// left alone so it is looked up on `PATH`.
    pub fn resolved_under(mut self, base: &Path) -> Self {
        self.preds_dir = join_under(base, &self.preds_dir);
        self.dataset_dir = join_under(base, &self.dataset_dir);
        if self.predictor.components().count() > 1 {
            self.predictor = join_under(base, &self.predictor);
        }
        self.audit_log = self.audit_log.map(|p| join_under(base, &p));
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alarm_secs == 0 {
            return Err(ConfigError::Invalid("alarm_secs must be positive".into()));
        }
        if self.predictor.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("predictor must not be empty".into()));
        }
        LaunchWindow::from_hours(self.grace_hours, self.horizon_hours)?;
        Ok(())
    }

    #[inline]
    pub fn alarm(&self) -> Duration {
        Duration::from_secs(self.alarm_secs)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        match &self.audit_log {
            Some(p) => p.clone(),
            None => self
                .preds_dir
                .parent()
                .map_or_else(|| PathBuf::from("audit.jsonl"), |d| d.join("audit.jsonl")),
        }
    }
}
