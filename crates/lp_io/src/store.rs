//! crates/lp_io/src/store.rs
//! Content-addressed scenario store.
//!
//! One directory per fingerprint under the store root:
//!
//! ```text
//! <root>/<fingerprint>/scenario.ini      predictor configuration
//! <root>/<fingerprint>/scenario.json     canonical JSON of the parameters
//! <root>/<fingerprint>/log.txt           predictor output
//! <root>/<fingerprint>/progress.json     run status
//! <root>/<fingerprint>/flight_path.csv   predictor result
//! ```
//!
//! `create_dir` is the only synchronization point between racing submitters:
//! the caller whose `create_dir` succeeds writes the configuration, every other
//! caller sees `Exists`. Records are never deleted here.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use lp_core::{Fingerprint, RequestParameters};

use crate::canonical_json::{write_atomic, write_canonical_file};
use crate::scenario_ini;

pub const CONFIG_FILE: &str = "scenario.ini";
pub const SIDECAR_FILE: &str = "scenario.json";
pub const LOG_FILE: &str = "log.txt";
pub const PROGRESS_FILE: &str = "progress.json";
pub const FLIGHT_PATH_FILE: &str = "flight_path.csv";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("scenario store I/O failure at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("scenario {fingerprint} is unreadable: {reason}")]
    Corrupt { fingerprint: Fingerprint, reason: String },

    #[error("scenario {fingerprint}: {source}")]
    Artifact {
        fingerprint: Fingerprint,
        #[source]
        source: crate::IoError,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io { path: path.to_path_buf(), source }
    }
}

/// Result of `ensure_scenario`. `Exists` is the dedup hit, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    Exists,
}

impl EnsureOutcome {
    #[inline]
    pub fn created(self) -> bool {
        self == EnsureOutcome::Created
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioStore {
    root: PathBuf,
}

impl ScenarioStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(ScenarioStore { root })
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scenario_dir(&self, fp: &Fingerprint) -> PathBuf {
        self.root.join(fp.as_str())
    }

    pub fn config_path(&self, fp: &Fingerprint) -> PathBuf {
        self.scenario_dir(fp).join(CONFIG_FILE)
    }

    pub fn sidecar_path(&self, fp: &Fingerprint) -> PathBuf {
        self.scenario_dir(fp).join(SIDECAR_FILE)
    }

    pub fn log_path(&self, fp: &Fingerprint) -> PathBuf {
        self.scenario_dir(fp).join(LOG_FILE)
    }

    pub fn progress_path(&self, fp: &Fingerprint) -> PathBuf {
        self.scenario_dir(fp).join(PROGRESS_FILE)
    }

    pub fn flight_path_path(&self, fp: &Fingerprint) -> PathBuf {
        self.scenario_dir(fp).join(FLIGHT_PATH_FILE)
    }

    pub fn exists(&self, fp: &Fingerprint) -> bool {
        self.scenario_dir(fp).is_dir()
    }

    /// Create the record for `fp` if absent. Exactly one concurrent caller
    /// gets `Created` and has written the configuration when this returns.
    pub fn ensure_scenario(
        &self,
        fp: &Fingerprint,
        p: &RequestParameters,
    ) -> Result<EnsureOutcome, StoreError> {
        let dir = self.scenario_dir(fp);
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(fingerprint = %fp, "scenario already known");
                return Ok(EnsureOutcome::Exists);
            }
            Err(e) => return Err(StoreError::io(&dir, e)),
        }

        if let Err(e) = self.write_config(fp, p) {
            // Leave nothing half-written behind so a later submission can retry.
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                warn!(fingerprint = %fp, error = %cleanup, "could not remove incomplete scenario");
            }
            return Err(e);
        }
        info!(fingerprint = %fp, "scenario created");
        Ok(EnsureOutcome::Created)
    }

    /// Write `scenario.ini` and `scenario.json` for an existing record.
    pub fn write_config(&self, fp: &Fingerprint, p: &RequestParameters) -> Result<(), StoreError> {
        let normalized = p.normalized();
        let config = self.config_path(fp);
        write_atomic(&config, scenario_ini::render(&normalized).as_bytes())
            .map_err(|e| StoreError::io(&config, e))?;

        let sidecar = self.sidecar_path(fp);
        write_canonical_file(&sidecar, &normalized).map_err(|e| {
            StoreError::io(&sidecar, io::Error::new(io::ErrorKind::Other, e.to_string()))
        })
    }

    /// Parameters of a stored scenario, longitude as stored (folded onto [0, 360)).
    pub fn get_scenario(&self, fp: &Fingerprint) -> Result<Option<RequestParameters>, StoreError> {
        let config = self.config_path(fp);
        let text = match fs::read_to_string(&config) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&config, e)),
        };
        scenario_ini::parse(&text)
            .map(Some)
            .map_err(|e| StoreError::Corrupt { fingerprint: fp.clone(), reason: e.to_string() })
    }

    /// Every record in the store, sorted. Foreign entries are skipped.
    pub fn list(&self) -> Result<Vec<Fingerprint>, StoreError> {
        let entries = fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(fp) = entry.file_name().to_str().and_then(|n| n.parse::<Fingerprint>().ok()) {
                out.push(fp);
            }
        }
        out.sort();
        Ok(out)
    }

    /// Claim the right to relaunch after the failed attempt identified by
    /// `attempt`. Only one caller per attempt gets `true`.
    pub fn claim_relaunch(&self, fp: &Fingerprint, attempt: &str) -> Result<bool, StoreError> {
        let marker = self.scenario_dir(fp).join(format!("relaunch-{attempt}.claim"));
        match OpenOptions::new().write(true).create_new(true).open(&marker) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StoreError::io(&marker, e)),
        }
    }
}
