//! crates/lp_io/src/lib.rs
//! Filesystem side of the landing predictor.
//!
//! - `hasher`: SHA-256 over canonical JSON (audit chain, attempt tags)
//! - `canonical_json`: sorted-key JSON and atomic file writes
//! - `scenario_ini`: the predictor's configuration file, both directions
//! - `store`: content-addressed scenario directories with exclusive create
//! - `audit`: append-only submission log
//! - `progress`, `trajectory`: artifacts written by a predictor run
//! - `manifest`: gallery listing of completed scenarios

#![forbid(unsafe_code)]

use thiserror::Error;

pub mod audit;
pub mod canonical_json;
pub mod hasher;
pub mod manifest;
pub mod progress;
pub mod scenario_ini;
pub mod store;
pub mod trajectory;

/// Shared error for the file-format modules.
#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem / path errors (create_dir, rename, fsync, etc.)
    #[error("io/path error: {0}")]
    Path(String),

    #[error("json error at {pointer}: {msg}")]
    Json { pointer: String, msg: String },

    /// Well-formed file, wrong content.
    #[error("invalid: {0}")]
    Invalid(String),
}

pub type IoResult<T> = Result<T, IoError>;

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        IoError::Json { pointer: "/".to_string(), msg: e.to_string() }
    }
}

pub use audit::{AuditRecord, AuditSink, JsonlAuditLog};
pub use lp_core::hasher::{canonical_string, fingerprint};
pub use store::{EnsureOutcome, ScenarioStore, StoreError};

pub mod prelude {
    pub use crate::{
        canonical_string, fingerprint, AuditRecord, AuditSink, EnsureOutcome, IoError, IoResult,
        JsonlAuditLog, ScenarioStore, StoreError,
    };
}
