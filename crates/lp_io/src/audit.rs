//! crates/lp_io/src/audit.rs
//! Append-only submission log.
//!
//! One JSON line per submission (not per scenario), written before any
//! predictor is launched. Each line carries the SHA-256 of the previous line's
//! body so truncation or edits are detectable. Nothing in the pipeline reads
//! this log back.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use lp_core::{Fingerprint, RequestParameters};

use crate::hasher::sha256_canonical;
use crate::{IoError, IoResult};

/// Chain anchor for the first record.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditBody {
    #[serde(with = "lp_core::time::rfc3339")]
    pub submitted_at: DateTime<Utc>,
    pub fingerprint: Fingerprint,
    pub params: RequestParameters,
    pub prev_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(flatten)]
    pub body: AuditBody,
    pub hash: String,
}

/// Durable sink for submissions. Any append-only store will do.
pub trait AuditSink: Send + Sync {
    fn record(
        &self,
        fp: &Fingerprint,
        p: &RequestParameters,
        submitted_at: DateTime<Utc>,
    ) -> IoResult<AuditRecord>;
}

/// JSON-lines file sink.
#[derive(Debug)]
pub struct JsonlAuditLog {
    path: PathBuf,
    last_hash: Mutex<String>,
}

impl JsonlAuditLog {
    /// Open or create the log, resuming the chain from its last line.
    pub fn open(path: impl Into<PathBuf>) -> IoResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let last_hash = match read_records(&path) {
            Ok(records) => records.last().map_or_else(|| GENESIS_HASH.to_string(), |r| r.hash.clone()),
            Err(IoError::Path(_)) if !path.exists() => GENESIS_HASH.to_string(),
            Err(e) => return Err(e),
        };
        Ok(JsonlAuditLog { path, last_hash: Mutex::new(last_hash) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(
        &self,
        fp: &Fingerprint,
        p: &RequestParameters,
        submitted_at: DateTime<Utc>,
    ) -> IoResult<AuditRecord> {
        // Held across the append so concurrent submitters cannot fork the chain.
        let mut last = self.last_hash.lock();
        let body = AuditBody {
            submitted_at,
            fingerprint: fp.clone(),
            params: p.clone(),
            prev_hash: last.clone(),
        };
        let hash = sha256_canonical(&body)?;
        let record = AuditRecord { body, hash };

        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        let mut f = OpenOptions::new().create(true).append(true).open(&self.path)?;
        f.write_all(&line)?;
        f.sync_data()?;

        *last = record.hash.clone();
        Ok(record)
    }
}

/// All records in file order.
pub fn read_records(path: &Path) -> IoResult<Vec<AuditRecord>> {
    let f = fs::File::open(path)?;
    let mut out = Vec::new();
    for (n, line) in BufReader::new(f).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let rec: AuditRecord = serde_json::from_str(&line).map_err(|e| IoError::Json {
            pointer: format!("line {}", n + 1),
            msg: e.to_string(),
        })?;
        out.push(rec);
    }
    Ok(out)
}

/// Recompute every hash and link. Returns the number of records checked.
pub fn verify_chain(path: &Path) -> IoResult<usize> {
    let records = read_records(path)?;
    let mut prev = GENESIS_HASH.to_string();
    for (i, r) in records.iter().enumerate() {
        if r.body.prev_hash != prev {
            return Err(IoError::Invalid(format!("audit record {}: broken link", i + 1)));
        }
        if sha256_canonical(&r.body)? != r.hash {
            return Err(IoError::Invalid(format!("audit record {}: hash mismatch", i + 1)));
        }
        prev = r.hash.clone();
    }
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn params() -> RequestParameters {
        lp_core::query::decode("52.2135,0.0964,50,2025-03-01T12:00:00Z,5,30000,5").unwrap()
    }

    #[test]
    fn every_submission_appends_a_linked_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = JsonlAuditLog::open(&path).unwrap();
        let p = params();
        let fp = crate::fingerprint(&p);
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap();

        let a = log.record(&fp, &p, at).unwrap();
        let b = log.record(&fp, &p, at).unwrap();
        assert_eq!(a.body.prev_hash, GENESIS_HASH);
        assert_eq!(b.body.prev_hash, a.hash);
        assert_eq!(verify_chain(&path).unwrap(), 2);

        let records = read_records(&path).unwrap();
        assert_eq!(records[0].body.params, p);
        assert_eq!(records[1].body.fingerprint, fp);
    }

    #[test]
    fn reopen_continues_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");
        let p = params();
        let fp = crate::fingerprint(&p);
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap();

        let first = JsonlAuditLog::open(&path).unwrap().record(&fp, &p, at).unwrap();
        let second = JsonlAuditLog::open(&path).unwrap().record(&fp, &p, at).unwrap();
        assert_eq!(second.body.prev_hash, first.hash);
        assert_eq!(verify_chain(&path).unwrap(), 2);
    }

    #[test]
    fn tampering_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = JsonlAuditLog::open(&path).unwrap();
        let p = params();
        let fp = crate::fingerprint(&p);
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap();
        log.record(&fp, &p, at).unwrap();

        let text = fs::read_to_string(&path).unwrap().replace("52.2135", "52.2136");
        fs::write(&path, text).unwrap();
        assert!(matches!(verify_chain(&path), Err(IoError::Invalid(_))));
    }
}
