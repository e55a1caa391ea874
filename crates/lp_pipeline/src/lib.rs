//! lp_pipeline: authoritative server-side submission.
//!
//! raw input → validate (field table + launch window) → fingerprint → audit →
//! ensure scenario → launch predictor (only for a new scenario).
//!
//! The audit write and the store's exclusive create happen before `submit`
//! returns; the predictor run itself is never awaited here.

#![forbid(unsafe_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use lp_core::fields::RawRequest;
use lp_core::{Fingerprint, Problem, RequestParameters};
use lp_io::progress::Progress;
use lp_io::{AuditSink, EnsureOutcome, IoError, JsonlAuditLog, ScenarioStore, StoreError};

pub mod config;
pub mod invoke;
pub mod results;
pub mod validate;

pub use config::{ConfigError, ServiceConfig};
pub use invoke::{InvokeError, Invoker, Job, Launched, ProcessInvoker, RunOutcome};
pub use results::{build_manifest, lookup, lookup_at, Lookup};
pub use validate::{validate_submission, LaunchWindow};

/// Single error surface for a submission.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Nothing was written.
    #[error("request rejected: {}", summarize(.0))]
    Validation(Vec<Problem>),

    #[error(transparent)]
    Storage(#[from] StoreError),

    /// The predictor could not be started. The record stays usable.
    #[error(transparent)]
    Invocation(#[from] InvokeError),

    #[error("audit log: {0}")]
    Audit(#[source] IoError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn summarize(problems: &[Problem]) -> String {
    problems.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// What a successful submission did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// New scenario; predictor started.
    Launched,
    /// Known scenario whose previous run failed to launch or was abandoned;
    /// predictor started again.
    Relaunched,
    /// Known scenario; nothing started.
    AlreadyKnown,
}

/// Accepted submission. Every `Ok` from `submit` is an accepted one.
#[derive(Debug)]
pub struct Submission {
    pub fingerprint: Fingerprint,
    pub params: RequestParameters,
    pub outcome: SubmitOutcome,
    /// Present when this call started a run.
    pub run: Option<Launched>,
}

impl Submission {
    #[inline]
    pub fn created(&self) -> bool {
        self.outcome == SubmitOutcome::Launched
    }
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct Pipeline {
    store: ScenarioStore,
    audit: Arc<dyn AuditSink>,
    invoker: Arc<dyn Invoker>,
    window: LaunchWindow,
    clock: Clock,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("store", &self.store)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        store: ScenarioStore,
        audit: Arc<dyn AuditSink>,
        invoker: Arc<dyn Invoker>,
        window: LaunchWindow,
    ) -> Self {
        Pipeline { store, audit, invoker, window, clock: Arc::new(Utc::now) }
    }

    /// Store, JSONL audit log and process invoker as configured.
    pub fn from_config(cfg: &ServiceConfig) -> Result<Self, PipelineError> {
        cfg.validate()?;
        let store = ScenarioStore::open(&cfg.preds_dir)?;
        let audit = JsonlAuditLog::open(cfg.audit_log_path()).map_err(PipelineError::Audit)?;
        let invoker = ProcessInvoker {
            program: cfg.predictor.clone(),
            leading_args: cfg.predictor_args.clone(),
            dataset_dir: cfg.dataset_dir.clone(),
            alarm: cfg.alarm(),
        };
        let window = LaunchWindow::from_hours(cfg.grace_hours, cfg.horizon_hours)?;
        Ok(Pipeline::new(store, Arc::new(audit), Arc::new(invoker), window))
    }

    /// Replace the wall clock (launch window, audit timestamps).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[inline]
    pub fn store(&self) -> &ScenarioStore {
        &self.store
    }

    #[inline]
    pub fn window(&self) -> &LaunchWindow {
        &self.window
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Full path for untrusted input.
    pub fn submit(&self, raw: &RawRequest) -> Result<Submission, PipelineError> {
        let params =
            validate_submission(raw, &self.window, self.now()).map_err(PipelineError::Validation)?;
        let fp = lp_io::fingerprint(&params);
        self.submit_params(&fp, &params)
    }

    /// Audit, then create-or-hit, then launch on the winning path only.
    pub fn submit_params(
        &self,
        fp: &Fingerprint,
        p: &RequestParameters,
    ) -> Result<Submission, PipelineError> {
        self.audit.record(fp, p, self.now()).map_err(PipelineError::Audit)?;

        let outcome = match self.store.ensure_scenario(fp, p)? {
            EnsureOutcome::Created => SubmitOutcome::Launched,
            EnsureOutcome::Exists => {
                if self.claim_retry(fp)? {
                    self.store.write_config(fp, p)?;
                    SubmitOutcome::Relaunched
                } else {
                    info!(fingerprint = %fp, "cache hit");
                    return Ok(Submission {
                        fingerprint: fp.clone(),
                        params: p.clone(),
                        outcome: SubmitOutcome::AlreadyKnown,
                        run: None,
                    });
                }
            }
        };

        let job = Job::for_scenario(&self.store, fp);
        match self.invoker.launch(&job) {
            Ok(run) => Ok(Submission {
                fingerprint: fp.clone(),
                params: p.clone(),
                outcome,
                run: Some(run),
            }),
            Err(e) => {
                self.record_launch_failure(&job, &e);
                Err(PipelineError::Invocation(e))
            }
        }
    }

    /// True when the last attempt for `fp` failed to launch or was abandoned
    /// by its supervisor, and this caller won the right to try again.
    fn claim_retry(&self, fp: &Fingerprint) -> Result<bool, PipelineError> {
        let artifact = |source| StoreError::Artifact { fingerprint: fp.clone(), source };
        let Some(prev) = Progress::read(&self.store.progress_path(fp)).map_err(artifact)? else {
            return Ok(false);
        };
        // Run deadlines are wall-clock, whatever `self.clock` says.
        let retry = prev.is_launch_failure()
            || results::is_abandoned(&self.store, fp, &prev, Utc::now())?;
        if !retry {
            return Ok(false);
        }
        let tag = prev.attempt_tag().map_err(artifact)?;
        let won = self.store.claim_relaunch(fp, &tag)?;
        if won {
            info!(fingerprint = %fp, "retrying failed run");
        }
        Ok(won)
    }

    fn record_launch_failure(&self, job: &Job, e: &InvokeError) {
        error!(fingerprint = %job.fingerprint, error = %e, "predictor launch failed");
        let progress = Progress::launch_failed(self.now().timestamp(), &e.to_string());
        if let Err(log_err) = invoke::append_log_line(&job.log_path, &progress.error.clone().unwrap_or_default()) {
            warn!(fingerprint = %job.fingerprint, error = %log_err, "could not write launch failure to log");
        }
        if let Err(write_err) = progress.write(&job.progress_path) {
            warn!(fingerprint = %job.fingerprint, error = %write_err, "could not record launch failure");
        }
    }
}
