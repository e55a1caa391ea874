//! crates/lp_pipeline/src/invoke.rs
//! Launching the external predictor.
//!
//! The predictor is spawned from an argument list (no shell), with its
//! stdout/stderr appended to the scenario's `log.txt`. A supervisor task owns
//! the child: it enforces the alarm, kills a hung run, and records the outcome
//! in `progress.json`. `launch` returns as soon as the child is running.
//!
//! The child does not outlive its supervisor: dropping the task (runtime
//! shutdown) kills it. The pid and a deadline go into `progress.json` so a
//! reader can tell a live run from one nobody is watching any more.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use lp_core::Fingerprint;
use lp_io::progress::{collect_warnings, Progress, ALARM_PREFIX};
use lp_io::ScenarioStore;

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("cannot open predictor log {}: {source}", path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot start predictor {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Seconds past the alarm before a run still marked running is written off.
pub const DEADLINE_SLACK_SECS: i64 = 30;

/// Everything an invoker needs to run one scenario.
#[derive(Debug, Clone)]
pub struct Job {
    pub fingerprint: Fingerprint,
    pub preds_root: PathBuf,
    pub log_path: PathBuf,
    pub progress_path: PathBuf,
}

impl Job {
    pub fn for_scenario(store: &ScenarioStore, fp: &Fingerprint) -> Self {
        Job {
            fingerprint: fp.clone(),
            preds_root: store.root().to_path_buf(),
            log_path: store.log_path(fp),
            progress_path: store.progress_path(fp),
        }
    }
}

/// How a supervised run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Exited { success: bool, code: Option<i32> },
    TimedOut,
    Lost(String),
}

/// A started run. Dropping it detaches the run; `wait` observes its end.
#[derive(Debug)]
pub struct Launched {
    pub pid: Option<u32>,
    supervisor: Option<JoinHandle<RunOutcome>>,
}

impl Launched {
    /// A run with nothing to observe (e.g. an invoker that only enqueues).
    pub fn detached(pid: Option<u32>) -> Self {
        Launched { pid, supervisor: None }
    }

    pub async fn wait(self) -> Option<RunOutcome> {
        match self.supervisor {
            Some(handle) => match handle.await {
                Ok(outcome) => Some(outcome),
                Err(e) => Some(RunOutcome::Lost(e.to_string())),
            },
            None => None,
        }
    }
}

/// Seam between the pipeline and whatever runs predictions.
pub trait Invoker: Send + Sync {
    /// Start the run for `job` without waiting for it to finish.
    fn launch(&self, job: &Job) -> Result<Launched, InvokeError>;
}

/// Spawns the predictor as a child process under a watchdog.
/// Must be called from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    pub program: PathBuf,
    pub leading_args: Vec<String>,
    pub dataset_dir: PathBuf,
    pub alarm: Duration,
}

impl ProcessInvoker {
    /// `[leading_args..] --preds <root> -v -s <dataset_dir> <fingerprint>`
    pub fn argv(&self, job: &Job) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.extend([
            "--preds".to_string(),
            job.preds_root.display().to_string(),
            "-v".to_string(),
            "-s".to_string(),
            self.dataset_dir.display().to_string(),
            job.fingerprint.to_string(),
        ]);
        args
    }
}

fn open_log(path: &Path) -> Result<File, InvokeError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| InvokeError::Log { path: path.to_path_buf(), source })
}

/// Append one line to a scenario log.
pub fn append_log_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{line}")
}

impl Invoker for ProcessInvoker {
    fn launch(&self, job: &Job) -> Result<Launched, InvokeError> {
        let args = self.argv(job);
        let mut log = open_log(&job.log_path)?;
        let command_line = std::iter::once(self.program.display().to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(log, "Command: {command_line}")
            .map_err(|source| InvokeError::Log { path: job.log_path.clone(), source })?;

        let stdout = log
            .try_clone()
            .map_err(|source| InvokeError::Log { path: job.log_path.clone(), source })?;
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(log))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InvokeError::Spawn { program: self.program.clone(), source })?;

        let pid = child.id();
        let run_time = Utc::now().timestamp();
        let alarm_secs = i64::try_from(self.alarm.as_secs()).unwrap_or(i64::MAX);
        let deadline = run_time.saturating_add(alarm_secs).saturating_add(DEADLINE_SLACK_SECS);
        if let Err(e) = Progress::started(run_time, pid, deadline).write(&job.progress_path) {
            warn!(fingerprint = %job.fingerprint, error = %e, "could not mark run as started");
        }
        info!(fingerprint = %job.fingerprint, ?pid, "predictor started");

        let supervisor = tokio::spawn(supervise(child, job.clone(), self.alarm, run_time));
        Ok(Launched { pid, supervisor: Some(supervisor) })
    }
}

async fn supervise(mut child: Child, job: Job, alarm: Duration, run_time: i64) -> RunOutcome {
    let (outcome, progress) = match tokio::time::timeout(alarm, child.wait()).await {
        Ok(Ok(status)) => {
            let log = std::fs::read_to_string(&job.log_path).unwrap_or_default();
            let outcome = RunOutcome::Exited { success: status.success(), code: status.code() };
            (outcome, Progress::finished(run_time, status.success(), collect_warnings(&log)))
        }
        Ok(Err(e)) => {
            let msg = format!("wait failed: {e}");
            (RunOutcome::Lost(msg.clone()), Progress::failed(run_time, msg))
        }
        Err(_) => {
            if let Err(e) = child.kill().await {
                error!(fingerprint = %job.fingerprint, error = %e, "could not kill hung predictor");
            }
            let msg = format!("{ALARM_PREFIX} killed after {}s", alarm.as_secs());
            (RunOutcome::TimedOut, Progress::failed(run_time, msg))
        }
    };

    let _ = append_log_line(&job.log_path, &format!("Status: {outcome:?}"));
    if let Err(e) = progress.write(&job.progress_path) {
        error!(fingerprint = %job.fingerprint, error = %e, "could not record run outcome");
    }
    match &outcome {
        RunOutcome::Exited { success: true, .. } => debug!(fingerprint = %job.fingerprint, "predictor finished"),
        other => warn!(fingerprint = %job.fingerprint, outcome = ?other, "predictor did not finish cleanly"),
    }
    outcome
}

/// Whether `pid` has exited (gone or a zombie). `None` where it cannot be told.
#[cfg(target_os = "linux")]
pub fn process_exited(pid: u32) -> Option<bool> {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => {
            // pid (comm) state ...; comm may itself hold parentheses
            let state = stat.rsplit_once(')')?.1.trim_start().chars().next()?;
            Some(matches!(state, 'Z' | 'X' | 'x'))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Some(true),
        Err(_) => None,
    }
}

#[cfg(not(target_os = "linux"))]
pub fn process_exited(_pid: u32) -> Option<bool> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn exited_processes_are_told_apart_from_live_ones() {
        assert_eq!(process_exited(std::process::id()), Some(false));
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert_eq!(process_exited(pid), Some(true));
    }

    #[test]
    fn argv_is_a_list_not_a_shell_string() {
        let inv = ProcessInvoker {
            program: PathBuf::from("/opt/predict.py"),
            leading_args: vec!["--cd=/opt".into()],
            dataset_dir: PathBuf::from("/data/gfs"),
            alarm: Duration::from_secs(600),
        };
        let job = Job {
            fingerprint: "0123456789abcdef0123456789abcdef01234567".parse().unwrap(),
            preds_root: PathBuf::from("/srv/preds; rm -rf /"),
            log_path: PathBuf::from("/tmp/log.txt"),
            progress_path: PathBuf::from("/tmp/progress.json"),
        };
        assert_eq!(
            inv.argv(&job),
            vec![
                "--cd=/opt",
                "--preds",
                "/srv/preds; rm -rf /",
                "-v",
                "-s",
                "/data/gfs",
                "0123456789abcdef0123456789abcdef01234567",
            ]
        );
    }
}
