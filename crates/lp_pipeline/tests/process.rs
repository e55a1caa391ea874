//! Real child processes under the supervisor: `/bin/sh <script>` stands in for the predictor.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use lp_core::fields::RawRequest;
use lp_io::progress::Progress;
use lp_io::{JsonlAuditLog, ScenarioStore};
use lp_pipeline::{
    LaunchWindow, Lookup, Pipeline, PipelineError, ProcessInvoker, RunOutcome, ServiceConfig,
    SubmitOutcome,
};

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("{body}\n")).unwrap();
    path
}

fn raw() -> RawRequest {
    lp_core::query::decode("52.2135,0.0964,50,2025-03-01T12:00:00Z,5,30000,5")
        .unwrap()
        .to_raw()
}

fn pipeline(dir: &Path, script: PathBuf, alarm: Duration) -> Pipeline {
    let store = ScenarioStore::open(dir.join("preds")).unwrap();
    let audit = JsonlAuditLog::open(dir.join("audit.jsonl")).unwrap();
    let invoker = ProcessInvoker {
        program: PathBuf::from("/bin/sh"),
        leading_args: vec![script.display().to_string()],
        dataset_dir: dir.join("datasets"),
        alarm,
    };
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap();
    Pipeline::new(store, Arc::new(audit), Arc::new(invoker), LaunchWindow::default())
        .with_clock(Arc::new(move || now))
}

// $1=--preds $2=<root> $3=-v $4=-s $5=<dataset> $6=<fingerprint>
const WRITE_PATH: &str = r#"echo "WARN: forecast edge reached"
printf '1740830400,52.2,0.1,50\n1740832200,52.3,0.4,30000\n1740834000,52.4,0.9,20\n' > "$2/$6/flight_path.csv""#;

#[tokio::test]
async fn successful_run_completes_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(dir.path(), "predict.sh", WRITE_PATH);
    let pl = pipeline(dir.path(), program, Duration::from_secs(30));

    let sub = pl.submit(&raw()).unwrap();
    let fp = sub.fingerprint.clone();
    let outcome = sub.run.unwrap().wait().await.unwrap();
    assert_eq!(outcome, RunOutcome::Exited { success: true, code: Some(0) });

    let log = fs::read_to_string(pl.store().log_path(&fp)).unwrap();
    assert!(log.starts_with("Command: "), "log was: {log}");
    assert!(log.contains(fp.as_str()));

    let progress = Progress::read(&pl.store().progress_path(&fp)).unwrap().unwrap();
    assert!(progress.pred_complete);
    assert!(progress.warnings);
    assert_eq!(progress.pred_output, vec!["WARN: forecast edge reached".to_string()]);
    assert_eq!((progress.pid, progress.deadline), (None, None));

    let Lookup::Complete(result) = lp_pipeline::lookup(pl.store(), &fp).unwrap() else {
        panic!("expected a complete prediction");
    };
    assert_eq!(result.burst_point().unwrap().altitude, 30000.0);
}

#[tokio::test]
async fn hung_run_is_killed_by_the_alarm() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(dir.path(), "hang.sh", "exec sleep 30");
    let pl = pipeline(dir.path(), program, Duration::from_millis(300));

    let sub = pl.submit(&raw()).unwrap();
    let fp = sub.fingerprint.clone();
    assert_eq!(sub.run.unwrap().wait().await, Some(RunOutcome::TimedOut));

    let progress = Progress::read(&pl.store().progress_path(&fp)).unwrap().unwrap();
    assert!(progress.error.unwrap().starts_with("alarm:"));
    assert!(matches!(lp_pipeline::lookup(pl.store(), &fp).unwrap(), Lookup::Failed(_)));
}

#[tokio::test]
async fn missing_program_is_an_invocation_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = ScenarioStore::open(dir.path().join("preds")).unwrap();
    let audit = JsonlAuditLog::open(dir.path().join("audit.jsonl")).unwrap();
    let invoker = ProcessInvoker {
        program: dir.path().join("no-such-predictor"),
        leading_args: Vec::new(),
        dataset_dir: dir.path().join("datasets"),
        alarm: Duration::from_secs(5),
    };
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap();
    let pl = Pipeline::new(store, Arc::new(audit), Arc::new(invoker), LaunchWindow::default())
        .with_clock(Arc::new(move || now));

    let err = pl.submit(&raw()).unwrap_err();
    assert!(matches!(err, PipelineError::Invocation(_)), "got {err:?}");
    let fp = pl.store().list().unwrap().remove(0);
    let log = fs::read_to_string(pl.store().log_path(&fp)).unwrap();
    assert!(log.starts_with("Command: "));
    assert!(log.contains("launch failed:"));
}

#[tokio::test]
async fn from_config_wires_a_working_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(dir.path(), "predict.sh", WRITE_PATH);
    let cfg = ServiceConfig {
        preds_dir: dir.path().join("preds"),
        predictor: PathBuf::from("/bin/sh"),
        predictor_args: vec![program.display().to_string()],
        ..ServiceConfig::default()
    };
    let pl = Pipeline::from_config(&cfg)
        .unwrap()
        .with_clock(Arc::new(|| Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap()));
    let sub = pl.submit(&raw()).unwrap();
    sub.run.unwrap().wait().await;
    assert!(cfg.audit_log_path().is_file());
    assert!(matches!(lp_pipeline::lookup(pl.store(), &sub.fingerprint).unwrap(), Lookup::Complete(_)));
}

#[cfg(target_os = "linux")]
fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap()
}

#[cfg(target_os = "linux")]
fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let start = std::time::Instant::now();
    while !done() {
        assert!(start.elapsed() < Duration::from_secs(10), "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(target_os = "linux")]
#[test]
fn run_cut_off_by_shutdown_is_failed_and_relaunched() {
    let dir = tempfile::tempdir().unwrap();
    // The first attempt hangs; any later one writes its flight path at once.
    let marker = dir.path().join("first-attempt");
    let body = format!(
        "if [ ! -e \"{m}\" ]; then : > \"{m}\"; sleep 30; fi\n{WRITE_PATH}",
        m = marker.display()
    );
    let program = script(dir.path(), "predict.sh", &body);
    let pl = pipeline(dir.path(), program, Duration::from_secs(60));

    let rt = runtime();
    let fp = rt.block_on(async { pl.submit(&raw()).unwrap().fingerprint });
    wait_until("the first attempt to start", || marker.exists());
    let progress = Progress::read(&pl.store().progress_path(&fp)).unwrap().unwrap();
    assert!(progress.pred_running && progress.pid.is_some() && progress.deadline.is_some());
    assert_eq!(lp_pipeline::lookup(pl.store(), &fp).unwrap(), Lookup::Pending);

    // Shutting the runtime down drops the supervisor, which kills the child.
    drop(rt);
    wait_until("the run to settle", || {
        lp_pipeline::lookup(pl.store(), &fp).unwrap() != Lookup::Pending
    });
    let Lookup::Failed(reason) = lp_pipeline::lookup(pl.store(), &fp).unwrap() else {
        panic!("expected a failed run");
    };
    assert!(reason.starts_with("abandoned:"), "{reason}");

    let rt = runtime();
    let (outcome, run) = rt.block_on(async {
        let sub = pl.submit(&raw()).unwrap();
        (sub.outcome, sub.run.unwrap().wait().await)
    });
    assert_eq!(outcome, SubmitOutcome::Relaunched);
    assert_eq!(run, Some(RunOutcome::Exited { success: true, code: Some(0) }));
    assert!(matches!(lp_pipeline::lookup(pl.store(), &fp).unwrap(), Lookup::Complete(_)));
}
