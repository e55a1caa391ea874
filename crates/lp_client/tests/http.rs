//! HttpSource and a full chain against a live router on a loopback port.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use lp_client::{ChainOptions, ChainSession, FetchError, HttpSource, PredictionSource, Termination};
use lp_core::RequestParameters;
use lp_io::progress::Progress;
use lp_io::store::FLIGHT_PATH_FILE;
use lp_io::{JsonlAuditLog, ScenarioStore};
use lp_pipeline::{InvokeError, Invoker, Job, LaunchWindow, Launched, Pipeline};
use lp_server::{router, AppState};

/// Finishes each run shortly after it is launched.
struct DelayedInvoker {
    delay: Duration,
}

impl Invoker for DelayedInvoker {
    fn launch(&self, job: &Job) -> Result<Launched, InvokeError> {
        Progress::running(0).write(&job.progress_path).unwrap();
        let csv = job.preds_root.join(job.fingerprint.as_str()).join(FLIGHT_PATH_FILE);
        let progress = job.progress_path.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            std::fs::write(csv, "1740830400,52.2,0.1,50\n1740832200,52.3,0.4,30000\n1740834000,52.4,359.9,20\n").unwrap();
            Progress::finished(0, true, vec![]).write(&progress).unwrap();
        });
        Ok(Launched::detached(None))
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 11, 30, 0).unwrap()
}

/// Server whose launch window reaches three hours ahead of `now()`.
async fn spawn_server(dir: &std::path::Path, delay: Duration) -> String {
    let store = ScenarioStore::open(dir.join("preds")).unwrap();
    let audit = JsonlAuditLog::open(dir.join("audit.jsonl")).unwrap();
    let pipeline = Pipeline::new(
        store,
        Arc::new(audit),
        Arc::new(DelayedInvoker { delay }),
        LaunchWindow::from_hours(1, 3).unwrap(),
    )
    .with_clock(Arc::new(now));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(AppState { pipeline })).await.unwrap();
    });
    format!("http://{addr}")
}

fn base() -> RequestParameters {
    lp_core::query::decode("52.2135,0.0964,50,2025-03-01T12:00:00Z,5,30000,5").unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pending_scenario_is_polled_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let url = spawn_server(dir.path(), Duration::from_millis(50)).await;
    let source = HttpSource::new(url).with_poll_interval(Duration::from_millis(10));

    let result = source.fetch(&base()).await.unwrap();
    assert_eq!(result.prediction.len(), 5);
    assert_eq!(result.last_point().unwrap().altitude, 20.0);

    // Second fetch is a cache hit and answers at once.
    let again = source.fetch(&base()).await.unwrap();
    assert_eq!(again, result);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejection_and_exhaustion_are_fetch_errors() {
    let dir = tempfile::tempdir().unwrap();
    let url = spawn_server(dir.path(), Duration::from_secs(30)).await;
    let source = HttpSource::new(url).with_poll_interval(Duration::from_millis(5)).with_max_polls(3);

    let late = base().with_launch_datetime(Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap());
    match source.fetch(&late).await {
        Err(FetchError::Rejected { status: 400, kind, .. }) => assert_eq!(kind, "ValidationError"),
        other => panic!("expected a rejection, got {other:?}"),
    }

    assert!(matches!(source.fetch(&base()).await, Err(FetchError::Exhausted { polls: 3, .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chain_runs_until_the_launch_window_closes() {
    let dir = tempfile::tempdir().unwrap();
    let url = spawn_server(dir.path(), Duration::from_millis(20)).await;
    let source = HttpSource::new(url).with_poll_interval(Duration::from_millis(10));
    let session = ChainSession::new(source).with_options(ChainOptions::default());

    let report = session.run(&base(), now()).await;

    // 11:00 .. 14:00 fit in now + 3h; 15:00 does not.
    assert_eq!(report.chain.len(), 4);
    let Termination::Failed { launch, reason } = &report.termination else {
        panic!("expected failure, got {:?}", report.termination)
    };
    assert_eq!(*launch, Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap());
    assert!(reason.contains("ValidationError"), "{reason}");

    let line = lp_client::geojson::landing_line(&report.chain);
    let coords = line["geometry"]["coordinates"].as_array().unwrap();
    assert_eq!(coords.len(), 4);
    assert!((coords[0][0].as_f64().unwrap() + 0.1).abs() < 1e-9);
}
