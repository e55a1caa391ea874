//! Session lifecycle: per-chain cache and cancellation of a chain in flight.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Notify;

use lp_client::{ChainOptions, ChainSession, FetchError, PredictionSource, Termination};
use lp_core::{PredictionResult, RequestParameters, Stage, StageKind, TrajectoryPoint};

/// Always succeeds; the first fetch waits for `release`.
#[derive(Default)]
struct Gated {
    entered: Notify,
    release: Notify,
    calls: AtomicUsize,
}

#[async_trait]
impl PredictionSource for Gated {
    async fn fetch(&self, p: &RequestParameters) -> Result<PredictionResult, FetchError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.entered.notify_one();
            self.release.notified().await;
        }
        let t = p.launch_datetime();
        let landing = TrajectoryPoint { datetime: t + Duration::hours(2), latitude: 52.0, longitude: 359.5, altitude: 5.0 };
        Ok(PredictionResult { prediction: vec![Stage { stage: StageKind::Land, trajectory: vec![landing] }] })
    }
}

fn base(burst: &str) -> RequestParameters {
    lp_core::query::decode(&format!("52.2135,0.0964,50,2025-03-01T12:00:00Z,5,{burst},5")).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 15, 0).unwrap()
}

#[tokio::test]
async fn cancelling_a_chain_in_flight_discards_its_results() {
    let session = ChainSession::new(Gated::default()).with_options(ChainOptions { max_hours: Some(3) });
    let base = base("30000");

    let (report, ()) = tokio::join!(session.run(&base, now()), async {
        session.source().entered.notified().await;
        session.cancel();
        session.source().release.notify_one();
    });

    assert_eq!(report.termination, Termination::Superseded);
    assert!(report.chain.is_empty());
    assert_eq!(session.cached(), 0);
    assert_eq!(session.source().calls.load(Ordering::SeqCst), 1);

    // The session is reusable afterwards.
    let report = session.run(&base, now()).await;
    assert_eq!(report.termination, Termination::Limit);
    assert_eq!(report.chain.len(), 3);
    assert_eq!(session.cached(), 3);
    let first = &report.chain.links()[0];
    assert_eq!(first.launch_time, Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
    assert!(session.result(&first.fingerprint).is_some());
}

#[tokio::test]
async fn a_new_chain_starts_with_an_empty_cache() {
    let source = Gated::default();
    source.release.notify_one();
    let session = ChainSession::new(source).with_options(ChainOptions { max_hours: Some(2) });

    let first = session.run(&base("30000"), now()).await;
    assert_eq!(session.cached(), 2);

    let second = session.run(&base("25000"), now()).await;
    assert_eq!(second.chain.len(), 2);
    assert_eq!(session.cached(), 2);
    for link in first.chain.links() {
        assert!(session.result(&link.fingerprint).is_none());
    }
}

#[tokio::test]
async fn zero_hour_limit_makes_no_requests() {
    let session = ChainSession::new(Gated::default()).with_options(ChainOptions { max_hours: Some(0) });
    let report = session.run(&base("30000"), now()).await;
    assert!(report.chain.is_empty());
    assert_eq!(report.termination, Termination::Limit);
    assert_eq!(session.source().calls.load(Ordering::SeqCst), 0);
}
