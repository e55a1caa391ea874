//! Concurrent submitters racing on one fingerprint.

use std::sync::{Arc, Barrier};
use std::thread;

use lp_io::{fingerprint, EnsureOutcome, ScenarioStore};

#[test]
fn exactly_one_racer_creates() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ScenarioStore::open(dir.path().join("preds")).unwrap());
    let p = lp_core::query::decode("52.2135,0.0964,50,2025-03-01T12:00:00Z,5,30000,5").unwrap();
    let fp = fingerprint(&p);

    const RACERS: usize = 16;
    let barrier = Arc::new(Barrier::new(RACERS));
    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let (store, barrier, p, fp) = (store.clone(), barrier.clone(), p.clone(), fp.clone());
            thread::spawn(move || {
                barrier.wait();
                store.ensure_scenario(&fp, &p)
            })
        })
        .collect();

    let outcomes: Vec<EnsureOutcome> =
        handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();
    assert_eq!(outcomes.iter().filter(|o| o.created()).count(), 1);
    assert_eq!(outcomes.iter().filter(|o| !o.created()).count(), RACERS - 1);

    // The winner finished writing before returning.
    assert_eq!(store.get_scenario(&fp).unwrap(), Some(p.normalized()));
}

#[test]
fn unwritable_root_is_a_storage_error_not_a_hit() {
    let dir = tempfile::tempdir().unwrap();
    let store = ScenarioStore::open(dir.path().join("preds")).unwrap();
    let p = lp_core::query::decode("52.2135,0.0964,50,2025-03-01T12:00:00Z,5,30000,5").unwrap();
    let fp = fingerprint(&p);
    // Root replaced by a regular file: records cannot be created below it.
    std::fs::remove_dir(store.root()).unwrap();
    std::fs::write(store.root(), b"not a dir").unwrap();

    let err = store.ensure_scenario(&fp, &p).unwrap_err();
    assert!(matches!(err, lp_io::StoreError::Io { .. }));
}
