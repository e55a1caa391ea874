//! crates/lp_client/src/session.rs
//! One user-visible "next N hours" view. Starting a new chain supersedes the
//! previous one: its in-flight result is dropped and its loop stops.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use lp_core::{Fingerprint, PredictionResult, RequestParameters};

use crate::chain::{run_chain, ChainOptions, ChainReport};
use crate::source::PredictionSource;

/// Results of the current chain, keyed by scenario.
#[derive(Debug, Default)]
struct ChainCache {
    generation: u64,
    results: BTreeMap<Fingerprint, PredictionResult>,
}

pub struct ChainSession<S> {
    source: S,
    options: ChainOptions,
    generation: AtomicU64,
    cache: Mutex<ChainCache>,
}

impl<S: PredictionSource> ChainSession<S> {
    pub fn new(source: S) -> Self {
        ChainSession {
            source,
            options: ChainOptions::default(),
            generation: AtomicU64::new(0),
            cache: Mutex::new(ChainCache::default()),
        }
    }

    pub fn with_options(mut self, options: ChainOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Drop the current chain's results and stop it at its next step.
    pub fn cancel(&self) {
        self.begin();
    }

    fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut cache = self.cache.lock();
        cache.generation = generation;
        cache.results.clear();
        generation
    }

    /// Start a new chain for `base`, superseding any chain still running.
    pub async fn run(&self, base: &RequestParameters, now: DateTime<Utc>) -> ChainReport {
        let generation = self.begin();
        debug!(generation, "chain started");
        run_chain(
            &self.source,
            base,
            now,
            self.options,
            || self.generation.load(Ordering::SeqCst) == generation,
            |link, result| {
                let mut cache = self.cache.lock();
                if cache.generation != generation {
                    return false;
                }
                cache.results.insert(link.fingerprint.clone(), result);
                true
            },
        )
        .await
    }

    /// Full result of one hour of the current chain.
    pub fn result(&self, fp: &Fingerprint) -> Option<PredictionResult> {
        self.cache.lock().results.get(fp).cloned()
    }

    pub fn cached(&self) -> usize {
        self.cache.lock().results.len()
    }
}
