//! crates/lp_client/src/chain.rs
//! Hourly chain: one fetch at a time, launch times strictly increasing,
//! stop at the first failure.
//!
//! `Idle → Requesting(t) → Appending(t) → Requesting(t + 1h) → … → Terminated`

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use lp_core::time::{hour_floor, next_hour};
use lp_core::{Fingerprint, PredictionResult, RequestParameters, TrajectoryPoint};

use crate::source::PredictionSource;

#[derive(Debug, Clone, PartialEq)]
pub enum ChainState {
    Idle,
    Requesting(DateTime<Utc>),
    Appending(DateTime<Utc>),
    Terminated(Termination),
}

/// Why a chain stopped. None of these is an error to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// The fetch for `launch` failed; earlier hours stand.
    Failed { launch: DateTime<Utc>, reason: String },
    /// `max_hours` links accumulated.
    Limit,
    /// A newer chain started; everything from this one was dropped.
    Superseded,
}

/// One successful hour.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainLink {
    pub launch_time: DateTime<Utc>,
    pub fingerprint: Fingerprint,
    pub landing: TrajectoryPoint,
}

/// Successful hours in increasing launch-time order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollingChain {
    links: Vec<ChainLink>,
}

impl PollingChain {
    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn landing_points(&self) -> impl Iterator<Item = &TrajectoryPoint> {
        self.links.iter().map(|l| &l.landing)
    }

    fn push(&mut self, link: ChainLink) {
        debug_assert!(self.links.last().map_or(true, |l| l.launch_time < link.launch_time));
        self.links.push(link);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainReport {
    pub chain: PollingChain,
    pub termination: Termination,
}

/// Options shared by every chain of a session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainOptions {
    /// Stop after this many hours; unbounded when `None`.
    pub max_hours: Option<usize>,
}

/// Run one chain for `base` (launch time ignored) starting at the hour
/// containing `now`.
///
/// `is_current` is asked before every fetch and `accept` after every success;
/// either answering `false` ends the chain as superseded.
pub async fn run_chain<S, C, A>(
    source: &S,
    base: &RequestParameters,
    now: DateTime<Utc>,
    options: ChainOptions,
    is_current: C,
    mut accept: A,
) -> ChainReport
where
    S: PredictionSource + ?Sized,
    C: Fn() -> bool,
    A: FnMut(&ChainLink, PredictionResult) -> bool,
{
    let mut chain = PollingChain::default();
    let mut state = ChainState::Idle;

    let termination = loop {
        state = match state {
            ChainState::Idle => ChainState::Requesting(hour_floor(now)),

            ChainState::Requesting(_) if options.max_hours.is_some_and(|max| chain.len() >= max) => {
                ChainState::Terminated(Termination::Limit)
            }
            ChainState::Requesting(_) if !is_current() => ChainState::Terminated(Termination::Superseded),
            ChainState::Requesting(launch) => {
                let params = base.with_launch_datetime(launch);
                let fingerprint = lp_core::fingerprint(&params);
                debug!(hour = %launch, fingerprint = %fingerprint, "requesting");
                match source.fetch(&params).await {
                    Ok(result) => match result.last_point().copied() {
                        Some(landing) => {
                            let link = ChainLink { launch_time: launch, fingerprint, landing };
                            if accept(&link, result) {
                                chain.push(link);
                                ChainState::Appending(launch)
                            } else {
                                ChainState::Terminated(Termination::Superseded)
                            }
                        }
                        None => ChainState::Terminated(Termination::Failed {
                            launch,
                            reason: "prediction has no landing point".into(),
                        }),
                    },
                    Err(e) => ChainState::Terminated(Termination::Failed { launch, reason: e.to_string() }),
                }
            }

            ChainState::Appending(launch) => ChainState::Requesting(next_hour(launch)),

            ChainState::Terminated(t) => break t,
        };
    };

    if termination == Termination::Superseded {
        chain = PollingChain::default();
    }
    info!(hours = chain.len(), termination = ?termination, "chain finished");
    ChainReport { chain, termination }
}
