//! lp_client: chained hourly retrieval of landing predictions.
//!
//! A chain asks for one prediction per hour, starting at the current hour,
//! and stops at the first hour that cannot be answered. The last point of
//! each answer is the landing site for that launch hour.

#![forbid(unsafe_code)]

pub mod chain;
pub mod geojson;
pub mod session;
pub mod source;

pub use chain::{run_chain, ChainLink, ChainOptions, ChainReport, ChainState, PollingChain, Termination};
pub use session::ChainSession;
pub use source::{FetchError, HttpSource, PredictionSource};
