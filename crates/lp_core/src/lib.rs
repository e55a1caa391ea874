//! lp_core: Core types for the landing predictor.
//!
//! This crate is **I/O-free**. It defines the stable types shared by the
//! server-side crates (`lp_io`, `lp_pipeline`, `lp_server`), the chain client
//! (`lp_client`) and the `lp` binary.
//!
//! - Field table: the single ordered list of request keys and their rules
//! - `RequestParameters`: the validated, immutable unit of work
//! - `Problem`: one validation finding (`field-validation` | `other`)
//! - `Fingerprint`: 40-hex scenario identifier, and the SHA-1 that produces it
//! - Packed URL query codec (seven comma-joined fields)
//! - Prediction model: stages of trajectory points
//! - Launch-hour arithmetic (UTC)
//!
//! Serialization impls are gated behind the `serde` feature.

#![forbid(unsafe_code)]

pub mod fields;
pub mod hasher;
pub mod ids;
pub mod params;
pub mod prediction;
pub mod query;
pub mod time;

pub use fields::{Field, RawRequest, RawValue};
pub use hasher::{canonical_string, fingerprint};
pub use ids::{Fingerprint, IdError};
pub use params::{validate, Problem, RequestParameters};
pub use prediction::{PredictionResult, Stage, StageKind, TrajectoryPoint};
