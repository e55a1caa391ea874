//! crates/lp_server/src/routes.rs
//! Handlers. Store and pipeline calls block on the filesystem, so they run
//! on the blocking pool.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;

use lp_core::fields::{RawRequest, RawValue};
use lp_core::{Fingerprint, PredictionResult, RequestParameters};
use lp_pipeline::{build_manifest, lookup, Lookup};

use crate::error::ApiError;
use crate::AppState;

/// Query values arrive as text; the shared validator parses them.
pub(crate) fn raw_from_query(query: BTreeMap<String, String>) -> RawRequest {
    query.into_iter().map(|(k, v)| (k, RawValue::Text(v))).collect()
}

fn parse_fingerprint(s: &str) -> Result<Fingerprint, ApiError> {
    s.parse().map_err(|_| ApiError::NotFound(format!("no scenario {s}")))
}

fn pending(fp: &Fingerprint) -> Response {
    (StatusCode::ACCEPTED, Json(json!({ "fingerprint": fp, "status": "pending" }))).into_response()
}

fn complete(fp: &Fingerprint, request: Option<&RequestParameters>, result: &PredictionResult) -> Response {
    let mut body = json!({ "fingerprint": fp, "prediction": result.prediction });
    if let Some(p) = request {
        body["request"] = json!(p);
    }
    (StatusCode::OK, Json(body)).into_response()
}

/// `GET /api/v1/?launch_latitude=..&..`: submit, then report what is there.
pub async fn predict(
    State(state): State<AppState>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Result<Response, ApiError> {
    let raw = raw_from_query(query);
    let pipeline = state.pipeline.clone();
    let (sub, found) = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let sub = pipeline.submit(&raw)?;
        let found = lookup(pipeline.store(), &sub.fingerprint)?;
        Ok((sub, found))
    })
    .await??;
    debug!(fingerprint = %sub.fingerprint, outcome = ?sub.outcome, "submitted");

    match found {
        Lookup::Complete(result) => Ok(complete(&sub.fingerprint, Some(&sub.params), &result)),
        Lookup::Pending | Lookup::NotFound => Ok(pending(&sub.fingerprint)),
        Lookup::Failed(msg) => Err(ApiError::Prediction(msg)),
    }
}

/// `GET /api/v1/prediction/:fingerprint`: lookup only, never submits.
pub async fn prediction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let fp = parse_fingerprint(&id)?;
    let store = state.pipeline.store().clone();
    let key = fp.clone();
    let found = tokio::task::spawn_blocking(move || lookup(&store, &key)).await??;
    match found {
        Lookup::NotFound => Err(ApiError::NotFound(format!("no scenario {fp}"))),
        Lookup::Pending => Ok(pending(&fp)),
        Lookup::Failed(msg) => Err(ApiError::Prediction(msg)),
        Lookup::Complete(result) => Ok(complete(&fp, None, &result)),
    }
}

/// `GET /api/v1/scenario/:fingerprint`: the stored parameters.
pub async fn scenario(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let fp = parse_fingerprint(&id)?;
    let store = state.pipeline.store().clone();
    let key = fp.clone();
    match tokio::task::spawn_blocking(move || store.get_scenario(&key)).await?? {
        Some(p) => Ok(Json(json!({ "fingerprint": fp, "request": p })).into_response()),
        None => Err(ApiError::NotFound(format!("no scenario {fp}"))),
    }
}

/// `GET /api/v1/manifest`
pub async fn manifest(State(state): State<AppState>) -> Result<Response, ApiError> {
    let store = state.pipeline.store().clone();
    let manifest = tokio::task::spawn_blocking(move || build_manifest(&store)).await??;
    Ok(Json(manifest).into_response())
}
