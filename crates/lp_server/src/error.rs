//! crates/lp_server/src/error.rs
//! API error payloads: `{"error": {"type", "description"[, "problems"]}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use lp_core::Problem;
use lp_io::StoreError;
use lp_pipeline::PipelineError;

#[derive(Debug)]
pub enum ApiError {
    Validation(Vec<Problem>),
    NotFound(String),
    Storage(String),
    Invocation(String),
    /// The predictor ran (or tried to) and produced no usable result.
    Prediction(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(_)
            | ApiError::Invocation(_)
            | ApiError::Prediction(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "ValidationError",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Storage(_) => "StorageError",
            ApiError::Invocation(_) => "InvocationError",
            ApiError::Prediction(_) => "PredictionError",
            ApiError::Internal(_) => "InternalError",
        }
    }

    fn description(&self) -> String {
        match self {
            ApiError::Validation(problems) => {
                format!("{} problem(s) with the request", problems.len())
            }
            ApiError::NotFound(d)
            | ApiError::Storage(d)
            | ApiError::Invocation(d)
            | ApiError::Prediction(d)
            | ApiError::Internal(d) => d.clone(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Validation(problems) => ApiError::Validation(problems),
            PipelineError::Storage(e) => ApiError::Storage(e.to_string()),
            PipelineError::Invocation(e) => ApiError::Invocation(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Storage(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), description = %self.description(), "request failed");
        }
        let mut body = json!({ "type": self.kind(), "description": self.description() });
        if let ApiError::Validation(problems) = &self {
            body["problems"] = json!(problems);
        }
        (status, Json(json!({ "error": body }))).into_response()
    }
}
