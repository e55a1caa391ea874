//! lp_server: HTTP result-fetch API over the submission pipeline.
//!
//! - `GET /api/v1/?<request keys>`   submit, then 200 / 202 / 400 / 500
//! - `GET /api/v1/prediction/:fp`    lookup only
//! - `GET /api/v1/scenario/:fp`      stored parameters
//! - `GET /api/v1/manifest`          completed scenarios

#![forbid(unsafe_code)]

use std::io;

use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use lp_pipeline::{Pipeline, PipelineError, ServiceConfig};

pub mod error;
mod routes;

pub use error::ApiError;

#[derive(Clone, Debug)]
pub struct AppState {
    pub pipeline: Pipeline,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/", get(routes::predict))
        .route("/api/v1/prediction/:fingerprint", get(routes::prediction))
        .route("/api/v1/scenario/:fingerprint", get(routes::scenario))
        .route("/api/v1/manifest", get(routes::manifest))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("bind/serve: {0}")]
    Io(#[from] io::Error),
}

/// Build the pipeline from `cfg` and serve on `cfg.bind` until ctrl-c.
pub async fn serve(cfg: &ServiceConfig) -> Result<(), ServeError> {
    let pipeline = Pipeline::from_config(cfg)?;
    let listener = TcpListener::bind(cfg.bind).await?;
    info!(addr = %listener.local_addr()?, preds = %cfg.preds_dir.display(), "listening");
    axum::serve(listener, router(AppState { pipeline }))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
