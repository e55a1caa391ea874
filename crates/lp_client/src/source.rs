//! crates/lp_client/src/source.rs
//! Where a chain gets its predictions from.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, trace};

use lp_core::{Field, Fingerprint, PredictionResult, RequestParameters, Stage};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success answer carrying the server's `{type, description}`.
    #[error("{kind} ({status}): {description}")]
    Rejected { status: u16, kind: String, description: String },

    #[error("scenario {fingerprint} still pending after {polls} polls")]
    Exhausted { fingerprint: Fingerprint, polls: u32 },

    #[error("no prediction available: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PredictionSource: Send + Sync {
    /// One complete prediction for exactly `params`.
    async fn fetch(&self, params: &RequestParameters) -> Result<PredictionResult, FetchError>;
}

#[async_trait]
impl<S: PredictionSource + ?Sized> PredictionSource for std::sync::Arc<S> {
    async fn fetch(&self, params: &RequestParameters) -> Result<PredictionResult, FetchError> {
        (**self).fetch(params).await
    }
}

/* ---------------- HTTP ---------------- */

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_POLLS: u32 = 300;

/// Talks to the `/api/v1` surface: submit, then poll while the run is pending.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base: String,
    client: reqwest::Client,
    poll_interval: Duration,
    max_polls: u32,
}

#[derive(Deserialize)]
struct Answer {
    fingerprint: Fingerprint,
    #[serde(default)]
    prediction: Option<Vec<Stage>>,
}

enum Answered {
    Ready(PredictionResult),
    Pending(Fingerprint),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    description: String,
}

impl HttpSource {
    /// `base` is the server root, e.g. `http://127.0.0.1:8080`.
    pub fn new(base: impl Into<String>) -> Self {
        HttpSource {
            base: base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn with_poll_interval(mut self, every: Duration) -> Self {
        self.poll_interval = every;
        self
    }

    pub fn with_max_polls(mut self, polls: u32) -> Self {
        self.max_polls = polls;
        self
    }

    fn query(params: &RequestParameters) -> Vec<(&'static str, String)> {
        Field::ALL.iter().map(|f| (f.key(), params.text(*f))).collect()
    }

    /// 200 → result, 202 → fingerprint to poll, anything else → error.
    async fn interpret(resp: reqwest::Response) -> Result<Answered, FetchError> {
        let status = resp.status();
        match status {
            StatusCode::OK | StatusCode::ACCEPTED => {
                let answer: Answer = resp.json().await?;
                match (status, answer.prediction) {
                    (StatusCode::OK, Some(prediction)) => Ok(Answered::Ready(PredictionResult { prediction })),
                    (StatusCode::OK, None) => {
                        Err(FetchError::Unavailable(format!("answer for {} has no prediction", answer.fingerprint)))
                    }
                    _ => Ok(Answered::Pending(answer.fingerprint)),
                }
            }
            _ => {
                let text = resp.text().await?;
                let (kind, description) = match serde_json::from_str::<ErrorBody>(&text) {
                    Ok(body) => (body.error.kind, body.error.description),
                    Err(_) => ("HttpError".to_string(), text),
                };
                Err(FetchError::Rejected { status: status.as_u16(), kind, description })
            }
        }
    }
}

#[async_trait]
impl PredictionSource for HttpSource {
    async fn fetch(&self, params: &RequestParameters) -> Result<PredictionResult, FetchError> {
        let submit = self
            .client
            .get(format!("{}/api/v1/", self.base))
            .query(&Self::query(params))
            .send()
            .await?;
        let fingerprint = match Self::interpret(submit).await? {
            Answered::Ready(result) => return Ok(result),
            Answered::Pending(fp) => fp,
        };
        debug!(fingerprint = %fingerprint, "pending; polling");

        let url = format!("{}/api/v1/prediction/{}", self.base, fingerprint);
        for poll in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;
            trace!(fingerprint = %fingerprint, poll, "poll");
            if let Answered::Ready(result) = Self::interpret(self.client.get(&url).send().await?).await? {
                return Ok(result);
            }
        }
        Err(FetchError::Exhausted { fingerprint, polls: self.max_polls })
    }
}
