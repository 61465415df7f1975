//! Status tracker client
//!
//! Queries the tracker's lookup endpoint on behalf of the call initiator and
//! waits for a call to reach a terminal status.

pub mod wait;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::config::TrackerConfig;
use crate::server::auth::SECRET_HEADER;
use crate::types::CallRecord;

pub use wait::{wait_for_completion, Clock, TokioClock, WaitOutcome, WaitPolicy};

/// Failures talking to the tracker. All of them are transient from the
/// wait loop's point of view.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tracker returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Anything that can report the last known record for a call
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// `Ok(None)` when no event was recorded for the call yet
    async fn fetch(&self, call_id: &str) -> Result<Option<CallRecord>, TrackerError>;
}

/// HTTP client for `GET /calls/{call_id}`
#[derive(Clone)]
pub struct TrackerClient {
    client: Client,
    base_url: String,
    secret: Option<String>,
}

impl TrackerClient {
    pub fn new(base_url: impl Into<String>, secret: Option<String>, request_timeout: Duration) -> Result<Self, TrackerError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret,
        })
    }

    pub fn from_config(config: &TrackerConfig, secret: Option<String>) -> Result<Self, TrackerError> {
        Self::new(
            config.base_url.clone(),
            secret,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn lookup_url(&self, call_id: &str) -> String {
        format!("{}/calls/{}", self.base_url, urlencode_segment(call_id))
    }
}

#[async_trait]
impl StatusSource for TrackerClient {
    async fn fetch(&self, call_id: &str) -> Result<Option<CallRecord>, TrackerError> {
        let mut request = self.client.get(self.lookup_url(call_id));
        if let Some(secret) = &self.secret {
            request = request.header(SECRET_HEADER, secret);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<CallRecord>().await?)),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(TrackerError::Status { status, body })
            }
        }
    }
}

/// Percent-encode a single path segment
pub(crate) fn urlencode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
