//! Call platform client
//!
//! Places outbound calls and reads back the platform's own view of a call.
//! The initiator only asks the platform for status when the tracker could not
//! give a definitive answer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::PlatformConfig;
use crate::tracker::urlencode_segment;
use crate::types::{CallStatus, Payload};

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("call platform API key is not configured (set VAPI_API_KEY)")]
    NotConfigured,
    #[error("call platform request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("call platform returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

/// Request to place one outbound call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCall {
    pub phone_number_id: String,
    pub assistant_id: String,
    pub customer: Customer,
    pub assistant_overrides: AssistantOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantOverrides {
    pub first_message: String,
    pub variable_values: Payload,
}

/// The platform's view of a call
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCall {
    pub id: String,
    #[serde(default = "unknown_status")]
    pub status: CallStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Raw analysis field; see [`PlatformCall::analysis`]
    #[serde(default, rename = "analysis")]
    pub raw_analysis: Option<Value>,
}

fn unknown_status() -> CallStatus {
    CallStatus::Unknown("unknown".to_string())
}

impl PlatformCall {
    /// Outcome analysis, if the platform produced a usable one. Calls that
    /// never connected come back with the field missing, null, or an empty or
    /// non-object value; all of those mean "no analysis".
    pub fn analysis(&self) -> Option<Payload> {
        match &self.raw_analysis {
            Some(Value::Object(map)) if !map.is_empty() => Some(map.clone()),
            _ => None,
        }
    }
}

/// Outbound call operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallPlatform: Send + Sync {
    async fn create_call(&self, call: &NewCall) -> Result<PlatformCall, PlatformError>;
    async fn get_call(&self, call_id: &str) -> Result<PlatformCall, PlatformError>;
}

/// REST client for the Vapi call API
#[derive(Clone)]
pub struct VapiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl VapiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &PlatformConfig) -> Result<Self, PlatformError> {
        let api_key = config.api_key.clone().ok_or(PlatformError::NotConfigured)?;
        Self::new(config.base_url.clone(), api_key)
    }

    fn call_url(&self, call_id: &str) -> String {
        format!("{}/call/{}", self.base_url, urlencode_segment(call_id))
    }

    async fn parse(response: reqwest::Response) -> Result<PlatformCall, PlatformError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api { status, body });
        }
        Ok(response.json::<PlatformCall>().await?)
    }
}

#[async_trait]
impl CallPlatform for VapiClient {
    async fn create_call(&self, call: &NewCall) -> Result<PlatformCall, PlatformError> {
        let response = self
            .client
            .post(format!("{}/call", self.base_url))
            .bearer_auth(&self.api_key)
            .json(call)
            .send()
            .await?;

        let created = Self::parse(response).await?;
        info!(call_id = %created.id, status = %created.status, "Call created");
        Ok(created)
    }

    async fn get_call(&self, call_id: &str) -> Result<PlatformCall, PlatformError> {
        let response = self
            .client
            .get(self.call_url(call_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let call = Self::parse(response).await?;
        debug!(call_id, status = %call.status, "Fetched call from platform");
        Ok(call)
    }
}
