//! Text-to-Speech (TTS) Module
//!
//! Fetches raw PCM16 mono audio from the Fish Audio HTTP API for the call
//! platform's custom-voice requests.
//!
//! # Architecture
//!
//! ```text
//! Call platform → POST /api/synthesize → FishAudioClient → PCM bytes
//! ```

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::TtsConfig;

/// Sample rates the call platform accepts for custom voices
pub const SUPPORTED_SAMPLE_RATES: [u32; 4] = [8000, 16000, 22050, 24000];

#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    #[error("Fish Audio API key is not configured. Set FISH_API_SECRET or FISH_AUDIO_API_KEY.")]
    NotConfigured,
    #[error("Fish Audio returned {status}: {message}")]
    Upstream { status: StatusCode, message: String },
    #[error("TTS request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// One synthesis job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub format: &'static str,
    pub sample_rate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    pub latency: String,
}

impl SynthesisRequest {
    pub fn pcm(text: impl Into<String>, sample_rate: u32, reference_id: Option<String>, latency: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: "pcm",
            sample_rate,
            reference_id,
            latency: latency.into(),
        }
    }
}

/// Speech synthesis backend
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, TtsError>;
}

/// Fish Audio REST client
#[derive(Clone)]
pub struct FishAudioClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FishAudioClient {
    pub fn from_config(config: &TtsConfig) -> Result<Self, TtsError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Synthesizer for FishAudioClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, TtsError> {
        let api_key = self.api_key.as_deref().ok_or(TtsError::NotConfigured)?;

        let response = self
            .client
            .post(format!("{}/v1/tts", self.base_url))
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(status = %status, message = %message, "Fish Audio request failed");
            return Err(TtsError::Upstream { status, message });
        }

        let mut audio = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            audio.extend_from_slice(&chunk?);
        }

        debug!(bytes = audio.len(), "Fish Audio stream finished");
        Ok(align_pcm16(audio))
    }
}

/// Drop a trailing odd byte so the buffer holds whole 16-bit samples
pub fn align_pcm16(mut audio: Vec<u8>) -> Vec<u8> {
    if audio.len() % 2 == 1 {
        audio.pop();
    }
    audio
}

/// Accept an integer or a string of digits
pub fn parse_sample_rate(raw: &serde_json::Value) -> Option<u32> {
    match raw {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
        _ => None,
    }
}

pub fn is_supported_sample_rate(rate: u32) -> bool {
    SUPPORTED_SAMPLE_RATES.contains(&rate)
}
