//! Custom-voice bridge
//!
//! The call platform posts `{"message": {"type": "voice-request", ...}}` and
//! expects raw PCM16 mono bytes back at the requested sample rate.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::server::ServerState;
use crate::voice::tts::{is_supported_sample_rate, parse_sample_rate, SUPPORTED_SAMPLE_RATES};
use crate::voice::{SynthesisRequest, TtsError};

fn error_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

/// Non-empty string at `pointer`; null and blank count as absent
fn reference_at<'a>(message: &'a Value, pointer: &str) -> Option<&'a str> {
    message
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// `POST /api/synthesize`
pub async fn synthesize_handler(State(state): State<ServerState>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let started = Instant::now();
    info!(request_id = %request_id, "TTS request started");

    let payload: Option<Value> = serde_json::from_slice(&body).ok();
    let Some(message) = payload
        .as_ref()
        .and_then(|p| p.get("message"))
        .filter(|m| m.is_object())
    else {
        debug!(request_id = %request_id, "Request missing message object");
        return error_response(StatusCode::BAD_REQUEST, json!({ "error": "Missing message object" }));
    };

    if message.get("type").and_then(Value::as_str) != Some("voice-request") {
        debug!(request_id = %request_id, "Invalid message type");
        return error_response(StatusCode::BAD_REQUEST, json!({ "error": "Invalid message type" }));
    }

    let Some(text) = message
        .get("text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        debug!(request_id = %request_id, "Invalid text payload");
        return error_response(StatusCode::BAD_REQUEST, json!({ "error": "Invalid or missing text" }));
    };

    let Some(sample_rate) = message
        .get("sampleRate")
        .and_then(parse_sample_rate)
        .filter(|rate| is_supported_sample_rate(*rate))
    else {
        debug!(request_id = %request_id, sample_rate = ?message.get("sampleRate"), "Unsupported sample rate");
        let mut supported = SUPPORTED_SAMPLE_RATES.to_vec();
        supported.sort_unstable();
        return error_response(
            StatusCode::BAD_REQUEST,
            json!({
                "error": "Unsupported sample rate",
                "supportedSampleRates": supported,
            }),
        );
    };

    let requested_reference =
        reference_at(message, "/referenceId").or_else(|| reference_at(message, "/voice/referenceId"));
    if let Some(reference) = requested_reference {
        info!(request_id = %request_id, reference_id = reference, "Using caller-supplied voice");
    }
    let reference_id = requested_reference
        .map(str::to_string)
        .or_else(|| state.tts.reference_id.clone());

    let request = SynthesisRequest::pcm(text, sample_rate, reference_id, state.tts.latency.clone());

    let audio = match state.synthesizer.synthesize(&request).await {
        Ok(audio) => audio,
        Err(TtsError::Upstream { status, .. }) => {
            return error_response(
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": "Fish Audio returned an error",
                    "statusCode": status.as_u16(),
                    "requestId": request_id,
                }),
            );
        }
        Err(e @ TtsError::NotConfigured) => {
            error!(request_id = %request_id, error = %e, "Configuration error");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": e.to_string(), "requestId": request_id }),
            );
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Unexpected error during synthesis");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "TTS synthesis failed", "requestId": request_id }),
            );
        }
    };

    if audio.is_empty() {
        error!(request_id = %request_id, "Empty audio buffer generated");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "TTS synthesis produced no audio", "requestId": request_id }),
        );
    }

    info!(
        request_id = %request_id,
        bytes = audio.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "TTS request completed"
    );

    let length = audio.len();
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
        ],
        Body::from(audio),
    )
        .into_response()
}
