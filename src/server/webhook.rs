//! Call platform webhook ingestion
//!
//! The platform posts every server message to one URL as
//! `{"message": {"type": ..., ...}}`. Only `status-update` messages change
//! the registry; everything else is acknowledged and dropped so the platform
//! never retries a message we simply do not care about.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::server::http::ApiError;
use crate::server::ServerState;
use crate::types::{CallStatus, Payload, StatusUpdate};

/// Message type that carries lifecycle changes
pub const STATUS_UPDATE: &str = "status-update";

/// Webhook acknowledgement
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct WebhookAck {
    pub received: bool,
    pub recorded: bool,
}

/// Normalize a webhook body. `Ok(None)` means a well-formed event of a type
/// we ignore.
pub fn parse_event(body: &Value) -> Result<Option<StatusUpdate>, ApiError> {
    let message = body
        .get("message")
        .filter(|m| m.is_object())
        .ok_or_else(|| ApiError::BadRequest("Missing message object".to_string()))?;

    let kind = message
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("Missing message type".to_string()))?;

    if kind != STATUS_UPDATE {
        return Ok(None);
    }

    let call_id = message
        .pointer("/call/id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing call id".to_string()))?;

    Ok(Some(StatusUpdate {
        call_id: call_id.to_string(),
        status: message.get("status").and_then(Value::as_str).map(CallStatus::from_label),
        analysis: object(message.get("analysis")),
        result: object(message.get("result")),
    }))
}

fn object(value: Option<&Value>) -> Option<Payload> {
    value.and_then(Value::as_object).cloned()
}

/// `POST /webhook`
pub async fn webhook_handler(
    State(state): State<ServerState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<WebhookAck>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let Some(update) = parse_event(&body)? else {
        let kind = body.pointer("/message/type").and_then(Value::as_str).unwrap_or_default();
        debug!(kind, "Ignoring webhook event");
        return Ok(Json(WebhookAck { received: true, recorded: false }));
    };

    let record = state.registry.record(update).await?;
    info!(call_id = %record.call_id, status = %record.status, "Call status updated");

    Ok(Json(WebhookAck { received: true, recorded: true }))
}
