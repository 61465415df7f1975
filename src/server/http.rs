//! HTTP handlers for health and call status lookup, plus the error type all
//! JSON endpoints share

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

use crate::registry::RegistryError;
use crate::server::ServerState;

/// Error returned by the JSON endpoints
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(cause) = &self {
            error!(error = ?cause, "Internal error while handling request");
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::MissingCallId => ApiError::BadRequest(err.to_string()),
            RegistryError::Backend(_) => ApiError::Internal(err.into()),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tracked_calls: usize,
}

/// Health handler
pub async fn health_handler(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        tracked_calls: state.registry.len().await,
    })
}

/// Latest known record for one call
pub async fn lookup_handler(
    State(state): State<ServerState>,
    Path(call_id): Path<String>,
) -> Result<Response, ApiError> {
    match state.registry.lookup(&call_id).await? {
        Some(record) => Ok((StatusCode::OK, Json(record)).into_response()),
        None => {
            debug!(call_id = %call_id, "Lookup for unknown call");
            Err(ApiError::NotFound(format!("No status recorded for call {}", call_id)))
        }
    }
}
