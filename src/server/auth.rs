//! Shared-secret authentication
//!
//! The call platform is configured to send a fixed secret header with every
//! webhook and voice request. There are no users or tokens beyond that.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::server::http::ApiError;
use crate::server::ServerState;

/// Header carrying the shared secret
pub const SECRET_HEADER: &str = "x-server-secret";

/// Axum middleware rejecting requests without the configured secret
pub async fn secret_middleware(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.shared_secret.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(provided) if secrets_match(provided, expected) => Ok(next.run(request).await),
        _ => {
            warn!(path = %request.uri().path(), "Rejected request with missing or wrong secret");
            Err(ApiError::Unauthorized)
        }
    }
}

/// Compare without short-circuiting on the first differing byte
fn secrets_match(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
