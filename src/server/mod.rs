//! Web server: status tracker endpoints and the TTS bridge

pub mod auth;
pub mod http;
pub mod synthesize;
pub mod webhook;

use anyhow::{Context, Result};
use axum::{
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{Config, TtsConfig};
use crate::registry::{CallRegistry, InMemoryRegistry};
use crate::voice::{FishAudioClient, Synthesizer};

use self::http::ApiError;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub registry: Arc<dyn CallRegistry>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub tts: Arc<TtsConfig>,
    /// Expected `X-Server-Secret` value, if the check is enabled
    pub shared_secret: Option<Arc<str>>,
}

impl ServerState {
    pub fn new(
        registry: Arc<dyn CallRegistry>,
        synthesizer: Arc<dyn Synthesizer>,
        tts: TtsConfig,
        shared_secret: Option<String>,
    ) -> Self {
        Self {
            registry,
            synthesizer,
            tts: Arc::new(tts),
            shared_secret: shared_secret.map(Arc::from),
        }
    }

    /// In-memory registry plus the Fish Audio client
    pub fn from_config(config: &Config) -> Result<Self> {
        let synthesizer = FishAudioClient::from_config(&config.tts).context("Failed to create TTS client")?;
        Ok(Self::new(
            InMemoryRegistry::new(),
            Arc::new(synthesizer),
            config.tts.clone(),
            config.server.shared_secret.clone(),
        ))
    }
}

/// Build the router. `/health` stays open; everything else sits behind the
/// shared-secret check when one is configured.
pub fn create_app(state: ServerState) -> Router {
    let protected = Router::new()
        .route("/webhook", post(webhook::webhook_handler))
        .route("/calls/{call_id}", get(http::lookup_handler))
        .route("/api/synthesize", post(synthesize::synthesize_handler))
        .layer(middleware::from_fn_with_state(state.clone(), auth::secret_middleware));

    let public = Router::new().route("/health", get(http::health_handler));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "Request handler panicked");
    ApiError::Internal(anyhow::anyhow!("handler panicked: {}", detail)).into_response()
}

/// Start the web server
pub async fn start(config: Config) -> Result<()> {
    let state = ServerState::from_config(&config)?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;

    let app = create_app(state);

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("     callwatch server starting");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Binding to: {}", addr);
    if config.server.shared_secret.is_some() {
        println!("✓ Shared secret required (X-Server-Secret)");
    } else {
        println!("⚠ No shared secret configured, endpoints are open");
    }
    if config.tts.api_key.is_none() {
        println!("⚠ TTS API key missing, /api/synthesize will fail");
    }
    println!();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
