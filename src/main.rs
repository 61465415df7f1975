//! callwatch - outbound AI calls with webhook status tracking

use callwatch::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides; default is info so server activity is visible
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    cli::run().await
}
