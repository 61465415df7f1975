//! CLI interface for callwatch

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::agent::{CallInitiator, CallRequest};
use crate::config::{self, Config};
use crate::tools::SearchClient;
use crate::tracker::{StatusSource, TrackerClient, WaitPolicy};

#[derive(Parser)]
#[command(name = "callwatch")]
#[command(about = "Outbound AI phone calls with webhook-driven status tracking", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a config file (default: platform config directory)
    #[arg(short, long, global = true, env = "CALLWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the status tracker and TTS bridge
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Shared secret expected in X-Server-Secret
        #[arg(long)]
        secret: Option<String>,
    },
    /// Place a call and wait for its outcome
    Call {
        /// Number to dial, E.164 format
        #[arg(long)]
        phone: String,
        /// Person the call is made for
        #[arg(long)]
        name: String,
        /// What the assistant should accomplish
        #[arg(long)]
        notes: String,
    },
    /// Wait for an existing call to end, falling back to the platform
    Wait {
        /// Call id returned by the platform
        call_id: String,
        /// Total wait budget in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Seconds between tracker lookups
        #[arg(long)]
        interval: Option<f64>,
    },
    /// Show the tracker's latest record for a call
    Status {
        /// Call id returned by the platform
        call_id: String,
    },
    /// Search the web through the configured search tool server
    Search {
        /// Search query
        query: String,
        /// Search engine: google, bing or yandex
        #[arg(short, long, default_value = "google")]
        engine: String,
    },
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Print the config file location
    Path,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port, host, secret } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            if secret.is_some() {
                config.server.shared_secret = secret;
            }
            crate::server::start(config).await?;
        }
        Commands::Call { phone, name, notes } => {
            let initiator = CallInitiator::from_config(&config)?;
            let report = initiator
                .make_call(&CallRequest { phone_number: phone, name, notes })
                .await;
            print_json(&report)?;
        }
        Commands::Wait { call_id, timeout, interval } => {
            if let Some(timeout) = timeout {
                config.tracker.timeout_secs = timeout;
            }
            if let Some(interval) = interval {
                config.tracker.poll_interval_secs = interval;
            }
            config.tracker.validate()?;
            let initiator = CallInitiator::from_config(&config)?;
            println!(
                "Waiting up to {}s for call {}...",
                WaitPolicy::from_config(&config.tracker).timeout.as_secs(),
                call_id
            );
            let report = initiator.await_outcome(&call_id).await;
            print_json(&report)?;
        }
        Commands::Status { call_id } => {
            let client = TrackerClient::from_config(&config.tracker, config.server.shared_secret.clone())?;
            match client.fetch(&call_id).await.context("Tracker lookup failed")? {
                Some(record) => print_json(&record)?,
                None => anyhow::bail!("No status recorded for call {}", call_id),
            }
        }
        Commands::Search { query, engine } => {
            if !crate::tools::search::ENGINES.contains(&engine.as_str()) {
                anyhow::bail!(
                    "Unknown engine '{}'. Available: {}",
                    engine,
                    crate::tools::search::ENGINES.join(", ")
                );
            }
            let client = SearchClient::from_config(&config.search)?;
            let results = client.search(&query, &engine).await;
            client.close().await;
            println!("{}", results?);
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                print!("{}", config::show_config(&config));
            }
            ConfigCommands::Init { force } => {
                let path = match cli.config.clone() {
                    Some(path) => path,
                    None => config::config_path()?,
                };
                if path.exists() && !force {
                    anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
                }
                let written = Config::default().save(Some(&path))?;
                println!("Wrote default configuration to {}", written.display());
            }
            ConfigCommands::Path => {
                let path = match cli.config {
                    Some(path) => path,
                    None => config::config_path()?,
                };
                println!("{}", path.display());
            }
        },
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
