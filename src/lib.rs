//! callwatch - outbound AI phone calls with webhook status tracking
//!
//! - Status tracker: webhook ingestion and call status lookup over HTTP
//! - Completion wait: poll the tracker, fall back to the call platform
//! - Call initiator: LLM-drafted opener, outbound call, final report
//! - TTS bridge: custom-voice endpoint backed by Fish Audio
//! - Web search through a remote MCP tool server
//!
//! # Example
//!
//! ```ignore
//! use callwatch::{CallInitiator, CallRequest, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let initiator = CallInitiator::from_config(&config)?;
//!     let report = initiator.make_call(&CallRequest {
//!         phone_number: "+15550000000".into(),
//!         name: "Devin".into(),
//!         notes: "Book a haircut tomorrow at noon".into(),
//!     }).await;
//!     println!("{}", report.status);
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod config;
pub mod registry;
pub mod tracker;
pub mod platform;
pub mod agent;
pub mod voice;
pub mod tools;
pub mod server;
pub mod cli;

pub use agent::{CallInitiator, CallReport, CallRequest};
pub use config::Config;
pub use registry::{CallRegistry, InMemoryRegistry};
pub use server::{create_app, ServerState};
pub use tracker::{wait_for_completion, StatusSource, TrackerClient, WaitOutcome, WaitPolicy};
pub use types::{CallRecord, CallStatus, StatusUpdate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
