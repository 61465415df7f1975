//! Configuration management
//!
//! Settings for the tracker server, the completion-wait client and the
//! third-party APIs. Read from a TOML file, then overridden by environment
//! variables for secrets and deployment-specific values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shortest pause between tracker lookups
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Completion-wait client settings
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Call platform settings
    #[serde(default)]
    pub platform: PlatformConfig,
    /// Opening-line LLM settings
    #[serde(default)]
    pub llm: LlmConfig,
    /// TTS bridge settings
    #[serde(default)]
    pub tts: TtsConfig,
    /// Remote search tool server
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Expected `X-Server-Secret` header value. Unset disables the check.
    #[serde(default)]
    pub shared_secret: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shared_secret: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Base URL of the status tracker server
    #[serde(default = "default_tracker_url")]
    pub base_url: String,
    /// Total wait budget in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Seconds between lookups
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,
    /// Per-lookup HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_tracker_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_secs() -> f64 {
    1.0
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: default_tracker_url(),
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl TrackerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Never shorter than [`MIN_POLL_INTERVAL`]; values too large for a
    /// `Duration` saturate.
    pub fn poll_interval(&self) -> Duration {
        let secs = self.poll_interval_secs;
        if secs.is_nan() || secs <= 0.0 {
            return MIN_POLL_INTERVAL;
        }
        Duration::try_from_secs_f64(secs)
            .unwrap_or(Duration::MAX)
            .max(MIN_POLL_INTERVAL)
    }

    pub fn validate(&self) -> Result<()> {
        let secs = self.poll_interval_secs;
        if !secs.is_finite() || secs < 0.0 {
            anyhow::bail!("tracker.poll_interval_secs must be a finite, non-negative number of seconds (got {})", secs);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_platform_url")]
    pub base_url: String,
    /// Loaded from the environment, never written to disk
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Outbound caller number registered with the platform
    #[serde(default)]
    pub phone_number_id: String,
    /// Voice assistant that runs the call
    #[serde(default)]
    pub assistant_id: String,
}

fn default_platform_url() -> String {
    "https://api.vapi.ai".to_string()
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: default_platform_url(),
            api_key: None,
            phone_number_id: String::new(),
            assistant_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub base_url: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Name the assistant introduces itself with
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
}

fn default_llm_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_llm_model() -> String {
    "gemini-flash-latest".to_string()
}

fn default_assistant_name() -> String {
    "Poke".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            api_key: None,
            model: default_llm_model(),
            assistant_name: default_assistant_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_tts_url")]
    pub base_url: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Voice used when the request names none
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default = "default_latency")]
    pub latency: String,
}

fn default_tts_url() -> String {
    "https://api.fish.audio".to_string()
}

fn default_latency() -> String {
    "balanced".to_string()
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: default_tts_url(),
            api_key: None,
            reference_id: None,
            latency: default_latency(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    /// MCP endpoint of the search tool server
    #[serde(default)]
    pub mcp_url: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Config {
    /// Load configuration from `path`, or the default location when `None`.
    /// A missing file yields defaults. Environment overrides apply either way.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => config_path()?,
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
            toml::from_str(&contents).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.tracker.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`, or the default location when `None`
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => config_path()?,
        };
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(secret) = var("TTS_SERVER_SECRET") {
            self.server.shared_secret = Some(secret);
        }
        if let Some(url) = var("TRACKER_URL") {
            self.tracker.base_url = url;
        }

        if let Some(key) = var("VAPI_API_KEY") {
            self.platform.api_key = Some(key);
        }
        if let Some(id) = var("VAPI_PHONE_NUMBER_ID") {
            self.platform.phone_number_id = id;
        }
        if let Some(id) = var("VAPI_ASSISTANT_ID") {
            self.platform.assistant_id = id;
        }

        if let Some(key) = var("GEMINI_API_KEY") {
            self.llm.api_key = Some(key);
        }

        if let Some(key) = var("FISH_API_SECRET").or_else(|| var("FISH_AUDIO_API_KEY")) {
            self.tts.api_key = Some(key);
        }
        if let Some(id) = var("FISH_REFERENCE_ID") {
            self.tts.reference_id = Some(id);
        }
        if let Some(latency) = var("FISH_LATENCY_MODE") {
            self.tts.latency = latency;
        }

        if let Some(url) = var("BRIGHT_DATA_MCP_URL") {
            self.search.mcp_url = Some(url);
        }
        if let Some(key) = var("BRIGHT_DATA_API_KEY") {
            self.search.api_key = Some(key);
        }
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "callwatch", "callwatch")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Render the effective configuration with secrets masked
pub fn show_config(config: &Config) -> String {
    let mask = |value: &Option<String>| if value.is_some() { "set" } else { "not set" };

    let mut out = String::new();
    out.push_str(&format!("server:   {}:{} (shared secret {})\n",
        config.server.host, config.server.port, mask(&config.server.shared_secret)));
    out.push_str(&format!("tracker:  {} (timeout {}s, poll every {}s)\n",
        config.tracker.base_url, config.tracker.timeout_secs, config.tracker.poll_interval_secs));
    out.push_str(&format!("platform: {} (api key {}, assistant '{}')\n",
        config.platform.base_url, mask(&config.platform.api_key), config.platform.assistant_id));
    out.push_str(&format!("llm:      {} model {} (api key {})\n",
        config.llm.base_url, config.llm.model, mask(&config.llm.api_key)));
    out.push_str(&format!("tts:      {} latency {} (api key {})\n",
        config.tts.base_url, config.tts.latency, mask(&config.tts.api_key)));
    out.push_str(&format!("search:   {}\n",
        config.search.mcp_url.as_deref().unwrap_or("not configured")));
    out
}
