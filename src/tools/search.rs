//! Web search through a remote MCP search-engine tool server
//!
//! Connects over the MCP streamable-HTTP transport and calls the server's
//! `search_engine` tool. The connection is opened on first use and reused.

use rmcp::{
    model::{CallToolRequestParams, CallToolResult},
    service::RunningService,
    transport::streamable_http_client::{StreamableHttpClientTransport, StreamableHttpClientTransportConfig},
    RoleClient, ServiceExt,
};
use serde_json::Value;
use std::ops::Deref;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::SearchConfig;

const SEARCH_TOOL: &str = "search_engine";

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search server is not configured (set BRIGHT_DATA_MCP_URL)")]
    NotConfigured,
    #[error("failed to connect to search server: {0}")]
    Connect(String),
    #[error("search call failed: {0}")]
    Call(String),
    #[error("search tool failed: {0}")]
    Tool(String),
}

/// Search engines the remote tool understands
pub const ENGINES: [&str; 3] = ["google", "bing", "yandex"];

/// MCP client for the search tool
pub struct SearchClient {
    url: String,
    api_key: Option<String>,
    client: Mutex<Option<RunningService<RoleClient, ()>>>,
}

impl SearchClient {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key,
            client: Mutex::new(None),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        let url = config.mcp_url.clone().ok_or(SearchError::NotConfigured)?;
        Ok(Self::new(url, config.api_key.clone()))
    }

    /// Run a query and return the tool's text output
    pub async fn search(&self, query: &str, engine: &str) -> Result<String, SearchError> {
        let mut guard = self.client.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        let Some(client) = guard.as_ref() else {
            return Err(SearchError::Connect("connection unavailable".to_string()));
        };

        info!(query, engine, "Running web search");
        let result = client
            .call_tool(search_params(query, engine))
            .await
            .map_err(|e| SearchError::Call(e.to_string()))?;

        tool_text(&result)
    }

    /// Close the MCP session, if one was opened
    pub async fn close(&self) {
        if let Some(client) = self.client.lock().await.take() {
            if let Err(e) = client.cancel().await {
                debug!(error = %e, "MCP session did not shut down cleanly");
            }
        }
    }

    async fn connect(&self) -> Result<RunningService<RoleClient, ()>, SearchError> {
        let mut config = StreamableHttpClientTransportConfig::with_uri(self.url.as_str());
        if let Some(key) = &self.api_key {
            config = config.auth_header(key.clone());
        }
        let transport = StreamableHttpClientTransport::from_config(config);

        let client = ()
            .serve(transport)
            .await
            .map_err(|e| SearchError::Connect(e.to_string()))?;
        debug!(url = %self.url, "MCP session initialized");
        Ok(client)
    }
}

fn search_params(query: &str, engine: &str) -> CallToolRequestParams {
    CallToolRequestParams::new(SEARCH_TOOL).with_arguments(serde_json::Map::from_iter([
        ("query".to_string(), Value::String(query.to_string())),
        ("engine".to_string(), Value::String(engine.to_string())),
    ]))
}

/// Join the text items of a tool result. A result flagged as an error
/// becomes [`SearchError::Tool`] carrying the same text.
pub fn tool_text(result: &CallToolResult) -> Result<String, SearchError> {
    let text = result
        .content
        .iter()
        .filter_map(|content| content.deref().as_text())
        .map(|content| content.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    if result.is_error.unwrap_or(false) {
        return Err(SearchError::Tool(text));
    }
    Ok(text)
}
