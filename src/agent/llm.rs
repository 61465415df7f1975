//! Opening-line generation with the Gemini `generateContent` API

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM API key is not configured (set GEMINI_API_KEY)")]
    NotConfigured,
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("LLM returned no text")]
    Empty,
}

/// Drafts the first thing the voice assistant says on a call
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OpeningLineWriter: Send + Sync {
    async fn opening_line(&self, notes: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Gemini client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    assistant_name: String,
}

impl GeminiClient {
    /// A missing API key is reported on first use, so callers can still fall
    /// back to the template opener.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            assistant_name: config.assistant_name.clone(),
        })
    }

    fn prompt(&self, notes: &str) -> String {
        format!(
            "Write a two sentence first message for a voice assistant in the format of \
             \"Hi! I'm {}, calling on behalf of (NAME) (REASON).\"\n\nCall information notes: {}",
            self.assistant_name, notes
        )
    }

    fn request(&self, notes: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: Some(self.prompt(notes)) }],
            }],
            generation_config: json!({
                "thinkingConfig": { "thinkingBudget": 0 },
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "required": ["message"],
                    "properties": { "message": { "type": "STRING" } }
                }
            }),
        }
    }
}

#[async_trait]
impl OpeningLineWriter for GeminiClient {
    async fn opening_line(&self, notes: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::NotConfigured)?;
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&self.request(notes))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let body: GenerateResponse = response.json().await?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        debug!(chars = text.len(), "Opening line generated");
        extract_message(&text).ok_or(LlmError::Empty)
    }
}

/// Pull the `message` field out of the structured reply, falling back to the
/// raw text when the model ignored the schema.
pub fn extract_message(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string),
        _ => Some(trimmed.to_string()),
    }
}

/// Opener used when the LLM is unavailable
pub fn fallback_opening_line(assistant_name: &str, name: &str) -> String {
    format!("Hi! I'm {}, calling on behalf of {}.", assistant_name, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_structured_message() {
        let text = r#"{"message": "Hi! I'm Poke, calling on behalf of Devin to book a haircut."}"#;
        assert_eq!(
            extract_message(text).unwrap(),
            "Hi! I'm Poke, calling on behalf of Devin to book a haircut."
        );
    }

    #[test]
    fn test_extract_falls_back_to_raw_text() {
        assert_eq!(extract_message("  Hello there.  ").unwrap(), "Hello there.");
        assert!(extract_message("   ").is_none());
        assert!(extract_message(r#"{"other": 1}"#).is_none());
    }

    #[test]
    fn test_request_asks_for_json_message() {
        let client = GeminiClient::from_config(&LlmConfig {
            api_key: Some("key".to_string()),
            ..Default::default()
        })
        .unwrap();

        let request = serde_json::to_value(client.request("book a table")).unwrap();
        assert_eq!(request["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(request["generationConfig"]["thinkingConfig"]["thinkingBudget"], 0);
        let prompt = request["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("Hi! I'm Poke"));
        assert!(prompt.ends_with("book a table"));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let client = GeminiClient::from_config(&LlmConfig::default()).unwrap();
        let err = client.opening_line("anything").await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }
}
