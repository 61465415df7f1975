//! Call initiator
//!
//! Places an outbound call and reports how it ended: draft an opener, create
//! the call, wait on the status tracker, and ask the platform directly when the
//! tracker has no definitive answer.

pub mod llm;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::platform::{AssistantOverrides, CallPlatform, Customer, NewCall, PlatformCall, VapiClient};
use crate::tracker::{wait_for_completion, Clock, StatusSource, TokioClock, TrackerClient, WaitOutcome, WaitPolicy};
use crate::types::{CallRecord, Payload};

use llm::{fallback_opening_line, GeminiClient, OpeningLineWriter};

/// Reported when a call ended without any outcome analysis
pub const NO_ANSWER_MESSAGE: &str = "The other party didn't pick up. Maybe try another time?";

/// Who to call and why
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub phone_number: String,
    pub name: String,
    /// Free-form notes for the assistant: purpose, preferences, constraints
    pub notes: String,
}

/// Where a report's data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    Tracker,
    Platform,
}

/// Final answer for one call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub analysis: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ReportSource>,
}

impl CallReport {
    pub fn failed(call_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.map(str::to_string),
            status: "error".to_string(),
            created_at: None,
            updated_at: None,
            analysis: None,
            result: None,
            error: Some(message.into()),
            source: None,
        }
    }

    fn from_record(record: CallRecord) -> Self {
        let error = record.analysis.is_none().then(|| NO_ANSWER_MESSAGE.to_string());
        Self {
            call_id: Some(record.call_id),
            status: record.status.to_string(),
            created_at: None,
            updated_at: Some(record.updated_at),
            analysis: record.analysis,
            result: record.result,
            error,
            source: Some(ReportSource::Tracker),
        }
    }

    fn from_platform(call: PlatformCall, result: Option<Payload>) -> Self {
        let analysis = call.analysis();
        let error = if !call.status.is_terminal() {
            Some(format!("call has not ended yet (status: {})", call.status))
        } else if analysis.is_none() {
            Some(NO_ANSWER_MESSAGE.to_string())
        } else {
            None
        };

        Self {
            call_id: Some(call.id),
            status: call.status.to_string(),
            created_at: call.created_at,
            updated_at: call.updated_at,
            analysis,
            result,
            error,
            source: Some(ReportSource::Platform),
        }
    }

    /// Whether the call finished with an outcome worth reading
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Drives a call from creation to its final report
pub struct CallInitiator {
    writer: Arc<dyn OpeningLineWriter>,
    platform: Arc<dyn CallPlatform>,
    tracker: Arc<dyn StatusSource>,
    clock: Arc<dyn Clock>,
    policy: WaitPolicy,
    phone_number_id: String,
    assistant_id: String,
    assistant_name: String,
}

impl CallInitiator {
    pub fn new(
        writer: Arc<dyn OpeningLineWriter>,
        platform: Arc<dyn CallPlatform>,
        tracker: Arc<dyn StatusSource>,
        policy: WaitPolicy,
    ) -> Self {
        Self {
            writer,
            platform,
            tracker,
            clock: Arc::new(TokioClock),
            policy,
            phone_number_id: String::new(),
            assistant_id: String::new(),
            assistant_name: "Poke".to_string(),
        }
    }

    /// Wire up the production clients from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let writer = GeminiClient::from_config(&config.llm).context("Failed to create LLM client")?;
        let platform = VapiClient::from_config(&config.platform).context("Failed to create call platform client")?;
        let tracker = TrackerClient::from_config(&config.tracker, config.server.shared_secret.clone())
            .context("Failed to create tracker client")?;

        Ok(Self::new(
            Arc::new(writer),
            Arc::new(platform),
            Arc::new(tracker),
            WaitPolicy::from_config(&config.tracker),
        )
        .with_assistant(&config.platform.phone_number_id, &config.platform.assistant_id)
        .with_assistant_name(&config.llm.assistant_name))
    }

    pub fn with_assistant(mut self, phone_number_id: &str, assistant_id: &str) -> Self {
        self.phone_number_id = phone_number_id.to_string();
        self.assistant_id = assistant_id.to_string();
        self
    }

    pub fn with_assistant_name(mut self, name: &str) -> Self {
        self.assistant_name = name.to_string();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Place a call and wait for its outcome. Failures are folded into the
    /// report rather than returned.
    pub async fn make_call(&self, request: &CallRequest) -> CallReport {
        let first_message = match self.writer.opening_line(&request.notes).await {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Opening line generation failed, using template");
                fallback_opening_line(&self.assistant_name, &request.name)
            }
        };

        let mut variables = Payload::new();
        variables.insert("name".to_string(), json!(request.name));

        let new_call = NewCall {
            phone_number_id: self.phone_number_id.clone(),
            assistant_id: self.assistant_id.clone(),
            customer: Customer { number: request.phone_number.clone() },
            assistant_overrides: AssistantOverrides {
                first_message,
                variable_values: variables,
            },
        };

        let created = match self.platform.create_call(&new_call).await {
            Ok(call) => call,
            Err(e) => {
                error!(error = %e, "Failed to create call");
                return CallReport::failed(None, e.to_string());
            }
        };

        info!(call_id = %created.id, "Waiting for call to end");
        self.await_outcome(&created.id).await
    }

    /// Wait on the tracker, then fall back to the platform if needed
    pub async fn await_outcome(&self, call_id: &str) -> CallReport {
        let outcome = wait_for_completion(self.tracker.as_ref(), call_id, self.policy, self.clock.as_ref()).await;

        match outcome {
            WaitOutcome::Completed(record) if record.analysis.is_some() => CallReport::from_record(record),
            WaitOutcome::Completed(record) => self.platform_report(call_id, Some(record)).await,
            WaitOutcome::TimedOut { attempts, .. } => {
                info!(call_id, attempts, "Tracker had no answer, asking the platform");
                self.platform_report(call_id, None).await
            }
        }
    }

    async fn platform_report(&self, call_id: &str, tracked: Option<CallRecord>) -> CallReport {
        match self.platform.get_call(call_id).await {
            Ok(call) => {
                let result = tracked.and_then(|r| r.result);
                CallReport::from_platform(call, result)
            }
            Err(e) => {
                warn!(call_id, error = %e, "Platform status lookup failed");
                match tracked {
                    Some(record) => CallReport::from_record(record),
                    None => CallReport::failed(Some(call_id), e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{MockCallPlatform, PlatformError};
    use crate::registry::{CallRegistry, InMemoryRegistry};
    use crate::tracker::wait::testing::ManualClock;
    use crate::tracker::TrackerError;
    use crate::types::{CallStatus, StatusUpdate};
    use async_trait::async_trait;
    use llm::{LlmError, MockOpeningLineWriter};
    use std::time::Duration;

    struct RegistrySource(Arc<InMemoryRegistry>);

    #[async_trait]
    impl StatusSource for RegistrySource {
        async fn fetch(&self, call_id: &str) -> Result<Option<CallRecord>, TrackerError> {
            Ok(self.0.lookup(call_id).await.expect("in-memory lookup"))
        }
    }

    fn platform_call(status: &str, analysis: serde_json::Value) -> PlatformCall {
        serde_json::from_value(json!({
            "id": "call-1",
            "status": status,
            "createdAt": "2025-01-01T10:00:00Z",
            "updatedAt": "2025-01-01T10:02:00Z",
            "analysis": analysis
        }))
        .unwrap()
    }

    fn writer(line: &'static str) -> MockOpeningLineWriter {
        let mut writer = MockOpeningLineWriter::new();
        writer.expect_opening_line().returning(move |_| Ok(line.to_string()));
        writer
    }

    fn initiator(
        writer: MockOpeningLineWriter,
        platform: MockCallPlatform,
        registry: Arc<InMemoryRegistry>,
    ) -> CallInitiator {
        CallInitiator::new(
            Arc::new(writer),
            Arc::new(platform),
            Arc::new(RegistrySource(registry)),
            WaitPolicy::new(Duration::from_secs(30), Duration::from_secs(1)),
        )
        .with_assistant("pn-1", "as-1")
        .with_clock(Arc::new(ManualClock::new()))
    }

    fn request() -> CallRequest {
        CallRequest {
            phone_number: "+15550000000".to_string(),
            name: "Devin".to_string(),
            notes: "Book a haircut tomorrow at noon".to_string(),
        }
    }

    #[tokio::test]
    async fn test_tracker_answer_with_analysis_skips_platform_lookup() {
        let registry = InMemoryRegistry::new();
        let mut update = StatusUpdate::new("call-1", CallStatus::Ended);
        update.analysis = json!({"summary": "booked"}).as_object().cloned();
        registry.record(update).await.unwrap();

        let mut platform = MockCallPlatform::new();
        platform
            .expect_create_call()
            .withf(|call| {
                call.assistant_overrides.first_message == "Hi! I'm Poke."
                    && call.customer.number == "+15550000000"
                    && call.assistant_id == "as-1"
            })
            .times(1)
            .returning(|_| Ok(platform_call("queued", json!(null))));
        platform.expect_get_call().never();

        let report = initiator(writer("Hi! I'm Poke."), platform, registry)
            .make_call(&request())
            .await;

        assert_eq!(report.status, "ended");
        assert_eq!(report.source, Some(ReportSource::Tracker));
        assert_eq!(report.analysis.unwrap()["summary"], "booked");
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_terminal_without_analysis_enriches_from_platform() {
        let registry = InMemoryRegistry::new();
        registry.record(StatusUpdate::new("call-1", CallStatus::Ended)).await.unwrap();

        let mut platform = MockCallPlatform::new();
        platform
            .expect_create_call()
            .returning(|_| Ok(platform_call("queued", json!(null))));
        platform
            .expect_get_call()
            .times(1)
            .returning(|_| Ok(platform_call("ended", json!({"summary": "Booked for noon"}))));

        let report = initiator(writer("Hi!"), platform, registry).make_call(&request()).await;

        assert_eq!(report.source, Some(ReportSource::Platform));
        assert_eq!(report.analysis.as_ref().unwrap()["summary"], "Booked for noon");
        assert!(report.created_at.is_some());
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_platform_snapshot() {
        let mut platform = MockCallPlatform::new();
        platform
            .expect_create_call()
            .returning(|_| Ok(platform_call("queued", json!(null))));
        platform
            .expect_get_call()
            .times(1)
            .returning(|_| Ok(platform_call("ended", json!({}))));

        let report = initiator(writer("Hi!"), platform, InMemoryRegistry::new())
            .make_call(&request())
            .await;

        assert_eq!(report.status, "ended");
        assert_eq!(report.source, Some(ReportSource::Platform));
        assert!(report.analysis.is_none());
        assert_eq!(report.error.as_deref(), Some(NO_ANSWER_MESSAGE));
    }

    #[tokio::test]
    async fn test_llm_failure_uses_template_opener() {
        let mut writer = MockOpeningLineWriter::new();
        writer
            .expect_opening_line()
            .returning(|_| Err(LlmError::Empty));

        let mut platform = MockCallPlatform::new();
        platform
            .expect_create_call()
            .withf(|call| call.assistant_overrides.first_message == "Hi! I'm Poke, calling on behalf of Devin.")
            .returning(|_| Ok(platform_call("queued", json!(null))));
        platform
            .expect_get_call()
            .returning(|_| Ok(platform_call("in-progress", json!(null))));

        let report = initiator(writer, platform, InMemoryRegistry::new())
            .make_call(&request())
            .await;

        assert_eq!(report.status, "in-progress");
        assert!(report.error.unwrap().contains("not ended"));
    }

    #[tokio::test]
    async fn test_create_failure_is_reported() {
        let mut platform = MockCallPlatform::new();
        platform.expect_create_call().returning(|_| Err(PlatformError::NotConfigured));
        platform.expect_get_call().never();

        let report = initiator(writer("Hi!"), platform, InMemoryRegistry::new())
            .make_call(&request())
            .await;

        assert_eq!(report.status, "error");
        assert!(report.call_id.is_none());
        assert!(report.error.unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_platform_failure_after_timeout_is_reported() {
        let mut platform = MockCallPlatform::new();
        platform.expect_get_call().returning(|_| Err(PlatformError::NotConfigured));

        let report = initiator(writer("Hi!"), platform, InMemoryRegistry::new())
            .await_outcome("call-9")
            .await;

        assert_eq!(report.status, "error");
        assert_eq!(report.call_id.as_deref(), Some("call-9"));
    }

    #[test]
    fn test_report_serialization() {
        let report = CallReport::failed(None, "boom");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, json!({"status": "error", "analysis": null, "error": "boom"}));
    }
}
