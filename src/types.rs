//! Shared types used across modules
//!
//! The call lifecycle model shared by the registry, the HTTP surface and the
//! completion-wait client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque vendor payload (analysis, result). Its schema belongs to the call
/// platform and is never validated here.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Lifecycle label reported by the call platform
///
/// Known labels get their own variant; anything else is kept verbatim in
/// `Unknown` so newer platform labels round-trip untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CallStatus {
    Scheduled,
    Queued,
    Ringing,
    InProgress,
    Forwarding,
    Ended,
    Unknown(String),
}

impl CallStatus {
    /// Parse a platform label
    pub fn from_label(label: &str) -> Self {
        match label {
            "scheduled" => CallStatus::Scheduled,
            "queued" => CallStatus::Queued,
            "ringing" => CallStatus::Ringing,
            "in-progress" => CallStatus::InProgress,
            "forwarding" => CallStatus::Forwarding,
            "ended" => CallStatus::Ended,
            other => CallStatus::Unknown(other.to_string()),
        }
    }

    /// Platform label for this status
    pub fn as_str(&self) -> &str {
        match self {
            CallStatus::Scheduled => "scheduled",
            CallStatus::Queued => "queued",
            CallStatus::Ringing => "ringing",
            CallStatus::InProgress => "in-progress",
            CallStatus::Forwarding => "forwarding",
            CallStatus::Ended => "ended",
            CallStatus::Unknown(label) => label,
        }
    }

    /// No further transitions are expected after a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Ended)
    }
}

impl From<String> for CallStatus {
    fn from(label: String) -> Self {
        CallStatus::from_label(&label)
    }
}

impl From<CallStatus> for String {
    fn from(status: CallStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known lifecycle state of one outbound call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: String,
    pub status: CallStatus,
    #[serde(default)]
    pub analysis: Option<Payload>,
    #[serde(default)]
    pub result: Option<Payload>,
    pub updated_at: DateTime<Utc>,
}

/// One normalized status-update event for a call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusUpdate {
    pub call_id: String,
    pub status: Option<CallStatus>,
    pub analysis: Option<Payload>,
    pub result: Option<Payload>,
}

impl StatusUpdate {
    pub fn new(call_id: impl Into<String>, status: CallStatus) -> Self {
        Self {
            call_id: call_id.into(),
            status: Some(status),
            analysis: None,
            result: None,
        }
    }
}
