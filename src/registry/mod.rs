//! Call status registry
//!
//! Keeps the latest lifecycle event per call id. Writes are last-write-wins:
//! inbound webhooks carry no sequence number, so a late delivery of an older
//! event can overwrite a newer status.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::{CallRecord, CallStatus, StatusUpdate};

/// Registry failures
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("status update has no call id")]
    MissingCallId,
    #[error("registry backend failed: {0}")]
    Backend(String),
}

/// Storage seam for call records
///
/// The HTTP surface only talks to this trait, so the in-memory map can be
/// swapped for a persistent store without touching handlers.
#[async_trait]
pub trait CallRegistry: Send + Sync {
    /// Apply an update, creating the record on first sight. Returns a snapshot
    /// of the record after the write.
    async fn record(&self, update: StatusUpdate) -> Result<CallRecord, RegistryError>;

    /// Snapshot of the record for `call_id`, if any event was ever recorded
    async fn lookup(&self, call_id: &str) -> Result<Option<CallRecord>, RegistryError>;

    /// Number of tracked calls
    async fn len(&self) -> usize;
}

/// Process-lifetime registry behind a single lock
#[derive(Default)]
pub struct InMemoryRegistry {
    records: Mutex<HashMap<String, CallRecord>>,
}

impl InMemoryRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl CallRegistry for InMemoryRegistry {
    async fn record(&self, update: StatusUpdate) -> Result<CallRecord, RegistryError> {
        if update.call_id.is_empty() {
            return Err(RegistryError::MissingCallId);
        }

        let mut records = self.records.lock().await;
        let now = Utc::now();
        let record = records
            .entry(update.call_id.clone())
            .or_insert_with(|| CallRecord {
                call_id: update.call_id.clone(),
                status: CallStatus::Unknown("unknown".to_string()),
                analysis: None,
                result: None,
                updated_at: now,
            });

        if let Some(status) = update.status {
            record.status = status;
        }
        if update.analysis.is_some() {
            record.analysis = update.analysis;
        }
        if update.result.is_some() {
            record.result = update.result;
        }
        record.updated_at = now;

        debug!(call_id = %record.call_id, status = %record.status, "Recorded call status");
        Ok(record.clone())
    }

    async fn lookup(&self, call_id: &str) -> Result<Option<CallRecord>, RegistryError> {
        let records = self.records.lock().await;
        Ok(records.get(call_id).cloned())
    }

    async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}
