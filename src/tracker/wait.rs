//! Completion wait
//!
//! Polls a [`StatusSource`] on a fixed interval until the call reaches a
//! terminal status or the wait budget runs out. Missing records and lookup
//! errors count as "not yet known"; only the timeout ends the wait without a
//! result, and even that is reported as an outcome rather than an error.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::StatusSource;
use crate::config::{TrackerConfig, MIN_POLL_INTERVAL};
use crate::types::CallRecord;

/// How long to wait and how often to ask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl WaitPolicy {
    /// `poll_interval` is raised to [`MIN_POLL_INTERVAL`] if shorter
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.timeout(), config.poll_interval())
    }
}

/// Time source for the wait loop
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of a wait
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// The tracker reported a terminal record
    Completed(CallRecord),
    /// No terminal status was observed within the budget
    TimedOut { elapsed: Duration, attempts: u32 },
}

impl WaitOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, WaitOutcome::Completed(_))
    }
}

/// Poll `source` for `call_id` until it reports a terminal status or
/// `policy.timeout` elapses.
///
/// The last sleep is clamped to the remaining budget, so the timeout is
/// reported at the first poll on or after the deadline and never before it.
pub async fn wait_for_completion(
    source: &dyn StatusSource,
    call_id: &str,
    policy: WaitPolicy,
    clock: &dyn Clock,
) -> WaitOutcome {
    let started = clock.now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        match source.fetch(call_id).await {
            Ok(Some(record)) if record.status.is_terminal() => {
                info!(call_id, attempts, status = %record.status, "Call reached terminal status");
                return WaitOutcome::Completed(record);
            }
            Ok(Some(record)) => {
                debug!(call_id, attempts, status = %record.status, "Call still active");
            }
            Ok(None) => {
                debug!(call_id, attempts, "No webhook recorded yet");
            }
            Err(e) => {
                warn!(call_id, attempts, error = %e, "Tracker lookup failed, will retry");
            }
        }

        let elapsed = clock.now().saturating_duration_since(started);
        if elapsed >= policy.timeout {
            warn!(call_id, attempts, elapsed_secs = elapsed.as_secs_f64(), "Timed out waiting for tracker");
            return WaitOutcome::TimedOut { elapsed, attempts };
        }

        let remaining = policy.timeout - elapsed;
        clock.sleep(policy.poll_interval.min(remaining)).await;
    }
}
