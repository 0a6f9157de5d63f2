//! Events the queue emits for telemetry; never coupled to any particular
//! metrics library, per the narrow observer-interface design note.

use serde::{Deserialize, Serialize};

/// The nine events the queue emits across an item's lifecycle.
///
/// The observable sequence for any single item is a prefix of:
/// `queue.new -> (queue.timeout | queue.abort | process.started ->
/// (process.success | process.failure | process.timeout | process.abort))`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// Item admitted to the waiting set.
    #[serde(rename = "queue.new")]
    QueueNew {
        /// The item's job id.
        job_id: String,
        /// Admission time, milliseconds since an arbitrary epoch.
        added_at_ms: u64,
    },
    /// Admission refused: the queue was already at `maxTaskCount`.
    #[serde(rename = "queue.full")]
    QueueFull {
        /// The item's job id.
        job_id: String,
    },
    /// Item aged out of the waiting set before it was started.
    #[serde(rename = "queue.timeout")]
    QueueTimeout {
        /// The item's job id.
        job_id: String,
        /// How long the item waited, in milliseconds.
        waited_ms: u64,
    },
    /// Item was removed from the waiting set by client cancellation.
    #[serde(rename = "queue.abort")]
    QueueAbort {
        /// The item's job id.
        job_id: String,
    },
    /// Item promoted from waiting to running.
    #[serde(rename = "process.started")]
    ProcessStarted {
        /// The item's job id.
        job_id: String,
        /// Start time, milliseconds since an arbitrary epoch.
        started_at_ms: u64,
    },
    /// Item's render completed successfully.
    #[serde(rename = "process.success")]
    ProcessSuccess {
        /// The item's job id.
        job_id: String,
        /// Wall-clock duration of the render, in milliseconds.
        duration_ms: u64,
    },
    /// Item's render failed with a non-cancellation error.
    #[serde(rename = "process.failure")]
    ProcessFailure {
        /// The item's job id.
        job_id: String,
        /// Wall-clock duration of the render, in milliseconds.
        duration_ms: u64,
    },
    /// Item was removed from the running set by client cancellation.
    #[serde(rename = "process.abort")]
    ProcessAbort {
        /// The item's job id.
        job_id: String,
    },
    /// Item exceeded `executionTimeoutMs` after it started running.
    #[serde(rename = "process.timeout")]
    ProcessTimeout {
        /// The item's job id.
        job_id: String,
        /// Wall-clock duration until the timeout fired, in milliseconds.
        duration_ms: u64,
    },
}

/// Narrow observer interface the queue reports through.
///
/// Deliberately not coupled to any particular metrics library: the
/// telemetry adapter implements this trait and translates each variant into
/// counter/timer/log calls.
pub trait QueueObserver: Send + Sync {
    /// Receive a single lifecycle event.
    fn on_event(&self, event: QueueEvent);
}

/// An observer that discards every event, for tests that do not assert on
/// telemetry output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl QueueObserver for NoopObserver {
    fn on_event(&self, _event: QueueEvent) {}
}

impl QueueEvent {
    /// Return the job id carried by every event variant.
    #[must_use]
    pub fn job_id(&self) -> &str {
        match self {
            Self::QueueNew { job_id, .. }
            | Self::QueueFull { job_id }
            | Self::QueueTimeout { job_id, .. }
            | Self::QueueAbort { job_id }
            | Self::ProcessStarted { job_id, .. }
            | Self::ProcessSuccess { job_id, .. }
            | Self::ProcessFailure { job_id, .. }
            | Self::ProcessAbort { job_id }
            | Self::ProcessTimeout { job_id, .. } => job_id,
        }
    }
}
