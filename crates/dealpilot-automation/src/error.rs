//! Error types for the automation engine.
//!
//! Only [`AutomationError`] ever reaches a caller of the engine. Capability
//! and executor errors end up as `failed` log entries.

use std::time::Duration;

use dealpilot_core::error::DealpilotError;
use dealpilot_core::types::NotificationChannel;

/// Errors reported by an external capability (deal store, task store, notifier).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Why an executor could not complete its action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    #[error("{capability} timed out after {timeout:?}")]
    Timeout {
        capability: &'static str,
        timeout: Duration,
    },
    #[error("{capability} failed: {source}")]
    Capability {
        capability: &'static str,
        #[source]
        source: CapabilityError,
    },
    #[error("notification failed for channels: {}", describe_failed_channels(.failed))]
    PartialChannelFailure {
        failed: Vec<(NotificationChannel, String)>,
    },
    #[error("rendered {0} is empty")]
    EmptyRender(&'static str),
    #[error("due date out of range: {0} days from now")]
    DueDateOutOfRange(u32),
}

fn describe_failed_channels(failed: &[(NotificationChannel, String)]) -> String {
    failed
        .iter()
        .map(|(channel, reason)| format!("{} ({})", channel, reason))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from the engine and the worker pool.
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("Failed to load rules: {0}")]
    RuleLoad(#[source] DealpilotError),
    #[error("Invalid signal: {0}")]
    InvalidSignal(String),
    #[error("Signal queue closed")]
    QueueClosed,
    /// The detached task evaluating a signal panicked or was cancelled.
    #[error("Signal processing aborted: {0}")]
    Aborted(String),
}
