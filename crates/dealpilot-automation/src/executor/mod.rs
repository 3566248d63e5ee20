//! Action executors.
//!
//! One executor per action kind. Executors never return errors to the
//! engine: every run ends in an [`ActionOutcome`] that becomes the status,
//! result and error message of the execution log entry.

pub mod advance_stage;
pub mod create_task;
pub mod send_notification;
pub mod update_deal_field;

use std::future::Future;
use std::time::Duration;

use serde_json::{json, Value};

use dealpilot_core::error::ConfigError;
use dealpilot_core::types::{ExecutionStatus, Signal, Timestamp};

use crate::error::{CapabilityError, ExecutorError};
use crate::template::TemplateContext;

pub use advance_stage::AdvanceStageExecutor;
pub use create_task::CreateTaskExecutor;
pub use send_notification::SendNotificationExecutor;
pub use update_deal_field::UpdateDealFieldExecutor;

/// Status, structured result and error message of one action run.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub status: ExecutionStatus,
    pub action_result: Option<Value>,
    pub error_message: Option<String>,
}

impl ActionOutcome {
    pub fn success(result: Value) -> Self {
        Self {
            status: ExecutionStatus::Success,
            action_result: Some(result),
            error_message: None,
        }
    }

    pub fn skipped(reason: impl Into<String>, result: Option<Value>) -> Self {
        Self {
            status: ExecutionStatus::Skipped,
            action_result: result,
            error_message: Some(reason.into()),
        }
    }

    pub fn failed(message: impl Into<String>, result: Option<Value>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            action_result: result,
            error_message: Some(message.into()),
        }
    }

    pub fn from_error(err: &ExecutorError) -> Self {
        let message = err.to_string();
        Self::failed(message.clone(), Some(json!({ "error": message })))
    }

    pub fn cooldown_active() -> Self {
        Self::skipped("cooldown active", None)
    }

    pub fn invalid_config(err: &ConfigError) -> Self {
        Self::failed(
            "invalid action config",
            Some(json!({ "error": err.to_string() })),
        )
    }
}

/// What an executor gets to work with for one dispatch.
#[derive(Debug)]
pub struct ActionContext<'a> {
    pub signal: &'a Signal,
    pub template: TemplateContext,
    /// Engine time at dispatch. Due dates and note stamps derive from it.
    pub now: Timestamp,
}

impl<'a> ActionContext<'a> {
    pub fn new(signal: &'a Signal, now: Timestamp) -> Self {
        Self {
            signal,
            template: TemplateContext::from_signal(signal),
            now,
        }
    }
}

/// Run a capability call, bounded by `timeout`.
pub(crate) async fn call_with_timeout<T, F>(
    capability: &'static str,
    timeout: Duration,
    call: F,
) -> Result<T, ExecutorError>
where
    F: Future<Output = Result<T, CapabilityError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(ExecutorError::Capability { capability, source }),
        Err(_) => Err(ExecutorError::Timeout {
            capability,
            timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_with_timeout_passes_through() {
        let value = call_with_timeout("probe", Duration::from_secs(1), async {
            Ok::<_, CapabilityError>(7)
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_call_with_timeout_wraps_capability_error() {
        let err = call_with_timeout("probe", Duration::from_secs(1), async {
            Err::<(), _>(CapabilityError::Rejected("no".to_string()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "probe failed: rejected: no");
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_with_timeout_expires() {
        let err = call_with_timeout("probe", Duration::from_secs(10), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, CapabilityError>(())
        })
        .await
        .unwrap_err();
        assert_eq!(
            err,
            ExecutorError::Timeout {
                capability: "probe",
                timeout: Duration::from_secs(10),
            }
        );
    }

    #[test]
    fn test_outcome_helpers() {
        let skipped = ActionOutcome::cooldown_active();
        assert_eq!(skipped.status, ExecutionStatus::Skipped);
        assert_eq!(skipped.error_message.as_deref(), Some("cooldown active"));
        assert!(skipped.action_result.is_none());

        let err = ConfigError::Invalid {
            action_type: dealpilot_core::types::ActionType::CreateTask,
            reason: "title_template must not be blank".to_string(),
        };
        let failed = ActionOutcome::invalid_config(&err);
        assert_eq!(failed.status, ExecutionStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("invalid action config"));
        assert_eq!(
            failed.action_result.unwrap()["error"],
            "create_task config is invalid: title_template must not be blank"
        );
    }
}
