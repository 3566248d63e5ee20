//! `send_notification`: deliver a rendered message on every configured channel.
//!
//! Channels are attempted in order (`in_app`, `email`, `slack`), each with
//! its own timeout. One failing channel does not stop the others, but any
//! failure makes the whole action `failed`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};

use dealpilot_core::types::SendNotificationConfig;

use crate::capability::Notifier;
use crate::error::ExecutorError;
use crate::executor::{call_with_timeout, ActionContext, ActionOutcome};
use crate::template::render;

pub struct SendNotificationExecutor {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl SendNotificationExecutor {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    pub async fn execute(
        &self,
        config: &SendNotificationConfig,
        ctx: &ActionContext<'_>,
    ) -> ActionOutcome {
        let message = render(&config.message_template, &ctx.template);
        if message.trim().is_empty() {
            return ActionOutcome::from_error(&ExecutorError::EmptyRender("notification message"));
        }

        let mut channels = Map::new();
        let mut failed = Vec::new();
        for &channel in &config.channels {
            let sent = call_with_timeout(
                "notify",
                self.timeout,
                self.notifier
                    .send(channel, &message, ctx.signal.org_id, ctx.signal.deal_id),
            )
            .await;
            match sent {
                Ok(()) => {
                    channels.insert(channel.to_string(), Value::from("sent"));
                }
                Err(e) => {
                    let reason = match e {
                        ExecutorError::Capability { source, .. } => source.to_string(),
                        other => other.to_string(),
                    };
                    tracing::warn!(channel = %channel, error = %reason, "Notification channel failed");
                    channels.insert(channel.to_string(), Value::from(reason.clone()));
                    failed.push((channel, reason));
                }
            }
        }

        let result = json!({ "message": message, "channels": channels });
        if failed.is_empty() {
            ActionOutcome::success(result)
        } else {
            let err = ExecutorError::PartialChannelFailure { failed };
            ActionOutcome::failed(err.to_string(), Some(result))
        }
    }
}
