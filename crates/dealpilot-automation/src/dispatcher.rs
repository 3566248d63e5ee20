//! Routes a parsed action config to its executor.

use std::time::Duration;

use dealpilot_core::types::{ActionConfig, Signal, Timestamp};

use crate::capability::Capabilities;
use crate::executor::{
    ActionContext, ActionOutcome, AdvanceStageExecutor, CreateTaskExecutor,
    SendNotificationExecutor, UpdateDealFieldExecutor,
};

pub struct ActionDispatcher {
    advance_stage: AdvanceStageExecutor,
    create_task: CreateTaskExecutor,
    send_notification: SendNotificationExecutor,
    update_deal_field: UpdateDealFieldExecutor,
}

impl ActionDispatcher {
    /// Build the executors. `timeout` bounds every individual capability call.
    pub fn new(capabilities: Capabilities, timeout: Duration) -> Self {
        Self {
            advance_stage: AdvanceStageExecutor::new(capabilities.pipeline, timeout),
            create_task: CreateTaskExecutor::new(capabilities.tasks, timeout),
            send_notification: SendNotificationExecutor::new(capabilities.notifier, timeout),
            update_deal_field: UpdateDealFieldExecutor::new(capabilities.fields, timeout),
        }
    }

    pub async fn dispatch(&self, action: &ActionConfig, signal: &Signal, now: Timestamp) -> ActionOutcome {
        let ctx = ActionContext::new(signal, now);
        match action {
            ActionConfig::AdvanceStage(config) => self.advance_stage.execute(config, &ctx).await,
            ActionConfig::CreateTask(config) => self.create_task.execute(config, &ctx).await,
            ActionConfig::SendNotification(config) => {
                self.send_notification.execute(config, &ctx).await
            }
            ActionConfig::UpdateDealField(config) => {
                self.update_deal_field.execute(config, &ctx).await
            }
        }
    }
}
