//! `create_task`: open a follow-up task on the deal.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use dealpilot_core::types::CreateTaskConfig;

use crate::capability::{TaskCreator, TaskRequest};
use crate::error::ExecutorError;
use crate::executor::{call_with_timeout, ActionContext, ActionOutcome};
use crate::template::render;

pub struct CreateTaskExecutor {
    tasks: Arc<dyn TaskCreator>,
    timeout: Duration,
}

impl CreateTaskExecutor {
    pub fn new(tasks: Arc<dyn TaskCreator>, timeout: Duration) -> Self {
        Self { tasks, timeout }
    }

    pub async fn execute(&self, config: &CreateTaskConfig, ctx: &ActionContext<'_>) -> ActionOutcome {
        let title = render(&config.title_template, &ctx.template);
        if title.trim().is_empty() {
            return ActionOutcome::from_error(&ExecutorError::EmptyRender("task title"));
        }

        let Some(due_date) = ctx.now.checked_plus_days(i64::from(config.due_days)) else {
            return ActionOutcome::from_error(&ExecutorError::DueDateOutOfRange(config.due_days));
        };

        let request = TaskRequest {
            org_id: ctx.signal.org_id,
            deal_id: ctx.signal.deal_id,
            title,
            due_date,
            priority: config.priority,
        };

        match call_with_timeout("create_task", self.timeout, self.tasks.create_task(&request)).await {
            Ok(task_id) => {
                tracing::info!(
                    task_id = %task_id,
                    deal_id = %request.deal_id,
                    title = %request.title,
                    "Task created"
                );
                ActionOutcome::success(json!({
                    "task_id": task_id,
                    "title": request.title,
                    "due_date": request.due_date.to_datetime().to_rfc3339(),
                    "priority": request.priority,
                }))
            }
            Err(e) => ActionOutcome::from_error(&e),
        }
    }
}
