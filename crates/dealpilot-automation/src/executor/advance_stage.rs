//! `advance_stage`: move the deal to the next stage of its pipeline.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use dealpilot_core::types::AdvanceStageConfig;

use crate::capability::DealPipelineMutator;
use crate::executor::{call_with_timeout, ActionContext, ActionOutcome};

pub struct AdvanceStageExecutor {
    pipeline: Arc<dyn DealPipelineMutator>,
    timeout: Duration,
}

impl AdvanceStageExecutor {
    pub fn new(pipeline: Arc<dyn DealPipelineMutator>, timeout: Duration) -> Self {
        Self { pipeline, timeout }
    }

    pub async fn execute(&self, config: &AdvanceStageConfig, ctx: &ActionContext<'_>) -> ActionOutcome {
        if !config.advance_to_next {
            return ActionOutcome::skipped("stage advance disabled", None);
        }

        let deal_id = ctx.signal.deal_id;
        let advance = match call_with_timeout(
            "advance_to_next_stage",
            self.timeout,
            self.pipeline.advance_to_next_stage(deal_id),
        )
        .await
        {
            Ok(advance) => advance,
            Err(e) => return ActionOutcome::from_error(&e),
        };

        if advance.advanced {
            tracing::info!(
                deal_id = %deal_id,
                from = advance.from_stage.as_deref().unwrap_or(""),
                to = advance.to_stage.as_deref().unwrap_or(""),
                "Deal advanced to next stage"
            );
            ActionOutcome::success(json!({
                "from_stage": advance.from_stage,
                "to_stage": advance.to_stage,
            }))
        } else if advance.terminal {
            ActionOutcome::skipped(
                "deal already in final stage",
                Some(json!({ "stage": advance.from_stage })),
            )
        } else {
            ActionOutcome::failed(
                "stage was not advanced",
                Some(json!({ "stage": advance.from_stage })),
            )
        }
    }
}
