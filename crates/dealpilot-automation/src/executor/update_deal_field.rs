//! `update_deal_field`: write a rendered value into a deal field.
//!
//! `next_step` is replaced. `notes` gets a timestamped line appended.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use dealpilot_core::types::{DealField, UpdateDealFieldConfig};

use crate::capability::{DealFieldUpdater, FieldWrite};
use crate::error::ExecutorError;
use crate::executor::{call_with_timeout, ActionContext, ActionOutcome};
use crate::template::render;

pub struct UpdateDealFieldExecutor {
    fields: Arc<dyn DealFieldUpdater>,
    timeout: Duration,
}

impl UpdateDealFieldExecutor {
    pub fn new(fields: Arc<dyn DealFieldUpdater>, timeout: Duration) -> Self {
        Self { fields, timeout }
    }

    pub async fn execute(
        &self,
        config: &UpdateDealFieldConfig,
        ctx: &ActionContext<'_>,
    ) -> ActionOutcome {
        let value = render(&config.value_template, &ctx.template);
        if value.trim().is_empty() {
            return ActionOutcome::from_error(&ExecutorError::EmptyRender("field value"));
        }

        let write = match config.field {
            DealField::NextStep => FieldWrite::Replace(value.clone()),
            DealField::Notes => FieldWrite::Append(format!(
                "[{}] {}",
                ctx.now.to_datetime().format("%Y-%m-%d %H:%M UTC"),
                value
            )),
        };

        let deal_id = ctx.signal.deal_id;
        match call_with_timeout(
            "update_deal_field",
            self.timeout,
            self.fields.update_field(deal_id, config.field, write),
        )
        .await
        {
            Ok(()) => {
                tracing::info!(deal_id = %deal_id, field = %config.field, "Deal field updated");
                ActionOutcome::success(json!({ "field": config.field, "value": value }))
            }
            Err(e) => ActionOutcome::from_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{DealRecord, InMemoryDeals};
    use dealpilot_core::types::{ExecutionStatus, Signal, Timestamp, TriggerType};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn signal(deal_id: Uuid, step: &str) -> Signal {
        let mut context = BTreeMap::new();
        context.insert("next_step".to_string(), json!(step));
        Signal {
            trigger_type: TriggerType::NextMeetingScheduled,
            confidence: 0.95,
            call_type_id: None,
            deal_id,
            meeting_id: None,
            org_id: Uuid::new_v4(),
            context,
            observed_at: Timestamp(0),
        }
    }

    fn seeded() -> (Arc<InMemoryDeals>, Uuid) {
        let deals = Arc::new(InMemoryDeals::new());
        let deal = DealRecord::new(Uuid::new_v4(), "Acme", &["lead"]);
        let id = deal.id;
        deals.insert(deal);
        (deals, id)
    }

    #[tokio::test]
    async fn test_next_step_is_replaced() {
        let (deals, deal_id) = seeded();
        let executor = UpdateDealFieldExecutor::new(Arc::clone(&deals) as Arc<dyn DealFieldUpdater>, Duration::from_secs(1));
        let config = UpdateDealFieldConfig {
            field: DealField::NextStep,
            value_template: "{{next_step}}".to_string(),
        };

        for step in ["Send deck", "Book demo"] {
            let sig = signal(deal_id, step);
            let ctx = ActionContext::new(&sig, Timestamp(0));
            let outcome = executor.execute(&config, &ctx).await;
            assert_eq!(outcome.status, ExecutionStatus::Success);
        }
        assert_eq!(
            deals.get(deal_id).unwrap().next_step.as_deref(),
            Some("Book demo")
        );
    }

    #[tokio::test]
    async fn test_notes_are_appended_with_stamp() {
        let (deals, deal_id) = seeded();
        let executor = UpdateDealFieldExecutor::new(Arc::clone(&deals) as Arc<dyn DealFieldUpdater>, Duration::from_secs(1));
        let config = UpdateDealFieldConfig {
            field: DealField::Notes,
            value_template: "Next: {{next_step}}".to_string(),
        };

        // 2023-11-14 22:13:20 UTC
        let now = Timestamp(1_700_000_000);
        for step in ["Send deck", "Book demo"] {
            let sig = signal(deal_id, step);
            let ctx = ActionContext::new(&sig, now);
            executor.execute(&config, &ctx).await;
        }
        assert_eq!(
            deals.get(deal_id).unwrap().notes,
            "[2023-11-14 22:13 UTC] Next: Send deck\n[2023-11-14 22:13 UTC] Next: Book demo"
        );
    }

    #[tokio::test]
    async fn test_missing_deal_fails() {
        let deals = Arc::new(InMemoryDeals::new());
        let executor = UpdateDealFieldExecutor::new(deals, Duration::from_secs(1));
        let config = UpdateDealFieldConfig {
            field: DealField::NextStep,
            value_template: "{{next_step}}".to_string(),
        };
        let sig = signal(Uuid::new_v4(), "Send deck");
        let ctx = ActionContext::new(&sig, Timestamp(0));

        let outcome = executor.execute(&config, &ctx).await;
        assert_eq!(outcome.status, ExecutionStatus::Failed);
    }
}
