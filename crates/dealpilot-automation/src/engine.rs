//! The automation engine: signal in, one log entry per candidate rule out.
//!
//! For each signal the engine loads the organization's active rules,
//! selects candidates, and evaluates them one at a time in creation order.
//! Each candidate ends in exactly one of:
//!
//! - `failed` "invalid action config", when its stored config does not parse;
//! - `skipped` "cooldown active", when a recent success blocks it;
//! - whatever its executor reported.
//!
//! The cooldown check, the action and the log append for a (rule, deal)
//! pair all happen while its [`CooldownSlot`](crate::cooldown::CooldownSlot)
//! is held.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use dealpilot_core::types::{
    ActionType, ExecutionLogEntry, ExecutionStatus, Signal, TriggerType,
};

use crate::capability::{Capabilities, RuleLogStore};
use crate::clock::Clock;
use crate::cooldown::{CooldownTracker, Eligibility};
use crate::dispatcher::ActionDispatcher;
use crate::error::AutomationError;
use crate::executor::ActionOutcome;
use crate::matcher::{self, PreparedRule};

/// What happened to one candidate rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateOutcome {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub action_type: ActionType,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    /// Whether the log entry was persisted.
    pub logged: bool,
}

/// Result of processing one signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalReport {
    pub org_id: Uuid,
    pub deal_id: Uuid,
    pub trigger_type: TriggerType,
    /// Active rules considered for matching.
    pub rules_evaluated: usize,
    /// One per candidate, in evaluation order.
    pub outcomes: Vec<CandidateOutcome>,
}

impl SignalReport {
    pub fn count(&self, status: ExecutionStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

pub struct AutomationEngine {
    inner: Arc<EngineCore>,
}

struct EngineCore {
    store: Arc<dyn RuleLogStore>,
    cooldowns: CooldownTracker,
    dispatcher: ActionDispatcher,
    clock: Arc<dyn Clock>,
}

impl AutomationEngine {
    pub fn new(
        store: Arc<dyn RuleLogStore>,
        capabilities: Capabilities,
        clock: Arc<dyn Clock>,
        action_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(EngineCore {
                cooldowns: CooldownTracker::new(Arc::clone(&store)),
                store,
                dispatcher: ActionDispatcher::new(capabilities, action_timeout),
                clock,
            }),
        }
    }

    /// Evaluate every active rule of the signal's organization against it.
    ///
    /// Only an invalid signal or a failure to load rules is returned as an
    /// error. Everything that happens to an individual candidate is in the
    /// report and in the execution log.
    ///
    /// Evaluation runs on its own task: dropping the returned future does
    /// not stop it, so every candidate that started still gets its log
    /// entry.
    pub async fn process_signal(&self, signal: &Signal) -> Result<SignalReport, AutomationError> {
        signal
            .validate()
            .map_err(|e| AutomationError::InvalidSignal(e.to_string()))?;

        let core = Arc::clone(&self.inner);
        let signal = signal.clone();
        tokio::spawn(async move { core.process_signal(&signal).await })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Signal evaluation task aborted");
                AutomationError::Aborted(e.to_string())
            })?
    }
}

impl EngineCore {
    async fn process_signal(&self, signal: &Signal) -> Result<SignalReport, AutomationError> {
        let rules = self
            .store
            .list_active_rules(signal.org_id)
            .await
            .map_err(AutomationError::RuleLoad)?;
        let prepared: Vec<PreparedRule> = rules.into_iter().map(PreparedRule::new).collect();
        let candidates = matcher::candidates(signal, &prepared);

        tracing::debug!(
            org_id = %signal.org_id,
            deal_id = %signal.deal_id,
            trigger = %signal.trigger_type,
            rules = prepared.len(),
            candidates = candidates.len(),
            "Signal matched"
        );

        let mut outcomes = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            outcomes.push(self.evaluate_candidate(candidate, signal).await);
        }

        Ok(SignalReport {
            org_id: signal.org_id,
            deal_id: signal.deal_id,
            trigger_type: signal.trigger_type,
            rules_evaluated: prepared.len(),
            outcomes,
        })
    }

    async fn evaluate_candidate(&self, candidate: &PreparedRule, signal: &Signal) -> CandidateOutcome {
        let rule = &candidate.rule;

        let action = match &candidate.action {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!(rule_id = %rule.id, error = %e, "Rule has an invalid action config");
                return self.record(candidate, signal, ActionOutcome::invalid_config(e)).await;
            }
        };

        let slot = self.cooldowns.claim(rule.id, signal.deal_id).await;
        let now = self.clock.now();

        let outcome = match self.cooldowns.check(&slot, rule, now).await {
            Ok(Eligibility::Eligible) => self.dispatcher.dispatch(action, signal, now).await,
            Ok(Eligibility::CoolingDown { retry_after, .. }) => {
                tracing::debug!(
                    rule_id = %rule.id,
                    deal_id = %signal.deal_id,
                    retry_after = %retry_after,
                    "Rule is cooling down"
                );
                ActionOutcome::cooldown_active()
            }
            Err(e) => {
                tracing::warn!(rule_id = %rule.id, error = %e, "Cooldown lookup failed");
                ActionOutcome::failed(format!("cooldown lookup failed: {}", e), None)
            }
        };

        let recorded = self.record(candidate, signal, outcome).await;
        drop(slot);
        recorded
    }

    async fn record(
        &self,
        candidate: &PreparedRule,
        signal: &Signal,
        outcome: ActionOutcome,
    ) -> CandidateOutcome {
        let rule = &candidate.rule;
        let entry = ExecutionLogEntry {
            id: Uuid::new_v4(),
            org_id: signal.org_id,
            rule_id: Some(rule.id),
            meeting_id: signal.meeting_id,
            deal_id: signal.deal_id,
            trigger_type: signal.trigger_type,
            trigger_signal: signal.clone(),
            action_type: rule.action_type,
            action_result: outcome.action_result,
            status: outcome.status,
            error_message: outcome.error_message,
            created_at: self.clock.now(),
        };

        let logged = match self.store.append_log_entry(&entry).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    rule_id = %rule.id,
                    deal_id = %signal.deal_id,
                    status = %entry.status,
                    error = %e,
                    "Failed to write execution log entry"
                );
                false
            }
        };

        match entry.status {
            ExecutionStatus::Failed => tracing::warn!(
                rule_id = %rule.id,
                deal_id = %signal.deal_id,
                action = %rule.action_type,
                error = entry.error_message.as_deref().unwrap_or(""),
                "Automation rule failed"
            ),
            status => tracing::info!(
                rule_id = %rule.id,
                deal_id = %signal.deal_id,
                action = %rule.action_type,
                status = %status,
                "Automation rule evaluated"
            ),
        }

        CandidateOutcome {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            action_type: rule.action_type,
            status: entry.status,
            error_message: entry.error_message,
            logged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::{DealRecord, InMemoryDeals, InMemoryRuleLogStore, InMemoryTasks, RecordingNotifier};
    use dealpilot_core::types::{AutomationRule, Timestamp};
    use std::collections::BTreeMap;

    struct Harness {
        engine: AutomationEngine,
        store: Arc<InMemoryRuleLogStore>,
        org: Uuid,
        deal: Uuid,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryRuleLogStore::new());
        let deals = Arc::new(InMemoryDeals::new());
        let deal = DealRecord::new(Uuid::new_v4(), "Acme", &["lead", "qualified", "won"]);
        let deal_id = deal.id;
        deals.insert(deal);
        let capabilities = Capabilities {
            pipeline: deals.clone(),
            tasks: Arc::new(InMemoryTasks::new()),
            notifier: Arc::new(RecordingNotifier::new()),
            fields: deals,
        };
        let engine = AutomationEngine::new(
            store.clone(),
            capabilities,
            Arc::new(ManualClock::new(Timestamp(1_000_000))),
            Duration::from_secs(1),
        );
        Harness {
            engine,
            store,
            org: Uuid::new_v4(),
            deal: deal_id,
        }
    }

    fn rule(org: Uuid, action_type: ActionType, config: serde_json::Value) -> AutomationRule {
        AutomationRule {
            id: Uuid::new_v4(),
            org_id: org,
            name: format!("{} rule", action_type),
            description: None,
            is_active: true,
            trigger_type: TriggerType::VerbalCommitment,
            call_type_filter: None,
            action_type,
            action_config: config,
            min_confidence: 0.5,
            cooldown_hours: 0,
            created_by: None,
            created_at: Timestamp(1),
            updated_at: Timestamp(1),
        }
    }

    fn signal(h: &Harness, confidence: f64) -> Signal {
        Signal {
            trigger_type: TriggerType::VerbalCommitment,
            confidence,
            call_type_id: None,
            deal_id: h.deal,
            meeting_id: Some(Uuid::new_v4()),
            org_id: h.org,
            context: BTreeMap::new(),
            observed_at: Timestamp(1_000_000),
        }
    }

    #[tokio::test]
    async fn test_invalid_signal_is_rejected() {
        let h = harness();
        let err = h.engine.process_signal(&signal(&h, 1.5)).await.unwrap_err();
        assert!(matches!(err, AutomationError::InvalidSignal(_)));
        assert!(h.store.entries().is_empty());
    }

    #[tokio::test]
    async fn test_rule_load_failure_is_returned() {
        let h = harness();
        h.store.set_rules_unavailable(true);
        let err = h.engine.process_signal(&signal(&h, 0.9)).await.unwrap_err();
        assert!(matches!(err, AutomationError::RuleLoad(_)));
    }

    #[tokio::test]
    async fn test_log_entry_carries_signal_fields() {
        let h = harness();
        let r = rule(h.org, ActionType::AdvanceStage, serde_json::json!({}));
        h.store.add_rule(r.clone());
        let sig = signal(&h, 0.9);

        let report = h.engine.process_signal(&sig).await.unwrap();
        assert_eq!(report.count(ExecutionStatus::Success), 1);

        let entries = h.store.entries();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.rule_id, Some(r.id));
        assert_eq!(entry.meeting_id, sig.meeting_id);
        assert_eq!(entry.trigger_signal, sig);
        assert_eq!(entry.action_type, ActionType::AdvanceStage);
        assert_eq!(entry.created_at, Timestamp(1_000_000));
    }

    #[tokio::test]
    async fn test_failed_append_is_reported_not_raised() {
        let h = harness();
        h.store
            .add_rule(rule(h.org, ActionType::AdvanceStage, serde_json::json!({})));
        h.store.set_appends_unavailable(true);

        let report = h.engine.process_signal(&signal(&h, 0.9)).await.unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].status, ExecutionStatus::Success);
        assert!(!report.outcomes[0].logged);
    }
}
