//! In-process capability implementations.
//!
//! Used by the CLI to replay signals against a deals fixture, and by tests
//! to inject failures, latency and inspect what the engine did.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dealpilot_core::error::DealpilotError;
use dealpilot_core::types::{
    AutomationRule, DealField, ExecutionLogEntry, ExecutionStatus, NotificationChannel, Timestamp,
};

use crate::capability::{
    DealFieldUpdater, DealPipelineMutator, FieldWrite, Notifier, RuleLogStore, StageAdvance,
    TaskCreator, TaskRequest,
};
use crate::error::CapabilityError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Rule / log store
// =============================================================================

#[derive(Default)]
pub struct InMemoryRuleLogStore {
    rules: Mutex<Vec<AutomationRule>>,
    entries: Mutex<Vec<ExecutionLogEntry>>,
    lookup_delay: Option<Duration>,
    rules_unavailable: AtomicBool,
    appends_unavailable: AtomicBool,
}

impl InMemoryRuleLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every cooldown lookup. Widens the window in which unsynchronized
    /// evaluations of the same pair would interleave.
    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    pub fn add_rule(&self, rule: AutomationRule) {
        lock(&self.rules).push(rule);
    }

    pub fn set_rules_unavailable(&self, unavailable: bool) {
        self.rules_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_appends_unavailable(&self, unavailable: bool) {
        self.appends_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<ExecutionLogEntry> {
        lock(&self.entries).clone()
    }

    pub fn entries_for(&self, rule_id: Uuid) -> Vec<ExecutionLogEntry> {
        lock(&self.entries)
            .iter()
            .filter(|e| e.rule_id == Some(rule_id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RuleLogStore for InMemoryRuleLogStore {
    async fn list_active_rules(&self, org_id: Uuid) -> Result<Vec<AutomationRule>, DealpilotError> {
        if self.rules_unavailable.load(Ordering::SeqCst) {
            return Err(DealpilotError::Storage("rule store unavailable".to_string()));
        }
        Ok(lock(&self.rules)
            .iter()
            .filter(|r| r.org_id == org_id && r.is_active)
            .cloned()
            .collect())
    }

    async fn last_successful_execution(
        &self,
        rule_id: Uuid,
        deal_id: Uuid,
    ) -> Result<Option<Timestamp>, DealpilotError> {
        let last = lock(&self.entries)
            .iter()
            .filter(|e| {
                e.rule_id == Some(rule_id)
                    && e.deal_id == deal_id
                    && e.status == ExecutionStatus::Success
            })
            .map(|e| e.created_at)
            .max();
        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(last)
    }

    async fn append_log_entry(&self, entry: &ExecutionLogEntry) -> Result<(), DealpilotError> {
        if self.appends_unavailable.load(Ordering::SeqCst) {
            return Err(DealpilotError::Storage("log store unavailable".to_string()));
        }
        lock(&self.entries).push(entry.clone());
        Ok(())
    }
}

// =============================================================================
// Deals
// =============================================================================

/// A deal with a linear stage pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRecord {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    pub stages: Vec<String>,
    #[serde(default)]
    pub stage_index: usize,
    #[serde(default)]
    pub next_step: Option<String>,
    #[serde(default)]
    pub notes: String,
}

impl DealRecord {
    pub fn new(id: Uuid, name: &str, stages: &[&str]) -> Self {
        Self {
            id,
            name: name.to_string(),
            stages: stages.iter().map(|s| s.to_string()).collect(),
            stage_index: 0,
            next_step: None,
            notes: String::new(),
        }
    }

    pub fn stage(&self) -> Option<&str> {
        self.stages.get(self.stage_index).map(String::as_str)
    }
}

#[derive(Default)]
pub struct InMemoryDeals {
    deals: Mutex<HashMap<Uuid, DealRecord>>,
}

impl InMemoryDeals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = DealRecord>) -> Self {
        let deals = Self::new();
        for record in records {
            deals.insert(record);
        }
        deals
    }

    pub fn insert(&self, record: DealRecord) {
        lock(&self.deals).insert(record.id, record);
    }

    pub fn get(&self, id: Uuid) -> Option<DealRecord> {
        lock(&self.deals).get(&id).cloned()
    }

    /// Every deal, ordered by id.
    pub fn records(&self) -> Vec<DealRecord> {
        let mut records: Vec<DealRecord> = lock(&self.deals).values().cloned().collect();
        records.sort_by_key(|r| r.id);
        records
    }

    pub fn len(&self) -> usize {
        lock(&self.deals).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DealPipelineMutator for InMemoryDeals {
    async fn advance_to_next_stage(&self, deal_id: Uuid) -> Result<StageAdvance, CapabilityError> {
        let mut deals = lock(&self.deals);
        let deal = deals
            .get_mut(&deal_id)
            .ok_or_else(|| CapabilityError::NotFound(format!("deal {}", deal_id)))?;

        let from_stage = deal.stage().map(str::to_string);
        if deal.stage_index + 1 >= deal.stages.len() {
            return Ok(StageAdvance {
                advanced: false,
                terminal: true,
                from_stage,
                to_stage: None,
            });
        }
        deal.stage_index += 1;
        Ok(StageAdvance {
            advanced: true,
            terminal: false,
            from_stage,
            to_stage: deal.stage().map(str::to_string),
        })
    }
}

#[async_trait]
impl DealFieldUpdater for InMemoryDeals {
    async fn update_field(
        &self,
        deal_id: Uuid,
        field: DealField,
        write: FieldWrite,
    ) -> Result<(), CapabilityError> {
        let mut deals = lock(&self.deals);
        let deal = deals
            .get_mut(&deal_id)
            .ok_or_else(|| CapabilityError::NotFound(format!("deal {}", deal_id)))?;

        match (field, write) {
            (DealField::NextStep, FieldWrite::Replace(value)) => deal.next_step = Some(value),
            (DealField::NextStep, FieldWrite::Append(value)) => {
                let current = deal.next_step.take().unwrap_or_default();
                deal.next_step = Some(append_line(current, &value));
            }
            (DealField::Notes, FieldWrite::Replace(value)) => deal.notes = value,
            (DealField::Notes, FieldWrite::Append(value)) => {
                let current = std::mem::take(&mut deal.notes);
                deal.notes = append_line(current, &value);
            }
        }
        Ok(())
    }
}

fn append_line(mut current: String, line: &str) -> String {
    if !current.is_empty() {
        current.push('\n');
    }
    current.push_str(line);
    current
}

// =============================================================================
// Tasks
// =============================================================================

#[derive(Default)]
pub struct InMemoryTasks {
    tasks: Mutex<Vec<(Uuid, TaskRequest)>>,
    reject_with: Option<String>,
}

impl InMemoryTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// A task store that refuses every task.
    pub fn rejecting(reason: &str) -> Self {
        Self {
            reject_with: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn tasks(&self) -> Vec<(Uuid, TaskRequest)> {
        lock(&self.tasks).clone()
    }
}

#[async_trait]
impl TaskCreator for InMemoryTasks {
    async fn create_task(&self, task: &TaskRequest) -> Result<Uuid, CapabilityError> {
        if let Some(reason) = &self.reject_with {
            return Err(CapabilityError::Rejected(reason.clone()));
        }
        let id = Uuid::new_v4();
        lock(&self.tasks).push((id, task.clone()));
        Ok(id)
    }
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub channel: NotificationChannel,
    pub message: String,
    pub org_id: Uuid,
    pub deal_id: Uuid,
}

/// Records every delivered notification. Channels can be set up to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: BTreeMap<NotificationChannel, String>,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, channel: NotificationChannel, reason: &str) -> Self {
        self.failing.insert(channel, reason.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        channel: NotificationChannel,
        message: &str,
        org_id: Uuid,
        deal_id: Uuid,
    ) -> Result<(), CapabilityError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.failing.get(&channel) {
            return Err(CapabilityError::Unavailable(reason.clone()));
        }
        tracing::info!(channel = %channel, deal_id = %deal_id, "Notification delivered");
        lock(&self.sent).push(SentNotification {
            channel,
            message: message.to_string(),
            org_id,
            deal_id,
        });
        Ok(())
    }
}
