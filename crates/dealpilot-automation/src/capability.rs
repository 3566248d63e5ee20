//! Capability interfaces the engine calls out to.
//!
//! The rule/log store, deal pipeline, task store, notifier and deal field
//! writer are external collaborators. The engine only sees these traits and
//! receives implementations through [`Capabilities`] and
//! [`AutomationEngine::new`](crate::engine::AutomationEngine::new).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use dealpilot_core::error::DealpilotError;
use dealpilot_core::types::{
    AutomationRule, DealField, ExecutionLogEntry, NotificationChannel, TaskPriority, Timestamp,
};

use crate::error::CapabilityError;

/// Durable storage for rules and execution log entries.
#[async_trait]
pub trait RuleLogStore: Send + Sync {
    /// Active rules of `org_id`.
    async fn list_active_rules(&self, org_id: Uuid) -> Result<Vec<AutomationRule>, DealpilotError>;

    /// `created_at` of the newest `success` entry for the pair, if any.
    async fn last_successful_execution(
        &self,
        rule_id: Uuid,
        deal_id: Uuid,
    ) -> Result<Option<Timestamp>, DealpilotError>;

    async fn append_log_entry(&self, entry: &ExecutionLogEntry) -> Result<(), DealpilotError>;
}

/// Result of asking the pipeline to move a deal forward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageAdvance {
    pub advanced: bool,
    /// The deal sits in the last stage of its pipeline.
    pub terminal: bool,
    pub from_stage: Option<String>,
    pub to_stage: Option<String>,
}

#[async_trait]
pub trait DealPipelineMutator: Send + Sync {
    async fn advance_to_next_stage(&self, deal_id: Uuid) -> Result<StageAdvance, CapabilityError>;
}

/// A task to be created for a deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRequest {
    pub org_id: Uuid,
    pub deal_id: Uuid,
    pub title: String,
    pub due_date: Timestamp,
    pub priority: TaskPriority,
}

#[async_trait]
pub trait TaskCreator: Send + Sync {
    /// Returns the id of the created task.
    async fn create_task(&self, task: &TaskRequest) -> Result<Uuid, CapabilityError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        channel: NotificationChannel,
        message: &str,
        org_id: Uuid,
        deal_id: Uuid,
    ) -> Result<(), CapabilityError>;
}

/// How a field value is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldWrite {
    Replace(String),
    /// Append to whatever the field already holds. The updater owns the
    /// read-modify-write so concurrent appends from different rules do not
    /// overwrite each other.
    Append(String),
}

#[async_trait]
pub trait DealFieldUpdater: Send + Sync {
    async fn update_field(
        &self,
        deal_id: Uuid,
        field: DealField,
        write: FieldWrite,
    ) -> Result<(), CapabilityError>;
}

/// The outbound capabilities used by action executors.
#[derive(Clone)]
pub struct Capabilities {
    pub pipeline: Arc<dyn DealPipelineMutator>,
    pub tasks: Arc<dyn TaskCreator>,
    pub notifier: Arc<dyn Notifier>,
    pub fields: Arc<dyn DealFieldUpdater>,
}
