//! [`RuleLogStore`] backed by the SQLite repositories.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use dealpilot_core::error::DealpilotError;
use dealpilot_core::types::{AutomationRule, ExecutionLogEntry, Timestamp};
use dealpilot_storage::{Database, ExecutionLogRepository, RuleRepository};

use crate::capability::RuleLogStore;

pub struct SqliteRuleLogStore {
    rules: RuleRepository,
    logs: ExecutionLogRepository,
}

impl SqliteRuleLogStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            rules: RuleRepository::new(Arc::clone(&db)),
            logs: ExecutionLogRepository::new(db),
        }
    }
}

// Queries are short and run under the connection mutex; they are issued
// inline rather than on the blocking pool.
#[async_trait]
impl RuleLogStore for SqliteRuleLogStore {
    async fn list_active_rules(&self, org_id: Uuid) -> Result<Vec<AutomationRule>, DealpilotError> {
        self.rules.list_active(org_id)
    }

    async fn last_successful_execution(
        &self,
        rule_id: Uuid,
        deal_id: Uuid,
    ) -> Result<Option<Timestamp>, DealpilotError> {
        self.logs.last_successful(rule_id, deal_id)
    }

    async fn append_log_entry(&self, entry: &ExecutionLogEntry) -> Result<(), DealpilotError> {
        self.logs.append(entry)
    }
}
