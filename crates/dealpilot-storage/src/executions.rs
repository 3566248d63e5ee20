//! Execution log persistence.
//!
//! The log is append-only. It is also the source of truth for cooldowns:
//! eligibility is derived from the newest `success` row per (rule, deal).

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use dealpilot_core::error::DealpilotError;
use dealpilot_core::types::{ExecutionLogEntry, ExecutionStatus, Timestamp};

use crate::db::Database;
use crate::rules::parse_uuid;

/// Filters for listing log entries. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLogFilter {
    pub org_id: Option<Uuid>,
    pub rule_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub status: Option<ExecutionStatus>,
    pub limit: Option<u32>,
}

/// Per-status entry counts for one organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub success: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.success + self.failed + self.skipped
    }
}

/// Repository for `automation_execution_logs`.
pub struct ExecutionLogRepository {
    db: Arc<Database>,
}

impl ExecutionLogRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append one entry.
    ///
    /// If the referenced rule was deleted while the entry was being produced,
    /// the entry is stored with a NULL `rule_id` rather than rejected.
    pub fn append(&self, entry: &ExecutionLogEntry) -> Result<(), DealpilotError> {
        let trigger_signal = serde_json::to_string(&entry.trigger_signal)?;
        let action_result = entry
            .action_result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO automation_execution_logs (id, org_id, rule_id, meeting_id, deal_id,
                    trigger_type, trigger_signal, action_type, action_result, status,
                    error_message, created_at)
                 VALUES (?1, ?2, (SELECT id FROM automation_rules WHERE id = ?3), ?4, ?5,
                    ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    entry.id.to_string(),
                    entry.org_id.to_string(),
                    entry.rule_id.map(|id| id.to_string()),
                    entry.meeting_id.map(|id| id.to_string()),
                    entry.deal_id.to_string(),
                    entry.trigger_type.to_string(),
                    trigger_signal,
                    entry.action_type.to_string(),
                    action_result,
                    entry.status.to_string(),
                    entry.error_message,
                    entry.created_at.0,
                ],
            )
            .map_err(|e| {
                DealpilotError::Storage(format!("Failed to append execution log: {}", e))
            })?;
            Ok(())
        })
    }

    /// `created_at` of the newest successful execution of `rule_id` for `deal_id`.
    pub fn last_successful(
        &self,
        rule_id: Uuid,
        deal_id: Uuid,
    ) -> Result<Option<Timestamp>, DealpilotError> {
        self.db.with_conn(|conn| {
            let newest: Option<i64> = conn
                .query_row(
                    "SELECT MAX(created_at) FROM automation_execution_logs
                     WHERE rule_id = ?1 AND deal_id = ?2 AND status = 'success'",
                    rusqlite::params![rule_id.to_string(), deal_id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| DealpilotError::Storage(e.to_string()))?;
            Ok(newest.map(Timestamp))
        })
    }

    /// Entries matching `filter`, newest first.
    pub fn list(&self, filter: &ExecutionLogFilter) -> Result<Vec<ExecutionLogEntry>, DealpilotError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(org_id) = filter.org_id {
            clauses.push("org_id = ?");
            params.push(Box::new(org_id.to_string()));
        }
        if let Some(rule_id) = filter.rule_id {
            clauses.push("rule_id = ?");
            params.push(Box::new(rule_id.to_string()));
        }
        if let Some(deal_id) = filter.deal_id {
            clauses.push("deal_id = ?");
            params.push(Box::new(deal_id.to_string()));
        }
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            params.push(Box::new(status.to_string()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        params.push(Box::new(i64::from(filter.limit.unwrap_or(100))));

        let sql = format!(
            "SELECT id, org_id, rule_id, meeting_id, deal_id, trigger_type, trigger_signal,
                    action_type, action_result, status, error_message, created_at
             FROM automation_execution_logs
             {}
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
            where_sql
        );

        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DealpilotError::Storage(format!("Log query prepare: {}", e)))?;
            let params_refs: Vec<&dyn rusqlite::types::ToSql> =
                params.iter().map(|p| p.as_ref()).collect();
            let rows = stmt
                .query_map(params_refs.as_slice(), |row| Ok(map_entry_row(row)))
                .map_err(|e| DealpilotError::Storage(format!("Log query: {}", e)))?;

            let mut entries = Vec::new();
            for row in rows {
                let entry = row.map_err(|e| DealpilotError::Storage(e.to_string()))??;
                entries.push(entry);
            }
            Ok(entries)
        })
    }

    pub fn status_counts(&self, org_id: Uuid) -> Result<StatusCounts, DealpilotError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT status, COUNT(*) FROM automation_execution_logs
                     WHERE org_id = ?1 GROUP BY status",
                )
                .map_err(|e| DealpilotError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![org_id.to_string()], |row| {
                    let status: String = row.get(0)?;
                    let count: i64 = row.get(1)?;
                    Ok((status, count))
                })
                .map_err(|e| DealpilotError::Storage(e.to_string()))?;

            let mut counts = StatusCounts::default();
            for row in rows {
                let (status, count) = row.map_err(|e| DealpilotError::Storage(e.to_string()))?;
                let count = count as u64;
                match status.parse::<ExecutionStatus>().map_err(DealpilotError::Storage)? {
                    ExecutionStatus::Success => counts.success = count,
                    ExecutionStatus::Failed => counts.failed = count,
                    ExecutionStatus::Skipped => counts.skipped = count,
                }
            }
            Ok(counts)
        })
    }
}

fn map_entry_row(row: &rusqlite::Row<'_>) -> Result<ExecutionLogEntry, DealpilotError> {
    let get_err = |e: rusqlite::Error| DealpilotError::Storage(e.to_string());

    let id: String = row.get(0).map_err(get_err)?;
    let org_id: String = row.get(1).map_err(get_err)?;
    let rule_id: Option<String> = row.get(2).map_err(get_err)?;
    let meeting_id: Option<String> = row.get(3).map_err(get_err)?;
    let deal_id: String = row.get(4).map_err(get_err)?;
    let trigger_type: String = row.get(5).map_err(get_err)?;
    let trigger_signal: String = row.get(6).map_err(get_err)?;
    let action_type: String = row.get(7).map_err(get_err)?;
    let action_result: Option<String> = row.get(8).map_err(get_err)?;
    let status: String = row.get(9).map_err(get_err)?;

    Ok(ExecutionLogEntry {
        id: parse_uuid(&id, "log id")?,
        org_id: parse_uuid(&org_id, "org_id")?,
        rule_id: rule_id.map(|raw| parse_uuid(&raw, "rule_id")).transpose()?,
        meeting_id: meeting_id
            .map(|raw| parse_uuid(&raw, "meeting_id"))
            .transpose()?,
        deal_id: parse_uuid(&deal_id, "deal_id")?,
        trigger_type: trigger_type.parse().map_err(DealpilotError::Storage)?,
        trigger_signal: serde_json::from_str(&trigger_signal)?,
        action_type: action_type.parse().map_err(DealpilotError::Storage)?,
        action_result: action_result
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?,
        status: status.parse().map_err(DealpilotError::Storage)?,
        error_message: row.get(10).map_err(get_err)?,
        created_at: Timestamp(row.get(11).map_err(get_err)?),
    })
}
