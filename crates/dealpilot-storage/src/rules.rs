//! Automation rule persistence.
//!
//! Rules are authored by operators outside the engine; the engine only reads
//! them. `insert` validates input so a freshly imported rule always parses.

use std::collections::BTreeSet;
use std::sync::Arc;

use rusqlite::OptionalExtension;
use uuid::Uuid;

use dealpilot_core::error::DealpilotError;
use dealpilot_core::types::{AutomationRule, NewRule, Timestamp};

use crate::db::Database;

const RULE_COLUMNS: &str = "id, org_id, name, description, is_active, trigger_type,
    call_type_filter, action_type, action_config, min_confidence, cooldown_hours,
    created_by, created_at, updated_at";

/// Repository for `automation_rules`.
pub struct RuleRepository {
    db: Arc<Database>,
}

impl RuleRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Validate and store a new rule, stamping `created_at` with `now`.
    pub fn insert(&self, rule: NewRule, now: Timestamp) -> Result<AutomationRule, DealpilotError> {
        rule.validate()?;

        let stored = AutomationRule {
            id: Uuid::new_v4(),
            org_id: rule.org_id,
            name: rule.name,
            description: rule.description,
            is_active: rule.is_active,
            trigger_type: rule.trigger_type,
            call_type_filter: rule.call_type_filter,
            action_type: rule.action_type,
            action_config: rule.action_config,
            min_confidence: rule.min_confidence,
            cooldown_hours: rule.cooldown_hours,
            created_by: rule.created_by,
            created_at: now,
            updated_at: now,
        };

        let call_type_filter = stored
            .call_type_filter
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let action_config = serde_json::to_string(&stored.action_config)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO automation_rules (id, org_id, name, description, is_active,
                    trigger_type, call_type_filter, action_type, action_config, min_confidence,
                    cooldown_hours, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                rusqlite::params![
                    stored.id.to_string(),
                    stored.org_id.to_string(),
                    stored.name,
                    stored.description,
                    stored.is_active as i32,
                    stored.trigger_type.to_string(),
                    call_type_filter,
                    stored.action_type.to_string(),
                    action_config,
                    stored.min_confidence,
                    stored.cooldown_hours,
                    stored.created_by.map(|id| id.to_string()),
                    stored.created_at.0,
                    stored.updated_at.0,
                ],
            )
            .map_err(|e| DealpilotError::Storage(format!("Failed to insert rule: {}", e)))?;
            Ok(())
        })?;

        tracing::info!(
            rule_id = %stored.id,
            org_id = %stored.org_id,
            trigger = %stored.trigger_type,
            action = %stored.action_type,
            "Automation rule created"
        );
        Ok(stored)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<AutomationRule>, DealpilotError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM automation_rules WHERE id = ?1",
                    RULE_COLUMNS
                ))
                .map_err(|e| DealpilotError::Storage(e.to_string()))?;
            let row = stmt
                .query_row(rusqlite::params![id.to_string()], |row| Ok(map_rule_row(row)))
                .optional()
                .map_err(|e| DealpilotError::Storage(e.to_string()))?;
            row.transpose()
        })
    }

    /// All rules of an organization, oldest first.
    pub fn list(&self, org_id: Uuid) -> Result<Vec<AutomationRule>, DealpilotError> {
        self.query_org(
            &format!(
                "SELECT {} FROM automation_rules WHERE org_id = ?1
                 ORDER BY created_at ASC, id ASC",
                RULE_COLUMNS
            ),
            org_id,
        )
    }

    /// Active rules of an organization in creation order.
    pub fn list_active(&self, org_id: Uuid) -> Result<Vec<AutomationRule>, DealpilotError> {
        self.query_org(
            &format!(
                "SELECT {} FROM automation_rules WHERE org_id = ?1 AND is_active = 1
                 ORDER BY created_at ASC, id ASC",
                RULE_COLUMNS
            ),
            org_id,
        )
    }

    /// Toggle `is_active`. Returns false if the rule does not exist.
    pub fn set_active(
        &self,
        id: Uuid,
        is_active: bool,
        now: Timestamp,
    ) -> Result<bool, DealpilotError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE automation_rules SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
                    rusqlite::params![id.to_string(), is_active as i32, now.0],
                )
                .map_err(|e| DealpilotError::Storage(format!("Failed to update rule: {}", e)))?;
            Ok(changed > 0)
        })
    }

    /// Delete a rule. Its log entries stay, with `rule_id` cleared.
    pub fn delete(&self, id: Uuid) -> Result<bool, DealpilotError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "DELETE FROM automation_rules WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                )
                .map_err(|e| DealpilotError::Storage(format!("Failed to delete rule: {}", e)))?;
            Ok(changed > 0)
        })
    }

    fn query_org(&self, sql: &str, org_id: Uuid) -> Result<Vec<AutomationRule>, DealpilotError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| DealpilotError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![org_id.to_string()], |row| {
                    Ok(map_rule_row(row))
                })
                .map_err(|e| DealpilotError::Storage(e.to_string()))?;

            let mut rules = Vec::new();
            for row in rows {
                let rule = row.map_err(|e| DealpilotError::Storage(e.to_string()))??;
                rules.push(rule);
            }
            Ok(rules)
        })
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<Uuid, DealpilotError> {
    Uuid::parse_str(value)
        .map_err(|e| DealpilotError::Storage(format!("Invalid {} '{}': {}", column, value, e)))
}

fn map_rule_row(row: &rusqlite::Row<'_>) -> Result<AutomationRule, DealpilotError> {
    let get_err = |e: rusqlite::Error| DealpilotError::Storage(e.to_string());

    let id: String = row.get(0).map_err(get_err)?;
    let org_id: String = row.get(1).map_err(get_err)?;
    let trigger_type: String = row.get(5).map_err(get_err)?;
    let call_type_filter: Option<String> = row.get(6).map_err(get_err)?;
    let action_type: String = row.get(7).map_err(get_err)?;
    let action_config: String = row.get(8).map_err(get_err)?;
    let created_by: Option<String> = row.get(11).map_err(get_err)?;

    let call_type_filter: Option<BTreeSet<Uuid>> = call_type_filter
        .map(|raw| serde_json::from_str(&raw))
        .transpose()?;
    // A config that is not even JSON is kept as a string so the engine can
    // still log the rule as failed instead of losing it.
    let action_config = serde_json::from_str(&action_config)
        .unwrap_or(serde_json::Value::String(action_config));

    Ok(AutomationRule {
        id: parse_uuid(&id, "rule id")?,
        org_id: parse_uuid(&org_id, "org_id")?,
        name: row.get(2).map_err(get_err)?,
        description: row.get(3).map_err(get_err)?,
        is_active: row.get::<_, i64>(4).map_err(get_err)? != 0,
        trigger_type: trigger_type.parse().map_err(DealpilotError::Storage)?,
        call_type_filter,
        action_type: action_type.parse().map_err(DealpilotError::Storage)?,
        action_config,
        min_confidence: row.get(9).map_err(get_err)?,
        cooldown_hours: row.get(10).map_err(get_err)?,
        created_by: created_by
            .map(|raw| parse_uuid(&raw, "created_by"))
            .transpose()?,
        created_at: Timestamp(row.get(12).map_err(get_err)?),
        updated_at: Timestamp(row.get(13).map_err(get_err)?),
    })
}
