//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use dealpilot_core::error::DealpilotError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), DealpilotError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| DealpilotError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            DealpilotError::Storage(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: automation_schema");
    }

    Ok(())
}

/// Version 1: rules and the execution log.
///
/// `action_config` and `call_type_filter` hold JSON text. Log rows keep their
/// history when a rule is deleted: `rule_id` is set to NULL.
fn apply_v1(conn: &Connection) -> Result<(), DealpilotError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS automation_rules (
            id                TEXT PRIMARY KEY NOT NULL,
            org_id            TEXT NOT NULL,
            name              TEXT NOT NULL,
            description       TEXT,
            is_active         INTEGER NOT NULL DEFAULT 1,
            trigger_type      TEXT NOT NULL,
            call_type_filter  TEXT,
            action_type       TEXT NOT NULL
                              CHECK (action_type IN ('advance_stage', 'create_task',
                                                     'send_notification', 'update_deal_field')),
            action_config     TEXT NOT NULL DEFAULT '{}',
            min_confidence    REAL NOT NULL
                              CHECK (min_confidence >= 0.0 AND min_confidence <= 1.0),
            cooldown_hours    INTEGER NOT NULL DEFAULT 0 CHECK (cooldown_hours >= 0),
            created_by        TEXT,
            created_at        INTEGER NOT NULL,
            updated_at        INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_rules_org_active
            ON automation_rules (org_id, is_active, created_at);

        CREATE TABLE IF NOT EXISTS automation_execution_logs (
            id              TEXT PRIMARY KEY NOT NULL,
            org_id          TEXT NOT NULL,
            rule_id         TEXT REFERENCES automation_rules (id) ON DELETE SET NULL,
            meeting_id      TEXT,
            deal_id         TEXT NOT NULL,
            trigger_type    TEXT NOT NULL,
            trigger_signal  TEXT NOT NULL,
            action_type     TEXT NOT NULL,
            action_result   TEXT,
            status          TEXT NOT NULL
                            CHECK (status IN ('success', 'failed', 'skipped')),
            error_message   TEXT,
            created_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_exec_rule_deal_status
            ON automation_execution_logs (rule_id, deal_id, status, created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_exec_org_created
            ON automation_execution_logs (org_id, created_at DESC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'automation_schema');
        ",
    )
    .map_err(|e| DealpilotError::Storage(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}
