//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query parameters or a JSON body via axum
//! extractors, calls into the engine or the repositories, and returns a
//! JSON response.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dealpilot_automation::SignalReport;
use dealpilot_core::types::{
    AutomationRule, ExecutionLogEntry, ExecutionStatus, NewRule, Signal, Timestamp,
};
use dealpilot_storage::{ExecutionLogFilter, StatusCounts};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_EXECUTION_LIMIT: u32 = 100;
const MAX_EXECUTION_LIMIT: u32 = 1000;

// =============================================================================
// Query parameter types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrgParams {
    pub org_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionParams {
    pub org_id: Option<String>,
    pub rule_id: Option<String>,
    pub deal_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RulesResponse {
    pub rules: Vec<AutomationRule>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutionsResponse {
    pub executions: Vec<ExecutionLogEntry>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub org_id: Uuid,
    pub counts: StatusCounts,
    pub total: u64,
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_uuid(name: &str, value: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value.trim())
        .map_err(|_| ApiError::BadRequest(format!("{} is not a valid UUID: {}", name, value)))
}

fn require_uuid(name: &str, value: Option<&str>) -> Result<Uuid, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_uuid(name, v),
        _ => Err(ApiError::BadRequest(format!("{} is required", name))),
    }
}

fn optional_uuid(name: &str, value: Option<&str>) -> Result<Option<Uuid>, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_uuid(name, v))
        .transpose()
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health - liveness, version and uptime. No auth.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// POST /signals - run one signal through the engine and return the report.
pub async fn post_signal(
    State(state): State<AppState>,
    Json(signal): Json<Signal>,
) -> Result<Json<SignalReport>, ApiError> {
    let report = state.engine.process_signal(&signal).await?;
    Ok(Json(report))
}

/// GET /rules?org_id= - every rule of an organization, oldest first.
pub async fn list_rules(
    State(state): State<AppState>,
    Query(params): Query<OrgParams>,
) -> Result<Json<RulesResponse>, ApiError> {
    let org_id = require_uuid("org_id", params.org_id.as_deref())?;
    let rules = state.rules.list(org_id)?;
    Ok(Json(RulesResponse { rules }))
}

/// POST /rules - validate and store a new rule.
pub async fn create_rule(
    State(state): State<AppState>,
    Json(rule): Json<NewRule>,
) -> Result<(StatusCode, Json<AutomationRule>), ApiError> {
    let created = state.rules.insert(rule, Timestamp::now())?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /executions - the execution log, newest first.
pub async fn list_executions(
    State(state): State<AppState>,
    Query(params): Query<ExecutionParams>,
) -> Result<Json<ExecutionsResponse>, ApiError> {
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<ExecutionStatus>().map_err(ApiError::BadRequest)?),
        None => None,
    };
    let filter = ExecutionLogFilter {
        org_id: optional_uuid("org_id", params.org_id.as_deref())?,
        rule_id: optional_uuid("rule_id", params.rule_id.as_deref())?,
        deal_id: optional_uuid("deal_id", params.deal_id.as_deref())?,
        status,
        limit: Some(
            params
                .limit
                .unwrap_or(DEFAULT_EXECUTION_LIMIT)
                .clamp(1, MAX_EXECUTION_LIMIT),
        ),
    };

    let executions = state.executions.list(&filter)?;
    Ok(Json(ExecutionsResponse {
        count: executions.len(),
        executions,
    }))
}

/// GET /executions/stats?org_id= - entry counts per status.
pub async fn execution_stats(
    State(state): State<AppState>,
    Query(params): Query<OrgParams>,
) -> Result<Json<StatsResponse>, ApiError> {
    let org_id = require_uuid("org_id", params.org_id.as_deref())?;
    let counts = state.executions.status_counts(org_id)?;
    Ok(Json(StatsResponse {
        org_id,
        total: counts.total(),
        counts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(require_uuid("org_id", Some(id.to_string().as_str())).unwrap(), id);
        assert!(matches!(
            require_uuid("org_id", None),
            Err(ApiError::BadRequest(msg)) if msg == "org_id is required"
        ));
        assert!(matches!(
            require_uuid("org_id", Some("nope")),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_optional_uuid_treats_blank_as_absent() {
        assert_eq!(optional_uuid("deal_id", Some("")).unwrap(), None);
        assert_eq!(optional_uuid("deal_id", None).unwrap(), None);
    }
}
