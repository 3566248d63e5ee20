//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use dealpilot_automation::AutomationEngine;
use dealpilot_storage::{Database, ExecutionLogRepository, RuleRepository};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AutomationEngine>,
    pub rules: Arc<RuleRepository>,
    pub executions: Arc<ExecutionLogRepository>,
    /// Bearer token required on protected routes.
    pub api_token: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(database: Arc<Database>, engine: Arc<AutomationEngine>, api_token: String) -> Self {
        Self {
            engine,
            rules: Arc::new(RuleRepository::new(Arc::clone(&database))),
            executions: Arc::new(ExecutionLogRepository::new(database)),
            api_token,
            start_time: Instant::now(),
        }
    }
}
