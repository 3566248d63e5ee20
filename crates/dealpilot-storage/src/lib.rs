//! Dealpilot storage crate - SQLite persistence for automation rules and the
//! execution log.
//!
//! Provides a WAL-mode SQLite database with versioned migrations and the two
//! repositories the automation engine reads from and appends to.

pub mod db;
pub mod executions;
pub mod migrations;
pub mod rules;

pub use db::Database;
pub use executions::{ExecutionLogFilter, ExecutionLogRepository, StatusCounts};
pub use rules::RuleRepository;
