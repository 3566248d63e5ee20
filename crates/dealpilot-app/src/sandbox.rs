//! In-process capabilities the binary runs the engine against.
//!
//! Deals live in memory (optionally seeded from a JSON file), tasks and
//! notifications are recorded. Rules and the execution log are persisted
//! in SQLite regardless.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use dealpilot_automation::memory::{DealRecord, InMemoryDeals, InMemoryTasks, RecordingNotifier};
use dealpilot_automation::Capabilities;
use dealpilot_core::error::DealpilotError;

use crate::input;

pub struct Sandbox {
    pub deals: Arc<InMemoryDeals>,
    pub tasks: Arc<InMemoryTasks>,
    pub notifier: Arc<RecordingNotifier>,
}

/// What the actions did to the sandbox.
#[derive(Debug, Serialize)]
pub struct SandboxSummary {
    pub tasks_created: usize,
    pub notifications_sent: usize,
    pub deals: Vec<DealRecord>,
}

impl Sandbox {
    /// Build a sandbox, seeding deals from `deals_path` when given.
    pub fn load(deals_path: Option<&Path>) -> Result<Self, DealpilotError> {
        let deals = match deals_path {
            Some(path) => {
                let records = input::read_deals(path)?;
                tracing::info!(path = %path.display(), count = records.len(), "Deals loaded");
                InMemoryDeals::from_records(records)
            }
            None => InMemoryDeals::new(),
        };

        Ok(Self {
            deals: Arc::new(deals),
            tasks: Arc::new(InMemoryTasks::new()),
            notifier: Arc::new(RecordingNotifier::new()),
        })
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            pipeline: self.deals.clone(),
            tasks: self.tasks.clone(),
            notifier: self.notifier.clone(),
            fields: self.deals.clone(),
        }
    }

    pub fn summary(&self) -> SandboxSummary {
        SandboxSummary {
            tasks_created: self.tasks.tasks().len(),
            notifications_sent: self.notifier.sent().len(),
            deals: self.deals.records(),
        }
    }
}
