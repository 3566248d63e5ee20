//! Pipeline automation engine for Dealpilot.
//!
//! Matches AI-derived call signals against operator-defined rules, enforces
//! per-(rule, deal) cooldowns, and dispatches one templated action per
//! candidate rule through pluggable capability interfaces. Every candidate
//! ends in exactly one execution log entry.

pub mod capability;
pub mod clock;
pub mod cooldown;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod executor;
pub mod matcher;
pub mod memory;
pub mod store;
pub mod template;
pub mod worker;

pub use capability::{
    Capabilities, DealFieldUpdater, DealPipelineMutator, FieldWrite, Notifier, RuleLogStore,
    StageAdvance, TaskCreator, TaskRequest,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cooldown::{CooldownSlot, CooldownTracker, Eligibility};
pub use dispatcher::ActionDispatcher;
pub use engine::{AutomationEngine, CandidateOutcome, SignalReport};
pub use error::{AutomationError, CapabilityError, ExecutorError};
pub use executor::ActionOutcome;
pub use matcher::{PreparedRule, Rejection};
pub use store::SqliteRuleLogStore;
pub use template::{render, TemplateContext};
pub use worker::{PoolStats, SignalWorkerPool};
