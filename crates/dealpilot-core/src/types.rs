use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigError, DealpilotError};

// =============================================================================
// Timestamp
// =============================================================================

/// Unix timestamp in seconds (UTC).
///
/// Compared by value. Two Timestamps with the same inner value are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }

    pub fn plus_hours(&self, hours: i64) -> Self {
        Self(self.0 + hours * 3600)
    }

    pub fn plus_days(&self, days: i64) -> Self {
        Self(self.0.saturating_add(days.saturating_mul(86_400)))
    }

    /// `None` when the result falls outside the representable date range.
    pub fn checked_plus_days(&self, days: i64) -> Option<Self> {
        let delta = Duration::try_days(days)?;
        DateTime::from_timestamp(self.0, 0)?
            .checked_add_signed(delta)
            .map(Self::from_datetime)
    }

    /// Seconds elapsed from `earlier` to `self`; negative when `earlier` is later.
    pub fn seconds_since(&self, earlier: Timestamp) -> i64 {
        self.0 - earlier.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

// =============================================================================
// Enums
// =============================================================================

/// AI-derived signal kinds a rule can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    ForwardMovementDetected,
    ProposalRequested,
    PricingDiscussed,
    VerbalCommitment,
    NextMeetingScheduled,
    DecisionMakerEngaged,
    TimelineConfirmed,
    ChecklistIncomplete,
}

impl TriggerType {
    pub const ALL: [TriggerType; 8] = [
        TriggerType::ForwardMovementDetected,
        TriggerType::ProposalRequested,
        TriggerType::PricingDiscussed,
        TriggerType::VerbalCommitment,
        TriggerType::NextMeetingScheduled,
        TriggerType::DecisionMakerEngaged,
        TriggerType::TimelineConfirmed,
        TriggerType::ChecklistIncomplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::ForwardMovementDetected => "forward_movement_detected",
            TriggerType::ProposalRequested => "proposal_requested",
            TriggerType::PricingDiscussed => "pricing_discussed",
            TriggerType::VerbalCommitment => "verbal_commitment",
            TriggerType::NextMeetingScheduled => "next_meeting_scheduled",
            TriggerType::DecisionMakerEngaged => "decision_maker_engaged",
            TriggerType::TimelineConfirmed => "timeline_confirmed",
            TriggerType::ChecklistIncomplete => "checklist_incomplete",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TriggerType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown trigger type: {}", s))
    }
}

/// The fixed action vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    AdvanceStage,
    CreateTask,
    SendNotification,
    UpdateDealField,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::AdvanceStage => write!(f, "advance_stage"),
            ActionType::CreateTask => write!(f, "create_task"),
            ActionType::SendNotification => write!(f, "send_notification"),
            ActionType::UpdateDealField => write!(f, "update_deal_field"),
        }
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "advance_stage" => Ok(ActionType::AdvanceStage),
            "create_task" => Ok(ActionType::CreateTask),
            "send_notification" => Ok(ActionType::SendNotification),
            "update_deal_field" => Ok(ActionType::UpdateDealField),
            _ => Err(format!("Unknown action type: {}", s)),
        }
    }
}

/// Terminal outcome of one candidate rule for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ExecutionStatus::Success),
            "failed" => Ok(ExecutionStatus::Failed),
            "skipped" => Ok(ExecutionStatus::Skipped),
            _ => Err(format!("Unknown execution status: {}", s)),
        }
    }
}

/// Notification delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    InApp,
    Email,
    Slack,
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationChannel::InApp => write!(f, "in_app"),
            NotificationChannel::Email => write!(f, "email"),
            NotificationChannel::Slack => write!(f, "slack"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
        }
    }
}

/// Deal fields a rule may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealField {
    NextStep,
    Notes,
}

impl fmt::Display for DealField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DealField::NextStep => write!(f, "next_step"),
            DealField::Notes => write!(f, "notes"),
        }
    }
}

// =============================================================================
// Action configuration
// =============================================================================

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceStageConfig {
    #[serde(default = "default_true")]
    pub advance_to_next: bool,
}

/// Longest `due_days` a task rule may ask for.
pub const MAX_DUE_DAYS: u32 = 3650;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskConfig {
    pub title_template: String,
    pub due_days: u32,
    #[serde(default)]
    pub priority: TaskPriority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendNotificationConfig {
    pub channels: BTreeSet<NotificationChannel>,
    pub message_template: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDealFieldConfig {
    pub field: DealField,
    pub value_template: String,
}

/// Parsed, schema-checked `action_config`, one variant per action kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum ActionConfig {
    AdvanceStage(AdvanceStageConfig),
    CreateTask(CreateTaskConfig),
    SendNotification(SendNotificationConfig),
    UpdateDealField(UpdateDealFieldConfig),
}

impl ActionConfig {
    /// Parse a raw JSON config against the schema dictated by `action_type`.
    ///
    /// A `null` config is read as an empty object, so kinds whose fields all
    /// have defaults accept it.
    pub fn parse(
        action_type: ActionType,
        raw: &serde_json::Value,
    ) -> Result<ActionConfig, ConfigError> {
        let raw = match raw {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other.clone(),
        };
        let schema_err = |e: serde_json::Error| ConfigError::Schema {
            action_type,
            reason: e.to_string(),
        };
        let invalid = |reason: &str| ConfigError::Invalid {
            action_type,
            reason: reason.to_string(),
        };

        match action_type {
            ActionType::AdvanceStage => {
                let config: AdvanceStageConfig = serde_json::from_value(raw).map_err(schema_err)?;
                Ok(ActionConfig::AdvanceStage(config))
            }
            ActionType::CreateTask => {
                let config: CreateTaskConfig = serde_json::from_value(raw).map_err(schema_err)?;
                if config.title_template.trim().is_empty() {
                    return Err(invalid("title_template must not be blank"));
                }
                if config.due_days > MAX_DUE_DAYS {
                    return Err(invalid(&format!(
                        "due_days must be at most {}, got {}",
                        MAX_DUE_DAYS, config.due_days
                    )));
                }
                Ok(ActionConfig::CreateTask(config))
            }
            ActionType::SendNotification => {
                let config: SendNotificationConfig =
                    serde_json::from_value(raw).map_err(schema_err)?;
                if config.channels.is_empty() {
                    return Err(invalid("channels must not be empty"));
                }
                if config.message_template.trim().is_empty() {
                    return Err(invalid("message_template must not be blank"));
                }
                Ok(ActionConfig::SendNotification(config))
            }
            ActionType::UpdateDealField => {
                let config: UpdateDealFieldConfig =
                    serde_json::from_value(raw).map_err(schema_err)?;
                if config.value_template.trim().is_empty() {
                    return Err(invalid("value_template must not be blank"));
                }
                Ok(ActionConfig::UpdateDealField(config))
            }
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            ActionConfig::AdvanceStage(_) => ActionType::AdvanceStage,
            ActionConfig::CreateTask(_) => ActionType::CreateTask,
            ActionConfig::SendNotification(_) => ActionType::SendNotification,
            ActionConfig::UpdateDealField(_) => ActionType::UpdateDealField,
        }
    }
}

// =============================================================================
// Rules
// =============================================================================

/// An operator-authored binding of a trigger filter to one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub trigger_type: TriggerType,
    /// `None` matches every call type.
    pub call_type_filter: Option<BTreeSet<Uuid>>,
    pub action_type: ActionType,
    /// Raw config as stored; see [`AutomationRule::parse_action`].
    pub action_config: serde_json::Value,
    pub min_confidence: f64,
    pub cooldown_hours: u32,
    pub created_by: Option<Uuid>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AutomationRule {
    pub fn parse_action(&self) -> Result<ActionConfig, ConfigError> {
        ActionConfig::parse(self.action_type, &self.action_config)
    }

    pub fn cooldown_secs(&self) -> i64 {
        i64::from(self.cooldown_hours) * 3600
    }
}

/// Operator input for creating a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRule {
    pub org_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub call_type_filter: Option<BTreeSet<Uuid>>,
    pub action_type: ActionType,
    #[serde(default)]
    pub action_config: serde_json::Value,
    pub min_confidence: f64,
    #[serde(default)]
    pub cooldown_hours: u32,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

impl NewRule {
    /// Reject rules the engine could never run.
    pub fn validate(&self) -> Result<ActionConfig, DealpilotError> {
        if self.name.trim().is_empty() {
            return Err(DealpilotError::Validation(
                "rule name must not be empty".to_string(),
            ));
        }
        if !self.min_confidence.is_finite() || !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(DealpilotError::Validation(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        Ok(ActionConfig::parse(self.action_type, &self.action_config)?)
    }
}

// =============================================================================
// Signals and the execution log
// =============================================================================

/// An AI-derived event detected during a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub trigger_type: TriggerType,
    pub confidence: f64,
    #[serde(default)]
    pub call_type_id: Option<Uuid>,
    pub deal_id: Uuid,
    #[serde(default)]
    pub meeting_id: Option<Uuid>,
    pub org_id: Uuid,
    /// Deal name, meeting title and any other values available to templates.
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
    pub observed_at: Timestamp,
}

impl Signal {
    pub fn validate(&self) -> Result<(), DealpilotError> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(DealpilotError::Validation(format!(
                "confidence must be within [0, 1], got {}",
                self.confidence
            )));
        }
        Ok(())
    }

    /// A context value as a string, if present and a string.
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(|v| v.as_str())
    }
}

/// One audit record per (candidate rule, signal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub id: Uuid,
    pub org_id: Uuid,
    /// Cleared by the store when the rule is deleted.
    pub rule_id: Option<Uuid>,
    pub meeting_id: Option<Uuid>,
    pub deal_id: Uuid,
    pub trigger_type: TriggerType,
    pub trigger_signal: Signal,
    pub action_type: ActionType,
    pub action_result: Option<serde_json::Value>,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

// =============================================================================
// Tests
// =============================================================================
