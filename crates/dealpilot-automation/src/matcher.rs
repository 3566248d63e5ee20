//! Rule matching.
//!
//! A rule is a candidate for a signal when it is active, belongs to the
//! signal's organization, reacts to the signal's trigger type, accepts its
//! call type and does not require more confidence than the signal carries.

use dealpilot_core::error::ConfigError;
use dealpilot_core::types::{ActionConfig, AutomationRule, Signal};

/// A rule together with its parsed action config.
///
/// Parsing happens once per load. A rule whose config does not parse still
/// matches; the engine logs it as failed instead of dispatching it.
#[derive(Debug, Clone)]
pub struct PreparedRule {
    pub rule: AutomationRule,
    pub action: Result<ActionConfig, ConfigError>,
}

impl PreparedRule {
    pub fn new(rule: AutomationRule) -> Self {
        let action = rule.parse_action();
        Self { rule, action }
    }
}

/// Why a rule did not match a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Inactive,
    OtherOrganization,
    TriggerMismatch,
    CallTypeFiltered,
    BelowConfidence,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Inactive => "inactive",
            Rejection::OtherOrganization => "other_organization",
            Rejection::TriggerMismatch => "trigger_mismatch",
            Rejection::CallTypeFiltered => "call_type_filtered",
            Rejection::BelowConfidence => "below_confidence",
        }
    }
}

/// Decide whether `rule` reacts to `signal`.
pub fn check(rule: &AutomationRule, signal: &Signal) -> Result<(), Rejection> {
    if !rule.is_active {
        return Err(Rejection::Inactive);
    }
    if rule.org_id != signal.org_id {
        return Err(Rejection::OtherOrganization);
    }
    if rule.trigger_type != signal.trigger_type {
        return Err(Rejection::TriggerMismatch);
    }
    if let Some(filter) = &rule.call_type_filter {
        match signal.call_type_id {
            Some(call_type) if filter.contains(&call_type) => {}
            _ => return Err(Rejection::CallTypeFiltered),
        }
    }
    if signal.confidence < rule.min_confidence {
        return Err(Rejection::BelowConfidence);
    }
    Ok(())
}

/// Matching rules in evaluation order: oldest first, ties broken by id.
pub fn candidates<'a>(signal: &Signal, rules: &'a [PreparedRule]) -> Vec<&'a PreparedRule> {
    let mut matched: Vec<&PreparedRule> = rules
        .iter()
        .filter(|prepared| match check(&prepared.rule, signal) {
            Ok(()) => true,
            Err(rejection) => {
                tracing::debug!(
                    rule_id = %prepared.rule.id,
                    reason = rejection.as_str(),
                    "Rule did not match signal"
                );
                false
            }
        })
        .collect();
    matched.sort_by_key(|prepared| (prepared.rule.created_at, prepared.rule.id));
    matched
}
