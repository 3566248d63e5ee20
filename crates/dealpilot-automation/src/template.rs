//! `{{placeholder}}` substitution for action templates.
//!
//! Rendering is a single pass over the template. Values are inserted
//! verbatim, so a value that itself contains `{{...}}` is never expanded.
//! Unknown placeholders render as the empty string.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use dealpilot_core::types::Signal;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\}\}").unwrap());

/// Values available to a template, keyed by placeholder name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    values: BTreeMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Build the context for a signal.
    ///
    /// Every context key is available as-is, nested objects additionally as
    /// dotted paths (`contact.name`). The computed keys `trigger_type`,
    /// `deal_id`, `meeting_id`, `org_id` and `confidence` always win over
    /// context keys of the same name; `deal_name` and `meeting_title` fall
    /// back to the empty string.
    pub fn from_signal(signal: &Signal) -> Self {
        let mut ctx = Self::new();
        for (key, value) in &signal.context {
            ctx.insert_value(key, value);
        }

        for key in ["deal_name", "meeting_title"] {
            if ctx.get(key).is_none() {
                ctx.insert(key, "");
            }
        }

        ctx.insert("trigger_type", signal.trigger_type.as_str());
        ctx.insert("deal_id", signal.deal_id.to_string());
        ctx.insert("org_id", signal.org_id.to_string());
        ctx.insert(
            "meeting_id",
            signal.meeting_id.map(|id| id.to_string()).unwrap_or_default(),
        );
        ctx.insert("confidence", format!("{:.2}", signal.confidence));
        ctx
    }

    fn insert_value(&mut self, key: &str, value: &Value) {
        if let Value::Object(fields) = value {
            for (child, child_value) in fields {
                self.insert_value(&format!("{}.{}", key, child), child_value);
            }
        }
        self.insert(key, value_to_text(value));
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitute every placeholder in `template` from `ctx`.
pub fn render(template: &str, ctx: &TemplateContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            ctx.get(&caps[1]).unwrap_or_default().to_string()
        })
        .into_owned()
}
