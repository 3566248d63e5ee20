//! Reading deals, signals and rules from operator-supplied files.

use std::path::Path;

use dealpilot_automation::memory::DealRecord;
use dealpilot_core::error::DealpilotError;
use dealpilot_core::types::{NewRule, Signal};

/// A signal line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    /// 1-based line number.
    pub line: usize,
    pub error: String,
}

/// Load a JSON array of deals.
pub fn read_deals(path: &Path) -> Result<Vec<DealRecord>, DealpilotError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Load a JSON array of rules.
pub fn read_rules(path: &Path) -> Result<Vec<NewRule>, DealpilotError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Load a JSON-lines file of signals.
///
/// Blank lines and lines starting with `#` are ignored. Lines that do not
/// parse are returned separately so one bad line does not stop the batch.
pub fn read_signals(path: &Path) -> Result<(Vec<Signal>, Vec<MalformedLine>), DealpilotError> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_signals(&content))
}

fn parse_signals(content: &str) -> (Vec<Signal>, Vec<MalformedLine>) {
    let mut signals = Vec::new();
    let mut malformed = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<Signal>(line) {
            Ok(signal) => signals.push(signal),
            Err(e) => malformed.push(MalformedLine {
                line: idx + 1,
                error: e.to_string(),
            }),
        }
    }

    (signals, malformed)
}
