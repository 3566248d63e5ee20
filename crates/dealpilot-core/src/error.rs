use thiserror::Error;

use crate::types::ActionType;

/// Top-level error type for Dealpilot.
///
/// Storage, configuration and API failures surface through this type. The
/// automation crate keeps its own executor-level errors and converts into this
/// one only where an error has to cross a crate boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DealpilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for DealpilotError {
    fn from(err: toml::de::Error) -> Self {
        DealpilotError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DealpilotError {
    fn from(err: toml::ser::Error) -> Self {
        DealpilotError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for DealpilotError {
    fn from(err: serde_json::Error) -> Self {
        DealpilotError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Dealpilot operations.
pub type Result<T> = std::result::Result<T, DealpilotError>;

/// A rule's `action_config` does not fit the schema of its `action_type`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{action_type} config does not match schema: {reason}")]
    Schema {
        action_type: ActionType,
        reason: String,
    },

    #[error("{action_type} config is invalid: {reason}")]
    Invalid {
        action_type: ActionType,
        reason: String,
    },
}

impl From<ConfigError> for DealpilotError {
    fn from(err: ConfigError) -> Self {
        DealpilotError::Validation(err.to_string())
    }
}
