pub mod config;
pub mod error;
pub mod types;

pub use config::DealpilotConfig;
pub use error::{ConfigError, DealpilotError, Result};
pub use types::*;
