use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DealpilotError, Result};

/// Top-level configuration for Dealpilot.
///
/// Loaded from `~/.dealpilot/config.toml` by default. Every section falls back
/// to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DealpilotConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl DealpilotConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DealpilotConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DealpilotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the SQLite database and the API token.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.dealpilot/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Automation engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for every outbound capability call.
    pub action_timeout_secs: u64,
    /// Number of signal workers in the pool.
    pub workers: usize,
    /// Bounded signal queue size.
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            action_timeout_secs: 10,
            workers: 4,
            queue_capacity: 256,
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 3040,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = DealpilotConfig::default();
        assert_eq!(config.general.data_dir, "~/.dealpilot/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.engine.action_timeout_secs, 10);
        assert_eq!(config.engine.workers, 4);
        assert_eq!(config.engine.queue_capacity, 256);
        assert_eq!(config.api.bind_address, "127.0.0.1");
        assert_eq!(config.api.port, 3040);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/srv/dealpilot"
log_level = "debug"

[engine]
action_timeout_secs = 3
workers = 8
queue_capacity = 1024

[api]
bind_address = "0.0.0.0"
port = 8080
"#;
        let file = create_temp_config(content);
        let config = DealpilotConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/srv/dealpilot");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.engine.action_timeout_secs, 3);
        assert_eq!(config.engine.workers, 8);
        assert_eq!(config.engine.queue_capacity, 1024);
        assert_eq!(config.api.bind_address, "0.0.0.0");
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[engine]
workers = 2
"#;
        let file = create_temp_config(content);
        let config = DealpilotConfig::load(file.path()).unwrap();
        assert_eq!(config.engine.workers, 2);
        assert_eq!(config.engine.action_timeout_secs, 10);
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.api.port, 3040);
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let file = create_temp_config("[engine\nworkers = ");
        let err = DealpilotConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, DealpilotError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = DealpilotConfig::load_or_default(Path::new("/nonexistent/dealpilot.toml"));
        assert_eq!(config.general.data_dir, "~/.dealpilot/data");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = DealpilotConfig::default();
        config.engine.workers = 12;
        config.save(&path).unwrap();

        let reloaded = DealpilotConfig::load(&path).unwrap();
        assert_eq!(reloaded.engine.workers, 12);
        assert_eq!(reloaded.api.port, config.api.port);
    }
}
