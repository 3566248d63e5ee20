//! CLI argument definitions for the Dealpilot binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use dealpilot_core::config::DealpilotConfig;

/// Dealpilot - turns call signals into pipeline actions.
#[derive(Parser, Debug)]
#[command(name = "dealpilot", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for the SQLite database and the API token.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API.
    Serve {
        /// API server port.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,

        /// JSON file with the deals the sandbox pipeline starts from.
        #[arg(long = "deals")]
        deals: Option<PathBuf>,
    },

    /// Feed a JSON-lines file of signals through the worker pool.
    Process {
        /// One signal object per line.
        signals: PathBuf,

        /// JSON file with the deals the sandbox pipeline starts from.
        #[arg(long = "deals")]
        deals: Option<PathBuf>,
    },

    /// Validate and store the rules in a JSON array file.
    ImportRules {
        rules: PathBuf,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > DEALPILOT_CONFIG env var > ~/.dealpilot/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("DEALPILOT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > DEALPILOT_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Command::Serve { port: Some(p), .. } = self.command {
            return p;
        }
        if let Ok(val) = std::env::var("DEALPILOT_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }

    /// Apply --data-dir and --log-level on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut DealpilotConfig) {
        if let Some(ref dir) = self.data_dir {
            config.general.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".dealpilot").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".dealpilot").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_globals() {
        let args = CliArgs::try_parse_from([
            "dealpilot",
            "serve",
            "--port",
            "4000",
            "--data-dir",
            "/tmp/dp",
            "-l",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.resolve_port(3040), 4000);
        assert!(matches!(args.command, Command::Serve { deals: None, .. }));

        let mut config = DealpilotConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.general.data_dir, "/tmp/dp");
        assert_eq!(config.general.log_level, "debug");
    }

    #[test]
    fn test_parse_process() {
        let args = CliArgs::try_parse_from([
            "dealpilot",
            "process",
            "signals.jsonl",
            "--deals",
            "deals.json",
        ])
        .unwrap();

        match args.command {
            Command::Process { signals, deals } => {
                assert_eq!(signals, PathBuf::from("signals.jsonl"));
                assert_eq!(deals, Some(PathBuf::from("deals.json")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_import_rules() {
        let args =
            CliArgs::try_parse_from(["dealpilot", "-c", "custom.toml", "import-rules", "rules.json"])
                .unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("custom.toml"));
        assert!(matches!(args.command, Command::ImportRules { .. }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(CliArgs::try_parse_from(["dealpilot"]).is_err());
        assert!(CliArgs::try_parse_from(["dealpilot", "process"]).is_err());
    }

    #[test]
    fn test_overrides_leave_config_alone_when_absent() {
        let args = CliArgs::try_parse_from(["dealpilot", "import-rules", "r.json"]).unwrap();
        let mut config = DealpilotConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.general.data_dir, "~/.dealpilot/data");
        assert_eq!(config.general.log_level, "info");
    }
}
