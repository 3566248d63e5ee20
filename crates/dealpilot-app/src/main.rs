//! Dealpilot binary: configuration, tracing and wiring of the engine,
//! storage and HTTP API.

mod cli;
mod input;
mod sandbox;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;

use dealpilot_api::auth::load_or_generate_token;
use dealpilot_api::{start_server, AppState};
use dealpilot_automation::{AutomationEngine, PoolStats, SignalWorkerPool, SqliteRuleLogStore, SystemClock};
use dealpilot_core::config::{DealpilotConfig, EngineConfig};
use dealpilot_core::types::Timestamp;
use dealpilot_storage::{Database, RuleRepository};

use crate::cli::{CliArgs, Command};
use crate::sandbox::{Sandbox, SandboxSummary};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

fn build_engine(config: &EngineConfig, db: &Arc<Database>, sandbox: &Sandbox) -> Arc<AutomationEngine> {
    Arc::new(AutomationEngine::new(
        Arc::new(SqliteRuleLogStore::new(Arc::clone(db))),
        sandbox.capabilities(),
        Arc::new(SystemClock),
        Duration::from_secs(config.action_timeout_secs.max(1)),
    ))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

async fn serve(
    config: &DealpilotConfig,
    port: u16,
    db: Arc<Database>,
    data_dir: &Path,
    deals: Option<&Path>,
) -> AppResult<()> {
    let sandbox = Sandbox::load(deals)?;
    let engine = build_engine(&config.engine, &db, &sandbox);
    let token = load_or_generate_token(&data_dir.join("api_token"));
    let state = AppState::new(db, engine, token);

    let mut api = config.api.clone();
    api.port = port;
    start_server(&api, state, shutdown_signal()).await?;

    let summary = sandbox.summary();
    tracing::info!(
        tasks = summary.tasks_created,
        notifications = summary.notifications_sent,
        "Sandbox state at shutdown"
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct ProcessSummary {
    stats: PoolStats,
    malformed_lines: usize,
    sandbox: SandboxSummary,
}

async fn process(
    config: &DealpilotConfig,
    db: Arc<Database>,
    signals_path: &Path,
    deals: Option<&Path>,
) -> AppResult<()> {
    let (signals, malformed) = input::read_signals(signals_path)?;
    for bad in &malformed {
        tracing::warn!(line = bad.line, error = %bad.error, "Skipping malformed signal");
    }
    tracing::info!(path = %signals_path.display(), count = signals.len(), "Signals loaded");

    let sandbox = Sandbox::load(deals)?;
    let engine = build_engine(&config.engine, &db, &sandbox);
    let pool = SignalWorkerPool::spawn(engine, config.engine.workers, config.engine.queue_capacity);

    for signal in signals {
        pool.submit(signal).await?;
    }
    let stats = pool.shutdown().await;

    let summary = ProcessSummary {
        stats,
        malformed_lines: malformed.len(),
        sandbox: sandbox.summary(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn import_rules(db: Arc<Database>, rules_path: &Path) -> AppResult<()> {
    let rules = input::read_rules(rules_path)?;
    let repo = RuleRepository::new(db);

    let mut imported = 0usize;
    let mut rejected = 0usize;
    for (index, rule) in rules.into_iter().enumerate() {
        let name = rule.name.clone();
        match repo.insert(rule, Timestamp::now()) {
            Ok(stored) => {
                tracing::info!(rule_id = %stored.id, name = %stored.name, "Rule imported");
                imported += 1;
            }
            Err(e) => {
                tracing::warn!(index, name = %name, error = %e, "Rule rejected");
                rejected += 1;
            }
        }
    }

    println!("Imported {} rule(s), rejected {}", imported, rejected);
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    // Config. Loaded before tracing so the configured level applies.
    let config_file = args.resolve_config_path();
    let (mut config, load_error) = match DealpilotConfig::load(&config_file) {
        Ok(config) => (config, None),
        Err(e) => (DealpilotConfig::default(), Some(e)),
    };
    args.apply_overrides(&mut config);

    init_tracing(&config.general.log_level);
    tracing::info!("Starting Dealpilot v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        None => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
    }

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("dealpilot.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    match &args.command {
        Command::Serve { deals, .. } => {
            let port = args.resolve_port(config.api.port);
            serve(&config, port, db, &data_dir, deals.as_deref()).await
        }
        Command::Process { signals, deals } => {
            process(&config, db, signals, deals.as_deref()).await
        }
        Command::ImportRules { rules } => import_rules(db, rules),
    }
}
