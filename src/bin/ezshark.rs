//! ezshark - front-end control layer of the ezshark traffic debugger
//!
//! Maintains the durable settings file and replays recorded backend push
//! streams through the inspector without a UI.
//!
//! # Usage
//!
//! ```bash
//! # Show every stored setting
//! ezshark settings list
//!
//! # Change the proxy port
//! ezshark settings set port 9090
//!
//! # Feed a recorded push stream through a headless inspector
//! ezshark replay pushes.jsonl
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ezs_inspector::{
    spawn_settings, Inspector, InspectorConfig, JsonFileBackend, MemoryBackend, OfflineBackend,
    SettingsBackend,
};
use ezs_window::{spawn_coordinator, HeadlessHost, MessageBus};

/// ezshark front-end tools
#[derive(Parser, Debug)]
#[command(name = "ezshark", version, about)]
struct Args {
    /// Config file (defaults to $EZSHARK_CONFIG or the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Settings file, overriding the config
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read or change durable settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Replay a JSON-lines file of backend pushes through a headless inspector
    Replay {
        /// One `{"event": ..., "payload": ...}` object per line
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print every setting
    List,
    /// Print one setting
    Get { key: String },
    /// Store a value (parsed as JSON, else kept as a string)
    Set { key: String, value: String },
    /// Delete one setting
    Remove { key: String },
    /// Delete every setting
    Clear,
}

/// One recorded push.
#[derive(Debug, Deserialize)]
struct ReplayLine {
    event: String,
    payload: Value,
}

fn load_config(args: &Args) -> Result<InspectorConfig> {
    let mut config = match &args.config {
        Some(path) => InspectorConfig::load_from(path),
        None => InspectorConfig::load(),
    }
    .context("Failed to load config")?;

    if let Some(path) = &args.settings {
        config.settings_path = path.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ezshark=info".parse()?)
                .add_directive("ezs_window=info".parse()?)
                .add_directive("ezs_inspector=info".parse()?),
        )
        .init();

    let config = load_config(&args)?;

    match args.command {
        Command::Settings { action } => run_settings(&config, action).await,
        Command::Replay { file } => run_replay(&config, &file).await,
    }
}

async fn run_settings(config: &InspectorConfig, action: SettingsAction) -> Result<()> {
    let settings = spawn_settings(JsonFileBackend::new(&config.settings_path))
        .await
        .with_context(|| format!("Failed to open {}", config.settings_path.display()))?;

    match action {
        SettingsAction::List => {
            let all = settings.snapshot().await;
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
        SettingsAction::Get { key } => match settings.get(&key).await {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => {
                eprintln!("Setting {key} is not set");
                std::process::exit(1);
            }
        },
        SettingsAction::Set { key, value } => {
            let value: Value =
                serde_json::from_str(&value).unwrap_or_else(|_| Value::String(value));
            settings
                .set(&key, value)
                .await
                .with_context(|| format!("Failed to store {key}"))?;
            info!(key = %key, "setting stored");
        }
        SettingsAction::Remove { key } => {
            settings
                .remove(&key)
                .await
                .with_context(|| format!("Failed to remove {key}"))?;
            info!(key = %key, "setting removed");
        }
        SettingsAction::Clear => {
            settings.clear().await.context("Failed to clear settings")?;
            info!("settings cleared");
        }
    }
    Ok(())
}

async fn run_replay(config: &InspectorConfig, file: &Path) -> Result<()> {
    // Start from the stored settings but never write them back.
    let stored = JsonFileBackend::new(&config.settings_path)
        .load()
        .await
        .with_context(|| format!("Failed to read {}", config.settings_path.display()))?;
    let settings = spawn_settings(MemoryBackend::with_settings(stored)).await?;

    let coordinator = spawn_coordinator(Arc::new(HeadlessHost::new()));
    let bus = MessageBus::new(config.event_buffer);
    let mut inspector = Inspector::bootstrap(
        config,
        settings,
        Arc::new(OfflineBackend),
        coordinator,
        bus,
    )
    .await
    .context("Failed to start inspector")?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Error waiting for Ctrl+C");
            return;
        }
        info!("Shutdown signal received");
        shutdown.cancel();
    });

    let reader = BufReader::new(
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?,
    );
    let mut sent = 0usize;
    let mut skipped = 0usize;
    for (index, line) in reader.lines().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        let line = line.with_context(|| format!("Failed to read {}", file.display()))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let applied = match serde_json::from_str::<ReplayLine>(line) {
            Ok(recorded) => inspector.handle_event(&recorded.event, recorded.payload).await,
            Err(e) => {
                warn!(line = index + 1, error = %e, "skipping malformed line");
                false
            }
        };
        if applied {
            sent += 1;
        } else {
            skipped += 1;
        }
        inspector.process_pending();
    }

    info!(sent, skipped, "replay finished");

    for session in inspector.sessions().sessions() {
        println!(
            "{}\t{}\t{} rows",
            session.id,
            session.label,
            inspector.traffic().len(&session.id)
        );
    }
    let paused = inspector.orchestrator().paused();
    if !paused.is_empty() {
        println!("{} paused", paused.len());
        for key in paused.keys() {
            println!("  {key}");
        }
    }
    Ok(())
}
