// SecureDB: CLI Command Handlers
//
// Each function handles one CLI subcommand against the store opened from
// the resolved `Config`. `serve` and `feed` run until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;

use crate::config::{Config, FeedConfig};
use crate::error::SecureDbError;
use crate::feed;
use crate::gateway::UdsServer;
use crate::store::{Record, RecordId, UpdateOutcome};

use super::{Cli, Commands};

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<(), SecureDbError> {
    let config = Config::new(cli.data_dir, cli.key_backend);

    match cli.command {
        Commands::Init => cmd_init(&config).await,
        Commands::Add { id, payload } => cmd_add(&config, id, &payload).await,
        Commands::List { partial } => cmd_list(&config, partial).await,
        Commands::Get { id } => cmd_get(&config, &id).await,
        Commands::Update { id, payload } => cmd_update(&config, &id, &payload).await,
        Commands::Delete { id } => cmd_delete(&config, &id).await,
        Commands::Clear => cmd_clear(&config).await,
        Commands::Serve { socket } => cmd_serve(&config, socket).await,
        Commands::Feed {
            file,
            interval_secs,
            addr,
        } => cmd_feed(feed_config(file, interval_secs, addr)).await,
    }
}

// ─── Init ────────────────────────────────────────────────────────────────────

async fn cmd_init(config: &Config) -> Result<(), SecureDbError> {
    let store = config.open_store()?;
    let keys = store.key_manager();

    let existed = keys.has_key().await?;
    keys.get_or_create_key().await?;

    println!("✓ SecureDB initialized");
    println!("  Database: {}", config.db_path().display());
    match config.key_backend {
        crate::config::KeyBackend::File => {
            println!("  Key file: {}", config.key_file().display())
        }
        crate::config::KeyBackend::Keyring => println!("  Key stored in platform keyring"),
    }
    if existed {
        println!("  Existing encryption key loaded");
    } else {
        println!("  New encryption key generated");
    }

    Ok(())
}

// ─── Records ─────────────────────────────────────────────────────────────────

async fn cmd_add(config: &Config, id: Option<String>, payload: &str) -> Result<(), SecureDbError> {
    let payload = parse_payload(payload)?;
    let id = resolve_new_id(id);

    let store = config.open_store()?;
    store.add(Record::new(id.clone(), payload)).await?;

    println!("✓ Record stored");
    println!("  ID: {}", id);
    Ok(())
}

async fn cmd_list(config: &Config, partial: bool) -> Result<(), SecureDbError> {
    let store = config.open_store()?;

    if !partial {
        let payloads = store.read_all().await?;
        if payloads.is_empty() {
            println!("No records stored yet.");
            return Ok(());
        }
        for payload in payloads {
            println!("{}", payload);
        }
        return Ok(());
    }

    let report = store.read_report().await?;
    if report.records.is_empty() && report.failures.is_empty() {
        println!("No records stored yet.");
        return Ok(());
    }

    println!("Records ({}):\n", report.records.len());
    for (id, payload) in &report.records {
        println!("  {:>12} │ {}", id.to_string(), payload);
    }

    if !report.failures.is_empty() {
        println!("\nUnreadable records ({}):\n", report.failures.len());
        for failure in &report.failures {
            println!("  {:>12} │ {}", failure.id.to_string(), failure.error);
        }
    }

    Ok(())
}

async fn cmd_get(config: &Config, id: &str) -> Result<(), SecureDbError> {
    let id = RecordId::from_arg(id);
    let store = config.open_store()?;

    match store.get(&id).await? {
        Some(payload) => println!("{}", pretty(&payload)),
        None => println!("Record not found: {}", id),
    }
    Ok(())
}

async fn cmd_update(config: &Config, id: &str, payload: &str) -> Result<(), SecureDbError> {
    let payload = parse_payload(payload)?;
    let id = RecordId::from_arg(id);

    let store = config.open_store()?;
    match store.update(id.clone(), &payload).await? {
        UpdateOutcome::Replaced => println!("✓ Record {} updated", id),
        UpdateOutcome::Created => println!("✓ Record {} did not exist and was created", id),
    }
    Ok(())
}

async fn cmd_delete(config: &Config, id: &str) -> Result<(), SecureDbError> {
    let id = RecordId::from_arg(id);
    let store = config.open_store()?;

    if store.delete(&id).await? {
        println!("✓ Record {} deleted", id);
    } else {
        println!("Record not found: {}", id);
    }
    Ok(())
}

async fn cmd_clear(config: &Config) -> Result<(), SecureDbError> {
    let store = config.open_store()?;
    let removed = store.clear().await?;
    println!("✓ {} record(s) removed", removed);
    Ok(())
}

// ─── Serve / Feed ────────────────────────────────────────────────────────────

async fn cmd_serve(
    config: &Config,
    socket: Option<PathBuf>,
) -> Result<(), SecureDbError> {
    let store = config.open_store()?;
    let socket_path = socket.unwrap_or_else(|| config.socket_path());

    println!("Starting SecureDB gateway at {}...", socket_path.display());
    UdsServer::new(store, socket_path)
        .run()
        .await
        .map_err(|e| SecureDbError::Gateway(e.to_string()))
}

async fn cmd_feed(feed_config: FeedConfig) -> Result<(), SecureDbError> {
    println!(
        "Starting live feed on ws://{} from {}...",
        feed_config.addr,
        feed_config.file.display()
    );
    feed::run(feed_config).await?;
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Fill unset feed flags from `FeedConfig::default()`.
fn feed_config(
    file: Option<PathBuf>,
    interval_secs: Option<u64>,
    addr: Option<SocketAddr>,
) -> FeedConfig {
    let defaults = FeedConfig::default();
    FeedConfig {
        file: file.unwrap_or(defaults.file),
        interval: interval_secs
            .map(|secs| Duration::from_secs(secs.max(1)))
            .unwrap_or(defaults.interval),
        addr: addr.unwrap_or(defaults.addr),
    }
}

fn parse_payload(raw: &str) -> Result<Value, SecureDbError> {
    serde_json::from_str(raw)
        .map_err(|e| SecureDbError::InvalidInput(format!("payload is not valid JSON: {}", e)))
}

fn resolve_new_id(id: Option<String>) -> RecordId {
    match id {
        Some(raw) => RecordId::from_arg(&raw),
        None => RecordId::Text(uuid::Uuid::new_v4().to_string()),
    }
}

fn pretty(payload: &Value) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
}
