// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Restake Node
//!
//! Entry point for the `restake-node` binary. Parses CLI arguments,
//! initializes logging and metrics, restores the pool from its latest
//! snapshot, starts the keeper, and serves the HTTP API.
//!
//! The binary supports four subcommands:
//!
//! - `init`: create the data directory, config, and genesis snapshot
//! - `run`: start the node
//! - `simulate`: replay a JSON scenario on a manual clock
//! - `version`: print build version information

mod api;
mod cli;
mod config;
mod keeper;
mod logging;
mod metrics;
mod simulate;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::RwLock;

use restake_contracts::{PoolState, RestakingPool};
use restake_protocol::clock::{Clock, SystemClock};
use restake_protocol::storage::SnapshotStore;

use cli::{Commands, RestakeNodeCli};
use config::NodeConfig;
use logging::LogFormat;
use metrics::NodeMetrics;

const CONFIG_FILE: &str = "config.toml";
const DB_DIR: &str = "db";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = RestakeNodeCli::parse();

    match cli.command {
        Commands::Init(args) => init_node(args),
        Commands::Run(args) => run_node(args).await,
        Commands::Simulate(args) => simulate_scenario(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Opens the snapshot store and returns the latest state, or a fresh
/// genesis state when the store is empty.
fn restore_or_genesis(
    store: &SnapshotStore,
    config: &NodeConfig,
    clock: &dyn Clock,
) -> Result<PoolState> {
    if let Some((seq, state)) = store
        .latest_snapshot::<PoolState>()
        .context("failed to read latest snapshot")?
    {
        tracing::info!(seq, "pool restored from snapshot");
        return Ok(state);
    }

    let state = PoolState::genesis(
        &config.protocol(),
        config.genesis.admin.clone(),
        config.genesis_balances(),
        clock.now(),
    )
    .context("failed to build genesis state")?;
    let seq = store
        .put_snapshot(&state)
        .context("failed to persist genesis snapshot")?;
    tracing::info!(seq, admin = %config.genesis.admin, "genesis snapshot written");
    Ok(state)
}

fn open_store(data_dir: &Path) -> Result<SnapshotStore> {
    let db_path = data_dir.join(DB_DIR);
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    SnapshotStore::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))
}

/// Creates the data directory, writes a default `config.toml` unless one
/// exists, and persists the genesis snapshot.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("restake_node=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let config_path = data_dir.join(CONFIG_FILE);
    let mut config = if config_path.exists() && !args.force {
        NodeConfig::load(&config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?
    } else {
        NodeConfig::default()
    };
    if let Some(admin) = args.admin {
        config.genesis.admin = admin.into();
    }
    let rendered = config.to_toml_string().context("failed to render config")?;
    std::fs::write(&config_path, rendered)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    tracing::info!(path = %config_path.display(), "config written");

    let store = open_store(data_dir)?;
    restore_or_genesis(&store, &config, &SystemClock)?;

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Config         : {}", config_path.display());
    println!("  Genesis admin  : {}", config.genesis.admin);
    println!("  Snapshots      : {}", store.snapshot_count());

    Ok(())
}

/// Starts the node: API server, metrics endpoint, and keeper.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    let config_path: PathBuf = args
        .config
        .clone()
        .unwrap_or_else(|| args.data_dir.join(CONFIG_FILE));
    let mut config = NodeConfig::load(&config_path).with_context(|| {
        format!(
            "failed to load {} (run `restake-node init` first)",
            config_path.display()
        )
    })?;
    if let Some(port) = args.api_port {
        config.node.api_port = port;
    }
    if let Some(port) = args.metrics_port {
        config.node.metrics_port = port;
    }
    if let Some(secs) = args.keeper_interval_secs {
        config.node.keeper_interval_secs = secs;
    }
    if let Some(format) = args.log_format {
        config.node.log_format = format;
    }

    logging::init_logging(
        logging::DEFAULT_DIRECTIVES,
        LogFormat::from_str_lossy(&config.node.log_format),
    );
    tracing::info!(
        api_port = config.node.api_port,
        metrics_port = config.node.metrics_port,
        keeper_interval_secs = config.node.keeper_interval_secs,
        data_dir = %args.data_dir.display(),
        "starting restake-node"
    );

    // --- Persistent storage ---
    let store = Arc::new(open_store(&args.data_dir)?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = restore_or_genesis(&store, &config, clock.as_ref())?;
    if state.halted {
        tracing::warn!("restored pool is halted; an admin must resume it");
    }
    let pool = Arc::new(RwLock::new(RestakingPool::from_state(state, clock)));

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    if let Ok(status) = pool.read().await.status() {
        node_metrics.observe(&status);
    }

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        pool: Arc::clone(&pool),
        metrics: Arc::clone(&node_metrics),
        store: Arc::clone(&store),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", config.node.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", config.node.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Keeper ---
    let keeper_task = (config.node.keeper_interval_secs > 0).then(|| {
        tokio::spawn(keeper::run(
            Arc::clone(&pool),
            Arc::clone(&store),
            Arc::clone(&node_metrics),
            std::time::Duration::from_secs(config.node.keeper_interval_secs),
            config.node.snapshots_kept,
        ))
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    if let Some(task) = keeper_task {
        task.abort();
    }
    let snapshot = pool.read().await.snapshot();
    let seq = store
        .put_snapshot(&snapshot)
        .context("failed to persist final snapshot")?;
    tracing::info!(seq, "final snapshot written, restake-node stopped");
    Ok(())
}

/// Replays a scenario file and prints the outcome of every step.
fn simulate_scenario(args: cli::SimulateArgs) -> Result<()> {
    logging::init_logging("warn", LogFormat::Pretty);

    let raw = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("failed to read {}", args.scenario.display()))?;
    let scenario: simulate::Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", args.scenario.display()))?;
    let report = simulate::run_scenario(&scenario).context("scenario genesis failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    for step in &report.steps {
        println!("{}", serde_json::to_string(step)?);
    }
    println!(
        "{} steps, {} rejected, {} shares outstanding, {} asset in vault",
        report.steps.len(),
        report.rejected(),
        report.final_status.total_shares,
        report.final_status.vault_balance,
    );
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("restake-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc        {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed the corresponding branch never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
