//! # CLI Interface
//!
//! Defines the command-line argument structure for `restake-node` using
//! `clap` derive. Supports four subcommands: `init`, `run`, `simulate`,
//! and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Operator node for the restaking pool.
///
/// Hosts the pool state, serves the JSON-RPC API, runs the keeper that
/// advances the withdrawal queue, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "restake-node",
    about = "Restaking pool operator node",
    version,
    propagate_version = true
)]
pub struct RestakeNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory, a default `config.toml`, and the genesis
    /// snapshot.
    Init(InitArgs),
    /// Start the node.
    Run(RunArgs),
    /// Replay a JSON scenario against a fresh pool on a manual clock.
    Simulate(SimulateArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "RESTAKE_DATA_DIR", default_value = "./restake-data")]
    pub data_dir: PathBuf,

    /// Genesis admin. Overrides `[genesis] admin` of an existing config.
    #[arg(long, env = "RESTAKE_ADMIN")]
    pub admin: Option<String>,

    /// Overwrite an existing `config.toml`.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `run` subcommand. Flags override `config.toml`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node configuration file (TOML).
    ///
    /// When omitted, the node reads `config.toml` from the data directory.
    #[arg(long, short = 'c', env = "RESTAKE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the data directory holding the snapshot database.
    #[arg(long, short = 'd', env = "RESTAKE_DATA_DIR", default_value = "./restake-data")]
    pub data_dir: PathBuf,

    /// Port for the REST and JSON-RPC API.
    #[arg(long, env = "RESTAKE_API_PORT")]
    pub api_port: Option<u16>,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "RESTAKE_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Seconds between keeper ticks. Zero disables the keeper.
    #[arg(long, env = "RESTAKE_KEEPER_INTERVAL")]
    pub keeper_interval_secs: Option<u64>,

    /// Log format: `pretty` or `json`.
    #[arg(long, env = "RESTAKE_LOG_FORMAT")]
    pub log_format: Option<String>,
}

/// Arguments for the `simulate` subcommand.
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Scenario file (JSON).
    pub scenario: PathBuf,

    /// Print the full report as one JSON document instead of one line per
    /// step.
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        RestakeNodeCli::command().debug_assert();
    }

    #[test]
    fn run_flags_are_optional_overrides() {
        let cli = RestakeNodeCli::parse_from(["restake-node", "run", "--api-port", "7000"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.api_port, Some(7000));
        assert_eq!(args.metrics_port, None);
    }
}
