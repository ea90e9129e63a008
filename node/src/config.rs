//! # Node Configuration
//!
//! `config.toml` in the data directory. The `[ledger]` and `[vault]`
//! sections are the protocol parameters; `[node]` holds operator
//! settings; `[genesis]` is only read when no snapshot exists yet.
//!
//! ```toml
//! [ledger]
//! cap = "100000000000000000000000"
//! daily_limit_bps = 1000
//!
//! [node]
//! api_port = 9841
//! keeper_interval_secs = 30
//!
//! [genesis]
//! admin = "admin"
//!
//! [[genesis.accounts]]
//! address = "alice"
//! balance = "1000000000000000000000"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use restake_protocol::config::{ConfigError, LedgerConfig, ProtocolConfig, VaultConfig};
use restake_protocol::types::{decimal, Address, Amount};

/// Default port for the REST / JSON-RPC API.
pub const DEFAULT_API_PORT: u16 = 9841;

/// Default port for the Prometheus endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Default keeper period.
pub const DEFAULT_KEEPER_INTERVAL_SECS: u64 = 30;

/// Snapshots retained after each keeper tick.
pub const DEFAULT_SNAPSHOTS_KEPT: usize = 64;

/// Everything in `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub ledger: LedgerConfig,
    pub vault: VaultConfig,
    pub node: NodeSettings,
    pub genesis: GenesisConfig,
}

/// Operator settings (`[node]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub api_port: u16,
    pub metrics_port: u16,
    /// Seconds between keeper ticks. Zero disables the keeper.
    pub keeper_interval_secs: u64,
    /// `pretty` or `json`.
    pub log_format: String,
    pub snapshots_kept: usize,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            api_port: DEFAULT_API_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            keeper_interval_secs: DEFAULT_KEEPER_INTERVAL_SECS,
            log_format: "pretty".into(),
            snapshots_kept: DEFAULT_SNAPSHOTS_KEPT,
        }
    }
}

/// Genesis state (`[genesis]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    /// Initial admin, also the initial restaker.
    pub admin: Address,
    /// Initial base-asset balances.
    pub accounts: Vec<GenesisAccount>,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            admin: Address::from("admin"),
            accounts: Vec::new(),
        }
    }
}

/// One funded account at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: Address,
    #[serde(with = "decimal")]
    pub balance: Amount,
}

impl NodeConfig {
    /// The protocol parameters alone.
    pub fn protocol(&self) -> ProtocolConfig {
        ProtocolConfig {
            ledger: self.ledger.clone(),
            vault: self.vault.clone(),
        }
    }

    /// Genesis balances as `(address, amount)` pairs.
    pub fn genesis_balances(&self) -> Vec<(Address, Amount)> {
        self.genesis
            .accounts
            .iter()
            .map(|a| (a.address.clone(), a.balance))
            .collect()
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.protocol().validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
