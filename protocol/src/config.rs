//! # Protocol Configuration & Constants
//!
//! Every magic number of the accounting core lives here, together with the
//! tunable parameters an operator loads from TOML at startup.
//!
//! Constants are the things that never change after launch (precision,
//! day length). `ProtocolConfig` holds the things governance is expected
//! to tune (cap, limits, reserve fractions), and every field has a default
//! so a partial TOML file is still a valid one.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::types::Amount;

// ---------------------------------------------------------------------------
// Fixed-Point Parameters
// ---------------------------------------------------------------------------

/// Scale of the exchange rate: `rate` is asset-wei per `RATE_PRECISION`
/// shares. 1e18, same as the base asset's own decimals.
pub const RATE_PRECISION: Amount = 1_000_000_000_000_000_000;

/// The rate every pool starts at: one asset-wei per share-wei.
pub const INITIAL_RATE: Amount = RATE_PRECISION;

/// Denominator for every basis-point parameter. 1 bp = 0.01%.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// One whole unit of the base asset, in wei.
pub const ONE_ASSET: Amount = 1_000_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Length of the issuance accounting window. Days are UTC, aligned to the
/// Unix epoch, so every node agrees on when "today" ends.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Default minimum spacing between accepted rate updates.
pub const DEFAULT_RATE_UPDATE_INTERVAL_SECS: u64 = 86_400;

// ---------------------------------------------------------------------------
// Ledger Defaults
// ---------------------------------------------------------------------------

/// Default share cap: 100k whole shares.
pub const DEFAULT_CAP: Amount = 100_000 * ONE_ASSET;

/// Default daily issuance limit as a fraction of cap: 10%.
pub const DEFAULT_DAILY_LIMIT_BPS: u32 = 1_000;

/// Default ceiling on rate growth per update: 0.5%.
///
/// Real restaking yield is a few percent a year. Anything close to this
/// bound in a single day is an oracle problem, not yield.
pub const DEFAULT_MAX_DAILY_GROWTH_BPS: u32 = 50;

/// Default haircut applied to redemptions. Zero: redeem at the published rate.
pub const DEFAULT_REDEMPTION_DISCOUNT_BPS: u32 = 0;

// ---------------------------------------------------------------------------
// Vault Defaults
// ---------------------------------------------------------------------------

/// Default fraction of outstanding share value kept liquid for instant
/// withdrawals: 5%.
pub const DEFAULT_FAST_RESERVE_BPS: u32 = 500;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML document is malformed or has the wrong types.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered back to TOML.
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    /// A basis-point field is above 100%.
    #[error("{field} = {value} bps exceeds {max} bps")]
    BpsOutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The configured value.
        value: u32,
        /// The largest permitted value.
        max: u32,
    },

    /// The redemption discount exceeds the maximum rate growth it is meant
    /// to offset.
    #[error("redemption discount {discount_bps} bps exceeds max daily growth {growth_bps} bps")]
    DiscountAboveGrowth {
        /// Configured discount.
        discount_bps: u32,
        /// Configured growth ceiling.
        growth_bps: u32,
    },
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// How the rolling daily window counts issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyLimitPolicy {
    /// Mints add, same-day burns subtract (saturating at zero).
    #[default]
    Net,
    /// Only mints count; burns never free up room.
    Gross,
}

/// What a deposit does when no shares can be issued at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroMintPolicy {
    /// Succeed, mint nothing, take nothing.
    #[default]
    Refund,
    /// Reject the deposit.
    Reject,
}

// ---------------------------------------------------------------------------
// Configuration Structs
// ---------------------------------------------------------------------------

/// Share Ledger parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Absolute ceiling on share supply.
    #[serde(with = "crate::types::decimal")]
    pub cap: Amount,
    /// Daily issuance limit, as a fraction of `cap`.
    pub daily_limit_bps: u32,
    /// Largest accepted rate increase per update.
    pub max_daily_growth_bps: u32,
    /// Minimum seconds between two accepted rate updates.
    pub rate_update_interval_secs: u64,
    /// Haircut on redemption value. Bounded by `max_daily_growth_bps`.
    pub redemption_discount_bps: u32,
    /// Net or gross daily issuance tracking.
    pub daily_limit_policy: DailyLimitPolicy,
    /// Behavior of a deposit that cannot mint anything.
    pub zero_mint_policy: ZeroMintPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cap: DEFAULT_CAP,
            daily_limit_bps: DEFAULT_DAILY_LIMIT_BPS,
            max_daily_growth_bps: DEFAULT_MAX_DAILY_GROWTH_BPS,
            rate_update_interval_secs: DEFAULT_RATE_UPDATE_INTERVAL_SECS,
            redemption_discount_bps: DEFAULT_REDEMPTION_DISCOUNT_BPS,
            daily_limit_policy: DailyLimitPolicy::default(),
            zero_mint_policy: ZeroMintPolicy::default(),
        }
    }
}

/// Liquidity Vault parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Fraction of outstanding share value held back from the restaker.
    pub fast_reserve_bps: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            fast_reserve_bps: DEFAULT_FAST_RESERVE_BPS,
        }
    }
}

/// Complete protocol configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Share Ledger section (`[ledger]`).
    pub ledger: LedgerConfig,
    /// Liquidity Vault section (`[vault]`).
    pub vault: VaultConfig,
}

impl ProtocolConfig {
    /// Parses a TOML document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed input and any
    /// validation error from [`validate`](Self::validate).
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Renders the configuration as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BpsOutOfRange`] for any fraction above 100%
    /// and [`ConfigError::DiscountAboveGrowth`] if the redemption discount
    /// exceeds the rate growth ceiling.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_bps("ledger.daily_limit_bps", self.ledger.daily_limit_bps)?;
        check_bps("ledger.max_daily_growth_bps", self.ledger.max_daily_growth_bps)?;
        check_bps(
            "ledger.redemption_discount_bps",
            self.ledger.redemption_discount_bps,
        )?;
        check_bps("vault.fast_reserve_bps", self.vault.fast_reserve_bps)?;

        if self.ledger.redemption_discount_bps > self.ledger.max_daily_growth_bps {
            return Err(ConfigError::DiscountAboveGrowth {
                discount_bps: self.ledger.redemption_discount_bps,
                growth_bps: self.ledger.max_daily_growth_bps,
            });
        }
        Ok(())
    }
}

fn check_bps(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if value > BPS_DENOMINATOR {
        return Err(ConfigError::BpsOutOfRange {
            field,
            value,
            max: BPS_DENOMINATOR,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ProtocolConfig::default().validate().unwrap();
    }

    #[test]
    fn rate_precision_matches_asset_decimals() {
        assert_eq!(RATE_PRECISION, ONE_ASSET);
        assert_eq!(INITIAL_RATE, RATE_PRECISION);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = ProtocolConfig::from_toml_str(
            r#"
            [ledger]
            cap = 1000
            daily_limit_policy = "gross"
            "#,
        )
        .unwrap();
        assert_eq!(config.ledger.cap, 1000);
        assert_eq!(config.ledger.daily_limit_policy, DailyLimitPolicy::Gross);
        assert_eq!(config.ledger.daily_limit_bps, DEFAULT_DAILY_LIMIT_BPS);
        assert_eq!(config.vault.fast_reserve_bps, DEFAULT_FAST_RESERVE_BPS);
    }

    #[test]
    fn bps_above_one_hundred_percent_rejected() {
        let result = ProtocolConfig::from_toml_str("[vault]\nfast_reserve_bps = 10001\n");
        assert!(matches!(result, Err(ConfigError::BpsOutOfRange { .. })));
    }

    #[test]
    fn discount_above_growth_rejected() {
        let mut config = ProtocolConfig::default();
        config.ledger.max_daily_growth_bps = 10;
        config.ledger.redemption_discount_bps = 20;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DiscountAboveGrowth { .. })
        ));
    }

    #[test]
    fn toml_round_trip_preserves_policies() {
        let mut config = ProtocolConfig::default();
        config.ledger.zero_mint_policy = ZeroMintPolicy::Reject;
        let rendered = config.to_toml_string().unwrap();
        let parsed = ProtocolConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
