// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Restake Protocol: Core Primitives
//!
//! Everything the accounting contracts need but that is not itself a
//! contract: numbers, identities, permissions, time, and persistence.
//!
//! The contracts crate composes these into the Share Ledger, Liquidity
//! Vault and Withdrawal Queue. Nothing in here knows what a withdrawal
//! ticket is.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants and the serde-loadable `ProtocolConfig`.
//! - **math**: 256-bit intermediate `mul_div`, basis points, rate conversion.
//! - **types**: `Address` and the `Amount` alias.
//! - **token**: The `FungibleToken` capability and the base-asset ledger.
//! - **pause**: The `Pausable` capability.
//! - **access**: Role sets with two-phase rotation for high-privilege roles.
//! - **clock**: Wall-clock abstraction so tests can move time by hand.
//! - **journal**: Maps and sets with savepoint rollback for atomic operations.
//! - **storage**: Snapshot persistence over sled.
//!
//! ## Design Philosophy
//!
//! 1. Amounts are `u128` wei. No floats touch money, ever.
//! 2. Every multiplication that can overflow goes through [`math::mul_div`].
//! 3. Errors are typed per module and carry the numbers that caused them.

pub mod access;
pub mod clock;
pub mod config;
pub mod journal;
pub mod math;
pub mod pause;
pub mod storage;
pub mod token;
pub mod types;

pub use access::{AccessControl, AccessError, Role};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, LedgerConfig, ProtocolConfig, VaultConfig};
pub use journal::{JournaledMap, JournaledSet, Transactional};
pub use math::MathError;
pub use pause::{Pausable, PauseState};
pub use storage::{SnapshotStore, StoreError};
pub use token::{AssetLedger, Balances, FungibleToken, TokenError};
pub use types::{Address, Amount};
