// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Restake Contracts
//!
//! The accounting core of the liquid-restaking pool. Every unit of value
//! moves through three components:
//!
//! - **Share Ledger**: share balances and supply, deposit and burn entry
//!   points, cap and daily-limit enforcement, freeze and pause gating.
//! - **Liquidity Vault**: custody of the base asset, split into claims
//!   owed, claims released, fast reserve, and surplus.
//! - **Withdrawal Queue**: FIFO orders with a cumulative watermark, so
//!   advancing the queue costs the same at any depth.
//!
//! [`pool::RestakingPool`] composes them and runs every public entry point
//! as one atomic operation.
//!
//! ## Design Principles
//!
//! 1. Components call each other by address, checked on every call. A
//!    user can never reach a component-only entry point.
//! 2. Every amount is `u128` and every product goes through 256-bit
//!    `mul_div`; rounding always favors the pool.
//! 3. A failed operation leaves no trace. An inconsistent one halts the pool.

pub mod error;
pub mod liquidity_vault;
pub mod pool;
pub mod share_ledger;
pub mod withdrawal_queue;

pub use error::{ErrorClass, PoolError};
pub use liquidity_vault::{LiquidityVault, VaultError, VaultStats};
pub use pool::{AccountView, ComponentIds, OrderView, PoolState, PoolStatus, RestakingPool};
pub use share_ledger::{DepositOutcome, LedgerError, ShareLedger};
pub use withdrawal_queue::{
    Order, OrderId, OrderStatus, QueueError, WithdrawOutcome, WithdrawalQueue,
};
