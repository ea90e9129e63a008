//! # Error Taxonomy
//!
//! Every rejected operation falls into one of four classes. The class
//! decides what the pool does next: the first three are ordinary
//! rejections the caller may retry later, the fourth halts the pool.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use restake_protocol::access::AccessError;
use restake_protocol::config::ConfigError;
use restake_protocol::token::TokenError;

use crate::liquidity_vault::VaultError;
use crate::share_ledger::LedgerError;
use crate::withdrawal_queue::QueueError;

/// Category of a rejected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Paused, frozen, zero amount, unauthorized, unknown order.
    Precondition,
    /// Cap or daily limit reached, allowance or balance too small, rate
    /// out of bounds.
    Capacity,
    /// Not enough free asset right now. Retry once liquidity returns.
    Liquidity,
    /// The accounting itself is inconsistent. Fatal.
    Invariant,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Precondition => write!(f, "precondition"),
            ErrorClass::Capacity => write!(f, "capacity"),
            ErrorClass::Liquidity => write!(f, "liquidity"),
            ErrorClass::Invariant => write!(f, "invariant"),
        }
    }
}

/// Errors surfaced by [`crate::pool::RestakingPool`].
#[derive(Debug, Error)]
pub enum PoolError {
    /// An earlier invariant breach halted the pool.
    #[error("pool is halted after an invariant violation; an admin must resume it")]
    Halted,

    /// A cross-component consistency check failed after an operation.
    #[error("invariant violated: {detail}")]
    InvariantViolation {
        /// What did not add up.
        detail: String,
    },

    /// Share Ledger rejection.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Liquidity Vault rejection.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Withdrawal Queue rejection.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Role check failed.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Seeding the base-asset ledger failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PoolError {
    /// Where this failure sits in the error taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            PoolError::Halted | PoolError::Access(_) | PoolError::Config(_) => {
                ErrorClass::Precondition
            }
            PoolError::InvariantViolation { .. } => ErrorClass::Invariant,
            PoolError::Ledger(e) => e.class(),
            PoolError::Vault(e) => e.class(),
            PoolError::Queue(e) => e.class(),
            PoolError::Token(_) => ErrorClass::Capacity,
        }
    }

    /// `true` for failures that halt the pool.
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Invariant
    }
}
