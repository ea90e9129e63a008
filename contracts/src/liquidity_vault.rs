//! # Liquidity Vault
//!
//! Custody of the base asset, split into what is owed and what is free.
//!
//! ## Buckets
//!
//! ```text
//!   balance ─┬─ claim_reserve   released by the queue, not yet paid out
//!            ├─ queued_claims   burned and owed, waiting for the watermark
//!            ├─ fast_reserve    kept liquid for instant exits (derived)
//!            └─ surplus         may go to the restaking venue (signed)
//! ```
//!
//! A burn records its asset value in `queued_claims`. When the queue
//! advances its watermark it moves the released amount into
//! `claim_reserve`, and a claim pays out of `claim_reserve`. The vault
//! therefore always satisfies:
//!
//! - `claim_reserve <= balance`
//! - `queued_claims == total_ordered - total_released`
//! - `surplus = balance - claim_reserve - fast_reserve - queued_claims`
//!
//! Free liquidity for the queue is `balance - claim_reserve`. Queued
//! claims are deliberately not subtracted there: they are exactly what
//! free liquidity is for.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use restake_protocol::access::{AccessControl, AccessError, Role};
use restake_protocol::config::{VaultConfig, BPS_DENOMINATOR};
use restake_protocol::math::{self, MathError};
use restake_protocol::token::{AssetLedger, FungibleToken, TokenError};
use restake_protocol::types::{Address, Amount};

use crate::error::ErrorClass;
use crate::pool::ComponentIds;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from vault operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VaultError {
    /// A component-only entry point was called by someone else.
    #[error("caller {caller} is not {expected}")]
    UnauthorizedComponent {
        /// Who called.
        caller: Address,
        /// The only permitted caller.
        expected: Address,
    },

    /// Role check failed.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// A zero amount was supplied.
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// Nothing may leave for the restaking venue.
    #[error("no surplus to withdraw (surplus = {surplus})")]
    NoSurplus {
        /// The current, non-positive surplus.
        surplus: i128,
    },

    /// A release asked for more than the queue has been given.
    #[error("release of {amount} exceeds claim reserve {claim_reserve}")]
    ReleaseExceedsReserve {
        /// Requested payout.
        amount: Amount,
        /// Released, unpaid obligations.
        claim_reserve: Amount,
    },

    /// The queue tried to fund more than is owed.
    #[error("funding {amount} exceeds queued claims {queued}")]
    FundingExceedsQueued {
        /// Requested funding.
        amount: Amount,
        /// Outstanding queued claims.
        queued: Amount,
    },

    /// The queue tried to fund more than is free.
    #[error("funding {amount} exceeds free liquidity {free}")]
    FundingExceedsFree {
        /// Requested funding.
        amount: Amount,
        /// `balance - claim_reserve`.
        free: Amount,
    },

    /// The reserve grew past the balance.
    #[error("claim reserve {claim_reserve} exceeds balance {balance}")]
    ReserveExceedsBalance {
        /// Released, unpaid obligations.
        claim_reserve: Amount,
        /// Asset held.
        balance: Amount,
    },

    /// A base-asset transfer failed.
    #[error("asset transfer: {0}")]
    Transfer(TokenError),

    /// A basis-point setting above 100%.
    #[error("{value} bps exceeds {max} bps")]
    BpsOutOfRange {
        /// The rejected value.
        value: u32,
        /// The largest accepted value.
        max: u32,
    },

    /// Fixed-point arithmetic failed.
    #[error(transparent)]
    Math(#[from] MathError),
}

impl VaultError {
    /// Where this failure sits in the error taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            VaultError::UnauthorizedComponent { .. }
            | VaultError::Access(_)
            | VaultError::ZeroAmount
            | VaultError::BpsOutOfRange { .. } => ErrorClass::Precondition,
            VaultError::Math(_) => ErrorClass::Capacity,
            VaultError::NoSurplus { .. } | VaultError::Transfer(_) => ErrorClass::Liquidity,
            VaultError::ReleaseExceedsReserve { .. }
            | VaultError::FundingExceedsQueued { .. }
            | VaultError::FundingExceedsFree { .. }
            | VaultError::ReserveExceedsBalance { .. } => ErrorClass::Invariant,
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Cumulative flows through the vault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStats {
    /// Asset forwarded by the ledger on deposit.
    pub from_ledger: Amount,
    /// Asset returned by the restaker.
    pub from_restaker: Amount,
    /// Asset sent to the restaker.
    pub to_restaker: Amount,
    /// Claims paid in the same call that requested them.
    pub paid_instant: Amount,
    /// Claims paid from a ticket.
    pub paid_queued: Amount,
}

/// The base-asset custodian.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityVault {
    id: Address,
    ledger: Address,
    queue: Address,
    balance: Amount,
    claim_reserve: Amount,
    queued_claims: Amount,
    fast_reserve_bps: u32,
    stats: VaultStats,
}

impl LiquidityVault {
    /// Creates an empty vault.
    pub fn new(config: &VaultConfig, ids: &ComponentIds) -> Self {
        Self {
            id: ids.vault.clone(),
            ledger: ids.ledger.clone(),
            queue: ids.queue.clone(),
            balance: 0,
            claim_reserve: 0,
            queued_claims: 0,
            fast_reserve_bps: config.fast_reserve_bps,
            stats: VaultStats::default(),
        }
    }

    /// This component's identity, which is also its asset account.
    pub fn id(&self) -> &Address {
        &self.id
    }

    /// Asset held.
    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Released obligations not yet paid.
    pub fn claim_reserve(&self) -> Amount {
        self.claim_reserve
    }

    /// Burned obligations the queue has not released yet.
    pub fn queued_claims(&self) -> Amount {
        self.queued_claims
    }

    /// Fast reserve fraction in basis points.
    pub fn fast_reserve_bps(&self) -> u32 {
        self.fast_reserve_bps
    }

    /// Cumulative flow counters.
    pub fn stats(&self) -> VaultStats {
        self.stats
    }

    /// `balance - claim_reserve`: what the queue may release against.
    pub fn free_liquidity(&self) -> Amount {
        self.balance.saturating_sub(self.claim_reserve)
    }

    /// Asset kept back for instant exits: `fast_reserve_bps` of the asset
    /// value of all outstanding shares.
    pub fn fast_reserve(&self, total_shares: Amount, rate: Amount) -> Result<Amount, VaultError> {
        let backing = math::shares_to_assets(total_shares, rate)?;
        Ok(math::apply_bps(backing, self.fast_reserve_bps)?)
    }

    /// `balance - claim_reserve - fast_reserve - queued_claims`, signed.
    pub fn surplus(&self, total_shares: Amount, rate: Amount) -> Result<i128, VaultError> {
        let fast = self.fast_reserve(total_shares, rate)?;
        let mut surplus = math::to_signed(self.balance)?;
        for owed in [self.claim_reserve, fast, self.queued_claims] {
            surplus = surplus
                .checked_sub(math::to_signed(owed)?)
                .ok_or(MathError::OutOfRange)?;
        }
        Ok(surplus)
    }

    /// Checks `claim_reserve <= balance`.
    pub fn check_invariants(&self) -> Result<(), VaultError> {
        if self.claim_reserve > self.balance {
            error!(
                claim_reserve = self.claim_reserve,
                balance = self.balance,
                "vault reserve exceeds balance"
            );
            return Err(VaultError::ReserveExceedsBalance {
                claim_reserve: self.claim_reserve,
                balance: self.balance,
            });
        }
        Ok(())
    }

    // -- Ledger ---------------------------------------------------------------

    /// Books asset the ledger already moved into the vault's account.
    pub fn deposit_from_ledger(&mut self, caller: &Address, amount: Amount) -> Result<(), VaultError> {
        self.only(caller, &self.ledger)?;
        self.balance = math::add(self.balance, amount)?;
        self.stats.from_ledger = self.stats.from_ledger.saturating_add(amount);
        Ok(())
    }

    /// Records an obligation created by a burn. No asset moves.
    pub fn reserve_for_claims(&mut self, caller: &Address, amount: Amount) -> Result<(), VaultError> {
        self.only(caller, &self.ledger)?;
        self.queued_claims = math::add(self.queued_claims, amount)?;
        Ok(())
    }

    // -- Queue ----------------------------------------------------------------

    /// Moves `amount` of queued claims into the claim reserve when the
    /// queue advances its watermark.
    pub fn fund_claims(&mut self, caller: &Address, amount: Amount) -> Result<(), VaultError> {
        self.only(caller, &self.queue)?;
        if amount > self.queued_claims {
            return Err(VaultError::FundingExceedsQueued {
                amount,
                queued: self.queued_claims,
            });
        }
        let free = self.free_liquidity();
        if amount > free {
            return Err(VaultError::FundingExceedsFree { amount, free });
        }
        self.queued_claims -= amount;
        self.claim_reserve += amount;
        Ok(())
    }

    /// Pays a released claim to `recipient`.
    ///
    /// Reserve and balance are decremented before the transfer; a failed
    /// transfer is rolled back by the enclosing pool operation.
    ///
    /// # Errors
    ///
    /// [`VaultError::ReleaseExceedsReserve`] is an invariant breach: the
    /// queue released more than it funded.
    pub fn release_claim(
        &mut self,
        caller: &Address,
        recipient: &Address,
        amount: Amount,
        instant: bool,
        asset: &mut AssetLedger,
    ) -> Result<(), VaultError> {
        self.only(caller, &self.queue)?;
        if amount > self.claim_reserve {
            error!(amount, claim_reserve = self.claim_reserve, "release exceeds reserve");
            return Err(VaultError::ReleaseExceedsReserve {
                amount,
                claim_reserve: self.claim_reserve,
            });
        }
        self.claim_reserve -= amount;
        self.balance = math::sub(self.balance, amount)?;
        if instant {
            self.stats.paid_instant = self.stats.paid_instant.saturating_add(amount);
        } else {
            self.stats.paid_queued = self.stats.paid_queued.saturating_add(amount);
        }

        asset
            .transfer(&self.id, recipient, amount)
            .map_err(VaultError::Transfer)?;
        info!(%recipient, amount, instant, "claim released");
        Ok(())
    }

    // -- Restaker -------------------------------------------------------------

    /// Sends the whole current surplus to the calling restaker.
    ///
    /// # Errors
    ///
    /// [`VaultError::NoSurplus`] when the surplus is zero or negative.
    pub fn withdraw_for_restaking(
        &mut self,
        access: &AccessControl,
        caller: &Address,
        total_shares: Amount,
        rate: Amount,
        asset: &mut AssetLedger,
    ) -> Result<Amount, VaultError> {
        access.require(Role::Restaker, caller)?;
        let surplus = self.surplus(total_shares, rate)?;
        if surplus <= 0 {
            return Err(VaultError::NoSurplus { surplus });
        }
        let amount = surplus.unsigned_abs();
        self.balance = math::sub(self.balance, amount)?;
        self.stats.to_restaker = self.stats.to_restaker.saturating_add(amount);

        asset
            .transfer(&self.id, caller, amount)
            .map_err(VaultError::Transfer)?;
        info!(restaker = %caller, amount, "surplus sent for restaking");
        Ok(amount)
    }

    /// Takes `amount` back from the calling restaker.
    pub fn deposit_from_restaker(
        &mut self,
        access: &AccessControl,
        caller: &Address,
        amount: Amount,
        asset: &mut AssetLedger,
    ) -> Result<(), VaultError> {
        access.require(Role::Restaker, caller)?;
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }
        asset
            .transfer(caller, &self.id, amount)
            .map_err(VaultError::Transfer)?;
        self.balance = math::add(self.balance, amount)?;
        self.stats.from_restaker = self.stats.from_restaker.saturating_add(amount);
        info!(restaker = %caller, amount, "liquidity returned from restaking");
        Ok(())
    }

    // -- Operator -------------------------------------------------------------

    /// Changes the fast reserve fraction.
    pub fn set_fast_reserve_bps(
        &mut self,
        access: &AccessControl,
        caller: &Address,
        bps: u32,
    ) -> Result<(), VaultError> {
        access.require(Role::Operator, caller)?;
        if bps > BPS_DENOMINATOR {
            return Err(VaultError::BpsOutOfRange {
                value: bps,
                max: BPS_DENOMINATOR,
            });
        }
        info!(previous = self.fast_reserve_bps, bps, "fast reserve changed");
        self.fast_reserve_bps = bps;
        Ok(())
    }

    fn only(&self, caller: &Address, expected: &Address) -> Result<(), VaultError> {
        if caller == expected {
            Ok(())
        } else {
            Err(VaultError::UnauthorizedComponent {
                caller: caller.clone(),
                expected: expected.clone(),
            })
        }
    }
}
