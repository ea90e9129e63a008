//! # Restaking Pool
//!
//! The composition root. [`RestakingPool`] owns every piece of mutable
//! state (access control, base asset, ledger, vault, queue) and exposes
//! the public entry points as single atomic operations.
//!
//! ## Atomicity
//!
//! Each mutating call runs under a savepoint. The call's effects stay only
//! if it returns `Ok` **and** [`PoolState::check_invariants`] passes;
//! otherwise they are rolled back and the live state is exactly what it
//! was, so no partial effect of a failed operation is ever observable.
//!
//! The savepoint copies the vault and the role table, both a handful of
//! scalars. The share balances, asset balances, orders, tickets, and
//! allowances are journaled instead (see
//! [`restake_protocol::journal`]): only the entries a call writes are
//! recorded, so a call costs the same whatever the number of holders or
//! open orders.
//!
//! `&mut self` serializes callers: while an operation runs nothing else
//! can reach the pool, which is the reentrancy guard for the vault's
//! outbound transfers.
//!
//! ## Halting
//!
//! An invariant failure is a bug, not a user error. The offending call is
//! rolled back, the failure is logged at `error`, and the pool latches
//! `halted`. Every mutating entry point then returns
//! [`PoolError::Halted`] until an admin calls [`RestakingPool::resume`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use restake_protocol::access::{AccessControl, Role};
use restake_protocol::clock::Clock;
use restake_protocol::config::ProtocolConfig;
use restake_protocol::journal::Transactional;
use restake_protocol::pause::Pausable;
use restake_protocol::token::{AssetLedger, FungibleToken};
use restake_protocol::types::{Address, Amount};

use crate::error::PoolError;
use crate::liquidity_vault::{LiquidityVault, VaultStats};
use crate::share_ledger::{DepositOutcome, ShareLedger};
use crate::withdrawal_queue::{Order, OrderId, OrderStatus, WithdrawOutcome, WithdrawalQueue};

// ---------------------------------------------------------------------------
// Component Identities
// ---------------------------------------------------------------------------

/// Addresses the three components call each other by. Fixed at genesis;
/// the vault's address doubles as its base-asset account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentIds {
    /// Share Ledger.
    pub ledger: Address,
    /// Liquidity Vault.
    pub vault: Address,
    /// Withdrawal Queue.
    pub queue: Address,
}

impl Default for ComponentIds {
    fn default() -> Self {
        Self {
            ledger: Address::from("restake:share-ledger"),
            vault: Address::from("restake:liquidity-vault"),
            queue: Address::from("restake:withdrawal-queue"),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything the pool persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    /// Role membership.
    pub access: AccessControl,
    /// The base asset.
    pub asset: AssetLedger,
    /// Shares, rate, limits.
    pub ledger: ShareLedger,
    /// Asset custody.
    pub vault: LiquidityVault,
    /// Withdrawal orders.
    pub queue: WithdrawalQueue,
    /// Set by an invariant failure, cleared by `resume`.
    pub halted: bool,
}

impl PoolState {
    /// A fresh pool. `admin` is the genesis admin and initial restaker;
    /// `seed` funds base-asset accounts.
    pub fn genesis<I>(
        config: &ProtocolConfig,
        admin: Address,
        seed: I,
        now: DateTime<Utc>,
    ) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = (Address, Amount)>,
    {
        config.validate()?;
        let ids = ComponentIds::default();
        let mut access = AccessControl::new(admin.clone());
        access.bootstrap_role(Role::Restaker, admin);

        let state = Self {
            access,
            asset: AssetLedger::with_balances(seed)?,
            ledger: ShareLedger::new(&config.ledger, &ids, now),
            vault: LiquidityVault::new(&config.vault, &ids),
            queue: WithdrawalQueue::new(&ids),
            halted: false,
        };
        state.check_invariants()?;
        Ok(state)
    }

    /// Cross-component consistency:
    ///
    /// - `claim_reserve <= balance` (vault)
    /// - `total_released <= total_ordered` (queue)
    /// - `queued_claims == total_ordered - total_released`
    /// - the vault's bookkept balance equals its asset account
    pub fn check_invariants(&self) -> Result<(), PoolError> {
        self.vault.check_invariants()?;
        self.queue.check_invariants()?;

        let pending = self.queue.pending_amount();
        if self.vault.queued_claims() != pending {
            return Err(PoolError::InvariantViolation {
                detail: format!(
                    "vault queued claims {} != queue pending {}",
                    self.vault.queued_claims(),
                    pending
                ),
            });
        }
        let custody = self.asset.balance_of(self.vault.id());
        if custody != self.vault.balance() {
            return Err(PoolError::InvariantViolation {
                detail: format!(
                    "vault books {} but holds {}",
                    self.vault.balance(),
                    custody
                ),
            });
        }
        Ok(())
    }

    /// Opens a savepoint across every component.
    fn begin(&mut self) -> Savepoint {
        self.asset.begin();
        self.ledger.begin();
        self.queue.begin();
        Savepoint {
            access: self.access.clone(),
            vault: self.vault.clone(),
        }
    }

    fn commit(&mut self) {
        self.asset.commit();
        self.ledger.commit();
        self.queue.commit();
    }

    fn rollback(&mut self, saved: Savepoint) {
        self.asset.rollback();
        self.ledger.rollback();
        self.queue.rollback();
        self.access = saved.access;
        self.vault = saved.vault;
    }

    /// Read-only summary at `now`.
    pub fn status(&self, now: DateTime<Utc>) -> Result<PoolStatus, PoolError> {
        let total_shares = self.ledger.total_supply();
        let rate = self.ledger.rate();
        Ok(PoolStatus {
            total_shares,
            holders: self.ledger.holders(),
            cap: self.ledger.cap(),
            rate,
            last_rate_update: self.ledger.last_rate_update(),
            daily_limit: self.ledger.daily_limit()?,
            issued_today: self.ledger.issued_today(now),
            vault_balance: self.vault.balance(),
            claim_reserve: self.vault.claim_reserve(),
            queued_claims: self.vault.queued_claims(),
            fast_reserve: self.vault.fast_reserve(total_shares, rate)?,
            free_liquidity: self.vault.free_liquidity(),
            surplus: self.vault.surplus(total_shares, rate)?,
            total_ordered: self.queue.total_ordered(),
            total_released: self.queue.total_released(),
            open_orders: self.queue.open_orders(),
            next_order_id: self.queue.next_id(),
            average_processing_secs: self
                .queue
                .average_processing_time()
                .map(|d| d.num_seconds()),
            vault_stats: self.vault.stats(),
            paused: self.ledger.is_paused(),
            halted: self.halted,
        })
    }

    /// Balances and tickets of one account.
    pub fn account(&self, account: &Address) -> Result<AccountView, PoolError> {
        let shares = self.ledger.balance_of(account);
        Ok(AccountView {
            address: account.clone(),
            shares,
            share_value: self.ledger.convert_to_assets(shares)?,
            asset_balance: self.asset.balance_of(account),
            frozen: self.ledger.is_frozen(account),
            tickets: self.queue.tickets_of(account),
        })
    }

    /// Status and, if live, details of one order.
    pub fn order(&self, id: OrderId) -> OrderView {
        OrderView {
            id,
            status: self.queue.order_status(id),
            order: self.queue.order(id).cloned(),
            owner: self.queue.ticket_owner(id).cloned(),
        }
    }
}

/// The components small enough to copy whole for a savepoint.
struct Savepoint {
    access: AccessControl,
    vault: LiquidityVault,
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Pool-wide figures for dashboards and metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Shares outstanding.
    pub total_shares: Amount,
    /// Accounts holding shares.
    pub holders: usize,
    /// Maximum total shares.
    pub cap: Amount,
    /// Asset per share, scaled by `RATE_PRECISION`.
    pub rate: Amount,
    /// When `rate` last changed.
    pub last_rate_update: Option<DateTime<Utc>>,
    /// Shares that may be issued in one day.
    pub daily_limit: Amount,
    /// Shares counted against today's limit.
    pub issued_today: Amount,
    /// Asset held by the vault.
    pub vault_balance: Amount,
    /// Asset set aside for claimable orders.
    pub claim_reserve: Amount,
    /// Asset owed to orders not yet claimable.
    pub queued_claims: Amount,
    /// Liquidity kept back for instant withdrawals.
    pub fast_reserve: Amount,
    /// Vault balance minus the claim reserve.
    pub free_liquidity: Amount,
    /// Balance minus claims and the fast reserve. Negative while restaked.
    pub surplus: i128,
    /// Cumulative asset ever queued.
    pub total_ordered: Amount,
    /// Watermark: cumulative asset released to the queue.
    pub total_released: Amount,
    /// Orders not yet claimed.
    pub open_orders: usize,
    /// Id the next order will get.
    pub next_order_id: OrderId,
    /// Mean seconds from request to claim, if anything was claimed.
    pub average_processing_secs: Option<i64>,
    /// Cumulative vault flows.
    pub vault_stats: VaultStats,
    /// Deposits and withdrawals are suspended.
    pub paused: bool,
    /// Latched after an invariant breach until an admin resumes.
    pub halted: bool,
}

/// One account as seen by the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    /// The account.
    pub address: Address,
    /// Share balance.
    pub shares: Amount,
    /// `shares` at the current rate, before any redemption discount.
    pub share_value: Amount,
    /// Base-asset balance.
    pub asset_balance: Amount,
    /// Frozen accounts cannot move shares.
    pub frozen: bool,
    /// Unclaimed orders this account holds the ticket for.
    pub tickets: Vec<OrderId>,
}

/// One order as seen by the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    /// The id asked about.
    pub id: OrderId,
    /// `Unknown` for ids never issued.
    pub status: OrderStatus,
    /// The order, while it exists.
    pub order: Option<Order>,
    /// Current ticket holder.
    pub owner: Option<Address>,
}

// ---------------------------------------------------------------------------
// RestakingPool
// ---------------------------------------------------------------------------

/// Atomic, serialized access to the pool state.
pub struct RestakingPool {
    state: PoolState,
    clock: Arc<dyn Clock>,
}

impl RestakingPool {
    /// Builds a genesis pool. See [`PoolState::genesis`].
    pub fn new<I>(
        config: &ProtocolConfig,
        admin: Address,
        seed: I,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = (Address, Amount)>,
    {
        let state = PoolState::genesis(config, admin, seed, clock.now())?;
        Ok(Self { state, clock })
    }

    /// Resumes from a persisted state.
    pub fn from_state(state: PoolState, clock: Arc<dyn Clock>) -> Self {
        Self { state, clock }
    }

    /// The committed state.
    pub fn state(&self) -> &PoolState {
        &self.state
    }

    /// A copy of the committed state, for persistence.
    pub fn snapshot(&self) -> PoolState {
        self.state.clone()
    }

    /// The pool's current time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// `true` after an invariant failure until `resume`.
    pub fn is_halted(&self) -> bool {
        self.state.halted
    }

    /// Runs `op` under a savepoint and keeps its effects only if it
    /// succeeds and the invariants still hold.
    fn execute<T, F>(&mut self, name: &'static str, op: F) -> Result<T, PoolError>
    where
        F: FnOnce(&mut PoolState, DateTime<Utc>) -> Result<T, PoolError>,
    {
        if self.state.halted {
            warn!(op = name, "rejected, pool halted");
            return Err(PoolError::Halted);
        }
        let now = self.clock.now();
        let saved = self.state.begin();

        let result = match op(&mut self.state, now) {
            Ok(value) => self.state.check_invariants().map(|()| value),
            Err(e) => Err(e),
        };
        match result {
            Ok(value) => {
                self.state.commit();
                Ok(value)
            }
            Err(e) => {
                self.state.rollback(saved);
                if e.is_fatal() {
                    error!(op = name, error = %e, "invariant violated, pool halted");
                    self.state.halted = true;
                } else {
                    warn!(op = name, class = %e.class(), error = %e, "operation rejected");
                }
                Err(e)
            }
        }
    }

    // -- Views ----------------------------------------------------------------

    /// See [`PoolState::status`].
    pub fn status(&self) -> Result<PoolStatus, PoolError> {
        self.state.status(self.now())
    }

    /// See [`PoolState::account`].
    pub fn account(&self, account: &Address) -> Result<AccountView, PoolError> {
        self.state.account(account)
    }

    /// See [`PoolState::order`].
    pub fn order(&self, id: OrderId) -> OrderView {
        self.state.order(id)
    }

    /// Lifecycle of an order id.
    pub fn order_status(&self, id: OrderId) -> OrderStatus {
        self.state.queue.order_status(id)
    }

    /// What depositing `asset_in` right now would do.
    pub fn preview_deposit(&self, asset_in: Amount) -> Result<DepositOutcome, PoolError> {
        Ok(self.state.ledger.preview_deposit(asset_in, self.now())?)
    }

    /// Asset owed for redeeming `shares` right now.
    pub fn preview_withdraw(&self, shares: Amount) -> Result<Amount, PoolError> {
        Ok(self.state.ledger.preview_withdraw(shares)?)
    }

    /// Current vault surplus.
    pub fn surplus(&self) -> Result<i128, PoolError> {
        let s = &self.state;
        Ok(s.vault.surplus(s.ledger.total_supply(), s.ledger.rate())?)
    }

    // -- Users ----------------------------------------------------------------

    /// Deposits `asset_in` from `caller`, minting shares to `receiver`, then
    /// advances the queue with the new liquidity.
    pub fn deposit(
        &mut self,
        caller: &Address,
        asset_in: Amount,
        receiver: &Address,
    ) -> Result<DepositOutcome, PoolError> {
        self.execute("deposit", |s, now| {
            let outcome = s
                .ledger
                .deposit(caller, asset_in, receiver, now, &mut s.vault, &mut s.asset)?;
            s.queue.advance(&mut s.vault)?;
            Ok(outcome)
        })
    }

    /// Burns `shares` of `owner` for a withdrawal to `receiver`.
    pub fn request_withdraw(
        &mut self,
        caller: &Address,
        shares: Amount,
        receiver: &Address,
        owner: &Address,
    ) -> Result<WithdrawOutcome, PoolError> {
        self.execute("request_withdraw", |s, now| {
            Ok(s.queue.request_withdraw(
                caller,
                shares,
                receiver,
                owner,
                now,
                &mut s.ledger,
                &mut s.vault,
                &mut s.asset,
            )?)
        })
    }

    /// Claims a released ticket.
    pub fn claim(&mut self, caller: &Address, id: OrderId) -> Result<Amount, PoolError> {
        self.execute("claim", |s, now| {
            Ok(s.queue
                .claim(caller, id, now, &s.ledger, &mut s.vault, &mut s.asset)?)
        })
    }

    /// Sets how many of `caller`'s shares `spender` may withdraw.
    pub fn approve(
        &mut self,
        caller: &Address,
        spender: &Address,
        shares: Amount,
    ) -> Result<(), PoolError> {
        self.execute("approve", |s, _| {
            s.queue.approve(caller, spender, shares);
            Ok(())
        })
    }

    /// Moves a pending ticket to `to`.
    pub fn transfer_ticket(
        &mut self,
        caller: &Address,
        id: OrderId,
        to: &Address,
    ) -> Result<(), PoolError> {
        self.execute("transfer_ticket", |s, _| {
            Ok(s.queue.transfer_ticket(caller, id, to, &s.ledger)?)
        })
    }

    /// Moves shares between holders.
    pub fn transfer_shares(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), PoolError> {
        self.execute("transfer_shares", |s, _| {
            Ok(s.ledger.transfer(caller, to, amount)?)
        })
    }

    /// Advances the watermark with whatever liquidity is free.
    /// Permissionless; keepers call it on a timer.
    pub fn advance_queue(&mut self) -> Result<Amount, PoolError> {
        self.execute("advance_queue", |s, _| Ok(s.queue.advance(&mut s.vault)?))
    }

    // -- Rate source ----------------------------------------------------------

    /// Publishes a new rate.
    pub fn set_rate(&mut self, caller: &Address, rate: Amount) -> Result<(), PoolError> {
        self.execute("set_rate", |s, now| {
            Ok(s.ledger.set_rate(&s.access, caller, rate, now)?)
        })
    }

    /// Restarts the daily issuance window.
    pub fn reset_daily_counters(&mut self, caller: &Address) -> Result<(), PoolError> {
        self.execute("reset_daily_counters", |s, now| {
            Ok(s.ledger.reset_daily_counters(&s.access, caller, now)?)
        })
    }

    // -- Operator -------------------------------------------------------------

    /// Changes the share cap.
    pub fn set_cap(&mut self, caller: &Address, cap: Amount) -> Result<(), PoolError> {
        self.execute("set_cap", |s, _| Ok(s.ledger.set_cap(&s.access, caller, cap)?))
    }

    /// Changes the daily limit fraction.
    pub fn set_daily_limit_bps(&mut self, caller: &Address, bps: u32) -> Result<(), PoolError> {
        self.execute("set_daily_limit_bps", |s, _| {
            Ok(s.ledger.set_daily_limit_bps(&s.access, caller, bps)?)
        })
    }

    /// Changes the fast reserve fraction.
    pub fn set_fast_reserve_bps(&mut self, caller: &Address, bps: u32) -> Result<(), PoolError> {
        self.execute("set_fast_reserve_bps", |s, _| {
            Ok(s.vault.set_fast_reserve_bps(&s.access, caller, bps)?)
        })
    }

    // -- Compliance -----------------------------------------------------------

    /// Freezes `account`.
    pub fn freeze(&mut self, caller: &Address, account: &Address) -> Result<(), PoolError> {
        self.execute("freeze", |s, _| {
            Ok(s.ledger.freeze(&s.access, caller, account.clone())?)
        })
    }

    /// Unfreezes `account`.
    pub fn unfreeze(&mut self, caller: &Address, account: &Address) -> Result<(), PoolError> {
        self.execute("unfreeze", |s, _| {
            Ok(s.ledger.unfreeze(&s.access, caller, account)?)
        })
    }

    /// Burns every share of a frozen `account`.
    pub fn confiscate(&mut self, caller: &Address, account: &Address) -> Result<Amount, PoolError> {
        self.execute("confiscate", |s, _| {
            Ok(s.ledger.confiscate(&s.access, caller, account)?)
        })
    }

    // -- Pauser / admin -------------------------------------------------------

    /// Pauses deposits, withdrawal requests, and transfers.
    pub fn pause(&mut self, caller: &Address) -> Result<(), PoolError> {
        self.execute("pause", |s, now| {
            s.access.require(Role::Pauser, caller)?;
            s.ledger.pause(caller, now);
            Ok(())
        })
    }

    /// Lifts a pause.
    pub fn unpause(&mut self, caller: &Address) -> Result<(), PoolError> {
        self.execute("unpause", |s, now| {
            s.access.require(Role::Pauser, caller)?;
            s.ledger.unpause(caller, now);
            Ok(())
        })
    }

    /// Clears the halt latch after an invariant failure has been
    /// investigated. The only entry point that runs while halted.
    pub fn resume(&mut self, caller: &Address) -> Result<(), PoolError> {
        self.state.access.require(Role::Admin, caller)?;
        self.state.check_invariants()?;
        if self.state.halted {
            info!(admin = %caller, "pool resumed");
        }
        self.state.halted = false;
        Ok(())
    }

    // -- Restaker -------------------------------------------------------------

    /// Sends the current surplus to the calling restaker.
    pub fn withdraw_for_restaking(&mut self, caller: &Address) -> Result<Amount, PoolError> {
        self.execute("withdraw_for_restaking", |s, _| {
            let total_shares = s.ledger.total_supply();
            let rate = s.ledger.rate();
            Ok(s.vault
                .withdraw_for_restaking(&s.access, caller, total_shares, rate, &mut s.asset)?)
        })
    }

    /// Returns asset from the restaking venue, then advances the queue.
    pub fn deposit_from_restaker(&mut self, caller: &Address, amount: Amount) -> Result<(), PoolError> {
        self.execute("deposit_from_restaker", |s, _| {
            s.vault
                .deposit_from_restaker(&s.access, caller, amount, &mut s.asset)?;
            s.queue.advance(&mut s.vault)?;
            Ok(())
        })
    }

    // -- Roles ----------------------------------------------------------------

    /// Grants a low-privilege role.
    pub fn grant_role(&mut self, caller: &Address, role: Role, account: &Address) -> Result<(), PoolError> {
        self.execute("grant_role", |s, _| {
            s.access.grant_role(caller, role, account.clone())?;
            info!(admin = %caller, %role, %account, "role granted");
            Ok(())
        })
    }

    /// Revokes a role.
    pub fn revoke_role(&mut self, caller: &Address, role: Role, account: &Address) -> Result<(), PoolError> {
        self.execute("revoke_role", |s, _| {
            s.access.revoke_role(caller, role, account)?;
            info!(admin = %caller, %role, %account, "role revoked");
            Ok(())
        })
    }

    /// Proposes moving a high-privilege role.
    pub fn propose_rotation(
        &mut self,
        caller: &Address,
        role: Role,
        from: &Address,
        to: &Address,
    ) -> Result<(), PoolError> {
        self.execute("propose_rotation", |s, now| {
            s.access
                .propose_rotation(caller, role, from.clone(), to.clone(), now)?;
            info!(admin = %caller, %role, %from, %to, "rotation proposed");
            Ok(())
        })
    }

    /// Accepts a rotation addressed to `caller`.
    pub fn accept_rotation(&mut self, caller: &Address, role: Role) -> Result<(), PoolError> {
        self.execute("accept_rotation", |s, _| {
            s.access.accept_rotation(caller, role)?;
            info!(account = %caller, %role, "rotation accepted");
            Ok(())
        })
    }

    /// Withdraws a pending rotation.
    pub fn cancel_rotation(&mut self, caller: &Address, role: Role) -> Result<(), PoolError> {
        self.execute("cancel_rotation", |s, _| Ok(s.access.cancel_rotation(caller, role)?))
    }

    #[cfg(test)]
    pub(crate) fn state_mut_for_test(&mut self) -> &mut PoolState {
        &mut self.state
    }
}
