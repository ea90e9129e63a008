//! # Withdrawal Queue
//!
//! Turns burned shares into FIFO withdrawal orders and settles them as
//! liquidity arrives.
//!
//! ## Watermark
//!
//! Every order records its **cumulative position**: the running total of
//! asset ordered up to and including itself. The queue keeps two
//! monotonic totals:
//!
//! ```text
//!   total_released            total_ordered
//!         │                         │
//!   ──────┼─────────────────────────┼──────►  cumulative asset
//!   claimable                pending
//! ```
//!
//! An order is claimable iff `cumulative <= total_released`. Advancing
//! the queue is one subtraction and one `min`; it never walks orders, so
//! its cost does not depend on queue depth. Which orders became claimable
//! is decided lazily, at claim time, by that single comparison.
//!
//! Order ids are a plain sequence. Positions have gaps equal to each
//! order's size and must not be treated as ids.
//!
//! ## Tickets
//!
//! A pending order is owned through a transferable ticket. Claiming burns
//! the ticket and deletes the order. A deleted order is recognisable as
//! claimed because its id is below `next_id`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info};

use restake_protocol::journal::{JournaledMap, Transactional};
use restake_protocol::math::{self, MathError};
use restake_protocol::pause::Pausable;
use restake_protocol::token::AssetLedger;
use restake_protocol::types::{Address, Amount};

use crate::error::ErrorClass;
use crate::liquidity_vault::{LiquidityVault, VaultError};
use crate::pool::ComponentIds;
use crate::share_ledger::{LedgerError, ShareLedger};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from queue operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueueError {
    /// The share ledger is paused.
    #[error("withdrawals are paused")]
    Paused,

    /// The account is frozen by compliance.
    #[error("account {account} is frozen")]
    Frozen {
        /// The frozen account.
        account: Address,
    },

    /// A zero amount was supplied.
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// A delegated withdrawal exceeds the owner's approval.
    #[error("insufficient allowance: {spender} may withdraw {allowance} of {owner}'s shares, needs {needed}")]
    InsufficientAllowance {
        /// Share owner.
        owner: Address,
        /// Caller acting for the owner.
        spender: Address,
        /// Current approval.
        allowance: Amount,
        /// Shares requested.
        needed: Amount,
    },

    /// No order with this id was ever created.
    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    /// The order was already settled.
    #[error("order {0} already claimed")]
    AlreadyClaimed(OrderId),

    /// The caller does not hold the ticket.
    #[error("order {id} belongs to {owner}, not {caller}")]
    NotTicketOwner {
        /// The order.
        id: OrderId,
        /// Current ticket holder.
        owner: Address,
        /// Who tried to use it.
        caller: Address,
    },

    /// The watermark has not reached the order yet.
    #[error("order {id} at position {position} not claimable, released {released}")]
    NotYetClaimable {
        /// The order.
        id: OrderId,
        /// Its cumulative position.
        position: Amount,
        /// Current watermark.
        released: Amount,
    },

    /// The watermark passed the ordered total.
    #[error("released {released} exceeds ordered {ordered}")]
    ReleasedExceedsOrdered {
        /// Watermark.
        released: Amount,
        /// Ordered total.
        ordered: Amount,
    },

    /// The share ledger rejected the burn.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The vault rejected funding or release.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Fixed-point arithmetic failed.
    #[error(transparent)]
    Math(#[from] MathError),
}

impl QueueError {
    /// Where this failure sits in the error taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            QueueError::Paused
            | QueueError::Frozen { .. }
            | QueueError::ZeroAmount
            | QueueError::UnknownOrder(_)
            | QueueError::AlreadyClaimed(_)
            | QueueError::NotTicketOwner { .. } => ErrorClass::Precondition,
            QueueError::InsufficientAllowance { .. } | QueueError::Math(_) => ErrorClass::Capacity,
            QueueError::NotYetClaimable { .. } => ErrorClass::Liquidity,
            QueueError::ReleasedExceedsOrdered { .. } => ErrorClass::Invariant,
            QueueError::Ledger(e) => e.class(),
            QueueError::Vault(e) => e.class(),
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Sequence number of a withdrawal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A pending withdrawal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Sequence id.
    pub id: OrderId,
    /// Asset owed on claim.
    pub amount_owed: Amount,
    /// Running total of asset ordered through this order.
    pub cumulative: Amount,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

/// What `request_withdraw` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WithdrawOutcome {
    /// Liquidity was available; the asset was paid in the same call.
    Claimed {
        /// Id consumed by the order.
        order_id: OrderId,
        /// Asset paid.
        amount: Amount,
    },
    /// A ticket was issued to the receiver.
    Queued {
        /// Id of the ticket.
        order_id: OrderId,
        /// Asset owed on claim.
        amount: Amount,
        /// Cumulative position the watermark must reach.
        position: Amount,
    },
}

impl WithdrawOutcome {
    /// The order id, whichever way it settled.
    pub fn order_id(&self) -> OrderId {
        match self {
            WithdrawOutcome::Claimed { order_id, .. } | WithdrawOutcome::Queued { order_id, .. } => {
                *order_id
            }
        }
    }

    /// Asset owed or paid.
    pub fn amount(&self) -> Amount {
        match self {
            WithdrawOutcome::Claimed { amount, .. } | WithdrawOutcome::Queued { amount, .. } => {
                *amount
            }
        }
    }
}

/// Lifecycle position of an order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Waiting for the watermark.
    Pending,
    /// Watermark passed; the ticket holder may claim.
    Claimable,
    /// Settled and deleted.
    Claimed,
    /// Never issued.
    Unknown,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Claimable => write!(f, "Claimable"),
            OrderStatus::Claimed => write!(f, "Claimed"),
            OrderStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// WithdrawalQueue
// ---------------------------------------------------------------------------

/// FIFO queue of withdrawal orders with a cumulative watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalQueue {
    id: Address,
    next_id: u64,
    total_ordered: Amount,
    total_released: Amount,
    orders: JournaledMap<OrderId, Order>,
    tickets: JournaledMap<OrderId, Address>,
    allowances: JournaledMap<Address, BTreeMap<Address, Amount>>,
    total_processing_secs: u64,
    settled_from_queue: u64,
    #[serde(skip)]
    saved: Option<QueueSavepoint>,
}

/// The counters of a [`WithdrawalQueue`], held while a savepoint is open.
#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueSavepoint {
    next_id: u64,
    total_ordered: Amount,
    total_released: Amount,
    total_processing_secs: u64,
    settled_from_queue: u64,
}

impl WithdrawalQueue {
    /// Creates an empty queue.
    pub fn new(ids: &ComponentIds) -> Self {
        Self {
            id: ids.queue.clone(),
            next_id: 0,
            total_ordered: 0,
            total_released: 0,
            orders: JournaledMap::new(),
            tickets: JournaledMap::new(),
            allowances: JournaledMap::new(),
            total_processing_secs: 0,
            settled_from_queue: 0,
            saved: None,
        }
    }

    // -- Views ----------------------------------------------------------------

    /// This component's identity.
    pub fn id(&self) -> &Address {
        &self.id
    }

    /// Running sum of every amount ever ordered.
    pub fn total_ordered(&self) -> Amount {
        self.total_ordered
    }

    /// The watermark.
    pub fn total_released(&self) -> Amount {
        self.total_released
    }

    /// `total_ordered - total_released`.
    pub fn pending_amount(&self) -> Amount {
        self.total_ordered.saturating_sub(self.total_released)
    }

    /// Number of orders with a live ticket.
    pub fn open_orders(&self) -> usize {
        self.orders.len()
    }

    /// Id the next order will get.
    pub fn next_id(&self) -> OrderId {
        OrderId(self.next_id)
    }

    /// A live order.
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Holder of the ticket for `id`.
    pub fn ticket_owner(&self, id: OrderId) -> Option<&Address> {
        self.tickets.get(&id)
    }

    /// Where `id` is in its lifecycle. O(log n) in live orders.
    pub fn order_status(&self, id: OrderId) -> OrderStatus {
        match self.orders.get(&id) {
            Some(order) if order.cumulative <= self.total_released => OrderStatus::Claimable,
            Some(_) => OrderStatus::Pending,
            None if id.0 < self.next_id => OrderStatus::Claimed,
            None => OrderStatus::Unknown,
        }
    }

    /// Ids of every ticket `owner` holds, oldest first.
    pub fn tickets_of(&self, owner: &Address) -> Vec<OrderId> {
        self.tickets
            .iter()
            .filter(|(_, holder)| *holder == owner)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Shares `spender` may withdraw on behalf of `owner`.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Mean wait between request and claim for ticketed orders.
    pub fn average_processing_time(&self) -> Option<Duration> {
        if self.settled_from_queue == 0 {
            return None;
        }
        let avg = self.total_processing_secs / self.settled_from_queue;
        Some(Duration::seconds(i64::try_from(avg).unwrap_or(i64::MAX / 1_000)))
    }

    /// Checks `total_released <= total_ordered`.
    pub fn check_invariants(&self) -> Result<(), QueueError> {
        if self.total_released > self.total_ordered {
            error!(
                released = self.total_released,
                ordered = self.total_ordered,
                "watermark passed ordered total"
            );
            return Err(QueueError::ReleasedExceedsOrdered {
                released: self.total_released,
                ordered: self.total_ordered,
            });
        }
        Ok(())
    }

    // -- Allowances -----------------------------------------------------------

    /// Lets `spender` request withdrawals of up to `shares` of the caller's
    /// shares. Overwrites any previous approval.
    pub fn approve(&mut self, owner: &Address, spender: &Address, shares: Amount) {
        let mut approvals = self.allowances.get(owner).cloned().unwrap_or_default();
        if shares == 0 {
            approvals.remove(spender);
        } else {
            approvals.insert(spender.clone(), shares);
        }
        if approvals.is_empty() {
            self.allowances.remove(owner);
        } else {
            self.allowances.insert(owner.clone(), approvals);
        }
        info!(%owner, %spender, shares, "withdrawal allowance set");
    }

    fn spend_allowance(&mut self, owner: &Address, spender: &Address, shares: Amount) -> Result<(), QueueError> {
        let allowance = self.allowance(owner, spender);
        if allowance < shares {
            return Err(QueueError::InsufficientAllowance {
                owner: owner.clone(),
                spender: spender.clone(),
                allowance,
                needed: shares,
            });
        }
        self.approve(owner, spender, allowance - shares);
        Ok(())
    }

    // -- Entry points ---------------------------------------------------------

    /// Burns `shares` of `owner` and either pays `receiver` at once or
    /// issues them a ticket.
    ///
    /// When `caller != owner` the caller's allowance is consumed first.
    ///
    /// # Errors
    ///
    /// Precondition failures ([`QueueError::Paused`], [`QueueError::Frozen`],
    /// [`QueueError::ZeroAmount`]), [`QueueError::InsufficientAllowance`],
    /// and anything the ledger or vault reject.
    #[allow(clippy::too_many_arguments)]
    pub fn request_withdraw(
        &mut self,
        caller: &Address,
        shares: Amount,
        receiver: &Address,
        owner: &Address,
        now: DateTime<Utc>,
        ledger: &mut ShareLedger,
        vault: &mut LiquidityVault,
        asset: &mut AssetLedger,
    ) -> Result<WithdrawOutcome, QueueError> {
        ensure_active(ledger, &[caller, owner, receiver])?;
        if shares == 0 {
            return Err(QueueError::ZeroAmount);
        }
        if caller != owner {
            self.spend_allowance(owner, caller, shares)?;
        }

        let owed = ledger.burn_for_withdrawal(&self.id, shares, receiver, owner, now, vault)?;
        let cumulative = math::add(self.total_ordered, owed)?;
        self.total_ordered = cumulative;
        let order_id = OrderId(self.next_id);
        self.next_id += 1;

        self.advance(vault)?;

        if cumulative <= self.total_released {
            vault.release_claim(&self.id, receiver, owed, true, asset)?;
            info!(%receiver, id = %order_id, amount = owed, "withdrawal settled instantly");
            return Ok(WithdrawOutcome::Claimed {
                order_id,
                amount: owed,
            });
        }

        self.orders.insert(
            order_id,
            Order {
                id: order_id,
                amount_owed: owed,
                cumulative,
                created_at: now,
            },
        );
        self.tickets.insert(order_id, receiver.clone());
        info!(%receiver, id = %order_id, amount = owed, position = cumulative, "withdrawal queued");
        Ok(WithdrawOutcome::Queued {
            order_id,
            amount: owed,
            position: cumulative,
        })
    }

    /// Pays a claimable order to its ticket holder and burns the ticket.
    ///
    /// Claims are not gated by pause: the asset is already earmarked.
    pub fn claim(
        &mut self,
        caller: &Address,
        id: OrderId,
        now: DateTime<Utc>,
        ledger: &ShareLedger,
        vault: &mut LiquidityVault,
        asset: &mut AssetLedger,
    ) -> Result<Amount, QueueError> {
        let order = self.live_order(id, caller)?;
        if ledger.is_frozen(caller) {
            return Err(QueueError::Frozen {
                account: caller.clone(),
            });
        }
        if order.cumulative > self.total_released {
            return Err(QueueError::NotYetClaimable {
                id,
                position: order.cumulative,
                released: self.total_released,
            });
        }
        let amount = order.amount_owed;
        let waited = (now - order.created_at).num_seconds().max(0).unsigned_abs();

        self.orders.remove(&id);
        self.tickets.remove(&id);
        self.total_processing_secs = self.total_processing_secs.saturating_add(waited);
        self.settled_from_queue += 1;

        vault.release_claim(&self.id, caller, amount, false, asset)?;
        info!(claimant = %caller, %id, amount, waited_secs = waited, "ticket claimed");
        Ok(amount)
    }

    /// Moves the watermark forward by as much free vault liquidity as
    /// there is pending demand. Returns the amount released.
    ///
    /// Permissionless and O(1): no order is visited.
    pub fn advance(&mut self, vault: &mut LiquidityVault) -> Result<Amount, QueueError> {
        self.check_invariants()?;
        let pending = self.total_ordered - self.total_released;
        let to_release = vault.free_liquidity().min(pending);
        if to_release == 0 {
            return Ok(0);
        }
        vault.fund_claims(&self.id, to_release)?;
        self.total_released += to_release;
        debug!(
            released = to_release,
            watermark = self.total_released,
            ordered = self.total_ordered,
            "queue advanced"
        );
        Ok(to_release)
    }

    /// Hands the ticket for `id` to `to`.
    pub fn transfer_ticket(
        &mut self,
        caller: &Address,
        id: OrderId,
        to: &Address,
        ledger: &ShareLedger,
    ) -> Result<(), QueueError> {
        ensure_active(ledger, &[caller, to])?;
        self.live_order(id, caller)?;
        self.tickets.insert(id, to.clone());
        info!(from = %caller, %to, %id, "ticket transferred");
        Ok(())
    }

    /// Returns the order if it is live and `caller` holds its ticket.
    fn live_order(&self, id: OrderId, caller: &Address) -> Result<Order, QueueError> {
        let Some(order) = self.orders.get(&id) else {
            return Err(if id.0 < self.next_id {
                QueueError::AlreadyClaimed(id)
            } else {
                QueueError::UnknownOrder(id)
            });
        };
        match self.tickets.get(&id) {
            Some(owner) if owner == caller => Ok(order.clone()),
            Some(owner) => Err(QueueError::NotTicketOwner {
                id,
                owner: owner.clone(),
                caller: caller.clone(),
            }),
            None => Err(QueueError::UnknownOrder(id)),
        }
    }
}

impl Transactional for WithdrawalQueue {
    fn begin(&mut self) {
        self.orders.begin();
        self.tickets.begin();
        self.allowances.begin();
        self.saved = Some(QueueSavepoint {
            next_id: self.next_id,
            total_ordered: self.total_ordered,
            total_released: self.total_released,
            total_processing_secs: self.total_processing_secs,
            settled_from_queue: self.settled_from_queue,
        });
    }

    fn commit(&mut self) {
        self.orders.commit();
        self.tickets.commit();
        self.allowances.commit();
        self.saved = None;
    }

    fn rollback(&mut self) {
        self.orders.rollback();
        self.tickets.rollback();
        self.allowances.rollback();
        if let Some(saved) = self.saved.take() {
            self.next_id = saved.next_id;
            self.total_ordered = saved.total_ordered;
            self.total_released = saved.total_released;
            self.total_processing_secs = saved.total_processing_secs;
            self.settled_from_queue = saved.settled_from_queue;
        }
    }
}

fn ensure_active(ledger: &ShareLedger, accounts: &[&Address]) -> Result<(), QueueError> {
    if ledger.is_paused() {
        return Err(QueueError::Paused);
    }
    if let Some(account) = accounts.iter().find(|a| ledger.is_frozen(a)) {
        return Err(QueueError::Frozen {
            account: (*account).clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use restake_protocol::access::{AccessControl, Role};
    use restake_protocol::config::{ProtocolConfig, RATE_PRECISION};
    use restake_protocol::token::FungibleToken;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn addr(s: &str) -> Address {
        Address::from(s)
    }

    struct World {
        access: AccessControl,
        ledger: ShareLedger,
        vault: LiquidityVault,
        queue: WithdrawalQueue,
        asset: AssetLedger,
    }

    /// Alice holds `shares` at 1:1; everything she paid has gone to the
    /// restaker, so the vault starts empty.
    fn world(shares: Amount) -> World {
        let mut config = ProtocolConfig::default();
        config.ledger.cap = 1_000_000;
        config.ledger.daily_limit_bps = 10_000;
        config.vault.fast_reserve_bps = 0;
        let ids = ComponentIds::default();
        let mut access = AccessControl::new(addr("admin"));
        access.bootstrap_role(Role::Restaker, addr("restaker"));

        let mut w = World {
            access,
            ledger: ShareLedger::new(&config.ledger, &ids, at(0)),
            vault: LiquidityVault::new(&config.vault, &ids),
            queue: WithdrawalQueue::new(&ids),
            asset: AssetLedger::with_balances([(addr("alice"), shares)]).unwrap(),
        };
        w.ledger
            .deposit(&addr("alice"), shares, &addr("alice"), at(0), &mut w.vault, &mut w.asset)
            .unwrap();
        w.vault
            .withdraw_for_restaking(&w.access, &addr("restaker"), 0, RATE_PRECISION, &mut w.asset)
            .unwrap();
        w
    }

    impl World {
        fn request(&mut self, shares: Amount, now: i64) -> WithdrawOutcome {
            self.queue
                .request_withdraw(
                    &addr("alice"),
                    shares,
                    &addr("alice"),
                    &addr("alice"),
                    at(now),
                    &mut self.ledger,
                    &mut self.vault,
                    &mut self.asset,
                )
                .unwrap()
        }

        fn restaker_returns(&mut self, amount: Amount) {
            self.vault
                .deposit_from_restaker(&self.access, &addr("restaker"), amount, &mut self.asset)
                .unwrap();
            self.queue.advance(&mut self.vault).unwrap();
        }

        fn claim(&mut self, id: OrderId, now: i64) -> Result<Amount, QueueError> {
            self.queue.claim(
                &addr("alice"),
                id,
                at(now),
                &self.ledger,
                &mut self.vault,
                &mut self.asset,
            )
        }
    }

    #[test]
    fn orders_wait_without_liquidity() {
        let mut w = world(500);
        let out = w.request(300, 10);
        assert_eq!(
            out,
            WithdrawOutcome::Queued {
                order_id: OrderId(0),
                amount: 300,
                position: 300
            }
        );
        assert_eq!(w.queue.order_status(OrderId(0)), OrderStatus::Pending);
        assert_eq!(w.vault.queued_claims(), 300);
        assert_eq!(w.queue.tickets_of(&addr("alice")), vec![OrderId(0)]);
    }

    #[test]
    fn watermark_advances_by_free_liquidity() {
        let mut w = world(500);
        w.request(300, 0);
        w.restaker_returns(300);
        assert_eq!(w.queue.total_released(), 300);

        w.request(150, 0); // position 450
        w.request(10, 0); // position 460
        w.request(40, 0); // position 500
        assert_eq!(w.queue.total_ordered(), 500);
        assert_eq!(w.queue.total_released(), 300);

        w.restaker_returns(150);
        assert_eq!(w.queue.total_released(), 450);
        assert_eq!(w.queue.order_status(OrderId(1)), OrderStatus::Claimable);
        assert_eq!(w.queue.order_status(OrderId(2)), OrderStatus::Pending);
        assert_eq!(w.vault.queued_claims(), 50);
    }

    #[test]
    fn instant_settlement_when_vault_is_liquid() {
        let mut w = world(500);
        w.vault
            .deposit_from_restaker(&w.access, &addr("restaker"), 500, &mut w.asset)
            .unwrap();

        let out = w.request(200, 0);
        assert_eq!(
            out,
            WithdrawOutcome::Claimed {
                order_id: OrderId(0),
                amount: 200
            }
        );
        assert_eq!(w.asset.balance_of(&addr("alice")), 200);
        assert_eq!(w.queue.order_status(OrderId(0)), OrderStatus::Claimed);
        assert_eq!(w.queue.open_orders(), 0);
        assert_eq!(w.vault.stats().paid_instant, 200);
    }

    #[test]
    fn claim_pays_once_and_records_wait() {
        let mut w = world(500);
        w.request(100, 1_000);
        w.restaker_returns(100);

        assert_eq!(w.claim(OrderId(0), 4_600).unwrap(), 100);
        assert_eq!(w.asset.balance_of(&addr("alice")), 100);
        assert_eq!(w.queue.average_processing_time(), Some(Duration::seconds(3_600)));

        assert_eq!(w.claim(OrderId(0), 99_999), Err(QueueError::AlreadyClaimed(OrderId(0))));
        assert_eq!(w.claim(OrderId(7), 0), Err(QueueError::UnknownOrder(OrderId(7))));
    }

    #[test]
    fn claim_before_watermark_rejected() {
        let mut w = world(500);
        w.request(100, 0);
        let err = w.claim(OrderId(0), 0).unwrap_err();
        assert!(matches!(err, QueueError::NotYetClaimable { position: 100, released: 0, .. }));
        assert_eq!(err.class(), ErrorClass::Liquidity);
    }

    #[test]
    fn ticket_transfer_moves_claim_right() {
        let mut w = world(500);
        w.request(100, 0);
        w.queue
            .transfer_ticket(&addr("alice"), OrderId(0), &addr("bob"), &w.ledger)
            .unwrap();
        w.restaker_returns(100);

        assert!(matches!(
            w.claim(OrderId(0), 0),
            Err(QueueError::NotTicketOwner { .. })
        ));
        w.queue
            .claim(&addr("bob"), OrderId(0), at(0), &w.ledger, &mut w.vault, &mut w.asset)
            .unwrap();
        assert_eq!(w.asset.balance_of(&addr("bob")), 100);
    }

    #[test]
    fn delegated_request_consumes_allowance() {
        let mut w = world(500);
        w.queue.approve(&addr("alice"), &addr("keeper"), 100);

        let err = w
            .queue
            .request_withdraw(
                &addr("keeper"),
                150,
                &addr("alice"),
                &addr("alice"),
                at(0),
                &mut w.ledger,
                &mut w.vault,
                &mut w.asset,
            )
            .unwrap_err();
        assert!(matches!(err, QueueError::InsufficientAllowance { allowance: 100, .. }));

        w.queue
            .request_withdraw(
                &addr("keeper"),
                60,
                &addr("alice"),
                &addr("alice"),
                at(0),
                &mut w.ledger,
                &mut w.vault,
                &mut w.asset,
            )
            .unwrap();
        assert_eq!(w.queue.allowance(&addr("alice"), &addr("keeper")), 40);
        assert_eq!(w.ledger.balance_of(&addr("alice")), 440);
    }

    #[test]
    fn paused_ledger_blocks_requests_not_claims() {
        let mut w = world(500);
        w.request(100, 0);
        w.restaker_returns(100);
        w.ledger.pause(&addr("guardian"), at(0));

        let err = w
            .queue
            .request_withdraw(
                &addr("alice"),
                1,
                &addr("alice"),
                &addr("alice"),
                at(0),
                &mut w.ledger,
                &mut w.vault,
                &mut w.asset,
            )
            .unwrap_err();
        assert_eq!(err, QueueError::Paused);
        assert_eq!(w.claim(OrderId(0), 0).unwrap(), 100);
    }

    #[test]
    fn advance_with_nothing_pending_is_a_no_op() {
        let mut w = world(500);
        w.vault
            .deposit_from_restaker(&w.access, &addr("restaker"), 500, &mut w.asset)
            .unwrap();
        assert_eq!(w.queue.advance(&mut w.vault).unwrap(), 0);
        assert_eq!(w.queue.total_released(), 0);
    }

    #[test]
    fn rollback_restores_orders_tickets_and_watermark() {
        let mut w = world(500);
        w.request(100, 0);
        w.queue.approve(&addr("alice"), &addr("keeper"), 30);
        let before = w.queue.clone();

        w.queue.begin();
        w.request(200, 0);
        w.queue
            .transfer_ticket(&addr("alice"), OrderId(0), &addr("bob"), &w.ledger)
            .unwrap();
        w.queue.approve(&addr("alice"), &addr("keeper"), 0);
        w.vault
            .deposit_from_restaker(&w.access, &addr("restaker"), 100, &mut w.asset)
            .unwrap();
        w.queue.advance(&mut w.vault).unwrap();
        w.queue.rollback();

        assert_eq!(w.queue, before);
        assert_eq!(w.queue.next_id(), OrderId(1));
        assert_eq!(w.queue.total_released(), 0);
        assert_eq!(w.queue.ticket_owner(OrderId(0)), Some(&addr("alice")));
        assert_eq!(w.queue.allowance(&addr("alice"), &addr("keeper")), 30);
        assert_eq!(w.queue.order_status(OrderId(1)), OrderStatus::Unknown);
    }
}
