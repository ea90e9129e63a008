//! Integration tests for the full pool lifecycle: deposits, restaking
//! round trips, withdrawals, administration, and persistence.

use std::sync::Arc;

use chrono::Duration;
use restake_contracts::{
    ErrorClass, OrderId, OrderStatus, PoolError, PoolState, QueueError, RestakingPool,
    VaultError, WithdrawOutcome,
};
use restake_protocol::access::{AccessError, Role};
use restake_protocol::clock::ManualClock;
use restake_protocol::config::ProtocolConfig;
use restake_protocol::storage::SnapshotStore;
use restake_protocol::types::{Address, Amount};

const GENESIS: i64 = 1_700_000_000;

fn addr(s: &str) -> Address {
    Address::from(s)
}

/// Helper: a pool with a 10% fast reserve and three funded users.
fn pool() -> (RestakingPool, Arc<ManualClock>) {
    let mut config = ProtocolConfig::default();
    config.ledger.cap = 1_000_000;
    config.ledger.daily_limit_bps = 10_000;
    config.vault.fast_reserve_bps = 1_000;

    let clock = Arc::new(ManualClock::at_unix(GENESIS));
    let pool = RestakingPool::new(
        &config,
        addr("admin"),
        [
            (addr("alice"), 50_000),
            (addr("bob"), 50_000),
            (addr("carol"), 50_000),
        ],
        clock.clone(),
    )
    .unwrap();
    (pool, clock)
}

fn assert_books_balance(pool: &RestakingPool) {
    let s = pool.status().unwrap();
    assert!(s.claim_reserve <= s.vault_balance);
    assert!(s.total_released <= s.total_ordered);
    assert_eq!(s.queued_claims, s.total_ordered - s.total_released);
    assert!(s.total_shares <= s.cap);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn deposit_restake_withdraw_claim() {
    let (mut pool, clock) = pool();
    let (alice, bob, admin) = (addr("alice"), addr("bob"), addr("admin"));

    pool.deposit(&alice, 10_000, &alice).unwrap();
    pool.deposit(&bob, 10_000, &bob).unwrap();

    // 20k backing, 10% fast reserve: 18k may be restaked.
    assert_eq!(pool.surplus().unwrap(), 18_000);
    assert_eq!(pool.withdraw_for_restaking(&admin).unwrap(), 18_000);
    assert_eq!(pool.surplus().unwrap(), 0);
    assert_books_balance(&pool);

    // Alice fits in the fast reserve and is paid at once.
    let out = pool.request_withdraw(&alice, 1_500, &alice, &alice).unwrap();
    assert!(matches!(out, WithdrawOutcome::Claimed { amount: 1_500, .. }));

    // Bob does not: 500 free, 5000 owed.
    let out = pool.request_withdraw(&bob, 5_000, &bob, &bob).unwrap();
    let (order_id, position) = match out {
        WithdrawOutcome::Queued { order_id, position, .. } => (order_id, position),
        other => panic!("expected a ticket, got {other:?}"),
    };
    assert_eq!(position, 6_500);
    assert_eq!(pool.order_status(order_id), OrderStatus::Pending);
    // The remaining 500 of free liquidity went to Bob's order already.
    assert_eq!(pool.status().unwrap().total_released, 2_000);
    assert!(pool.surplus().unwrap() < 0);
    assert_books_balance(&pool);

    clock.advance(Duration::hours(12));
    pool.deposit_from_restaker(&admin, 6_000).unwrap();
    assert_eq!(pool.order_status(order_id), OrderStatus::Claimable);

    assert_eq!(pool.claim(&bob, order_id).unwrap(), 5_000);
    assert_eq!(pool.order_status(order_id), OrderStatus::Claimed);

    let bob_view = pool.account(&bob).unwrap();
    assert_eq!(bob_view.asset_balance, 45_000);
    assert_eq!(bob_view.shares, 5_000);
    assert!(bob_view.tickets.is_empty());

    let stats = pool.status().unwrap().vault_stats;
    assert_eq!(stats.from_ledger, 20_000);
    assert_eq!(stats.to_restaker, 18_000);
    assert_eq!(stats.from_restaker, 6_000);
    assert_eq!(stats.paid_instant, 1_500);
    assert_eq!(stats.paid_queued, 5_000);
    assert_books_balance(&pool);
}

#[test]
fn deposits_fund_waiting_orders() {
    let (mut pool, _) = pool();
    let (alice, bob, admin) = (addr("alice"), addr("bob"), addr("admin"));

    pool.deposit(&alice, 10_000, &alice).unwrap();
    pool.withdraw_for_restaking(&admin).unwrap();
    let out = pool.request_withdraw(&alice, 5_000, &alice, &alice).unwrap();
    let id = out.order_id();
    assert_eq!(pool.order_status(id), OrderStatus::Pending);

    // A fresh deposit is free liquidity and advances the queue.
    pool.deposit(&bob, 10_000, &bob).unwrap();
    assert_eq!(pool.order_status(id), OrderStatus::Claimable);
    assert_eq!(pool.claim(&alice, id).unwrap(), 5_000);
    assert_books_balance(&pool);
}

#[test]
fn delegated_withdrawal_and_ticket_transfer() {
    let (mut pool, _) = pool();
    let (alice, bob, carol, admin) = (addr("alice"), addr("bob"), addr("carol"), addr("admin"));

    pool.deposit(&alice, 10_000, &alice).unwrap();
    pool.withdraw_for_restaking(&admin).unwrap();

    pool.approve(&alice, &bob, 2_000).unwrap();
    let err = pool.request_withdraw(&bob, 2_001, &bob, &alice).unwrap_err();
    assert!(matches!(
        err,
        PoolError::Queue(QueueError::InsufficientAllowance { .. })
    ));

    let out = pool.request_withdraw(&bob, 2_000, &bob, &alice).unwrap();
    let id = out.order_id();
    assert_eq!(pool.account(&bob).unwrap().tickets, vec![id]);
    assert_eq!(pool.state().queue.allowance(&alice, &bob), 0);

    pool.transfer_ticket(&bob, id, &carol).unwrap();
    assert_eq!(pool.order(id).owner, Some(carol.clone()));

    pool.deposit_from_restaker(&admin, 2_000).unwrap();
    let err = pool.claim(&bob, id).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Precondition);
    assert_eq!(pool.claim(&carol, id).unwrap(), 2_000);
}

#[test]
fn share_transfers_move_redemption_rights() {
    let (mut pool, _) = pool();
    let (alice, bob) = (addr("alice"), addr("bob"));

    pool.deposit(&alice, 1_000, &alice).unwrap();
    pool.transfer_shares(&alice, &bob, 400).unwrap();
    assert_eq!(pool.account(&bob).unwrap().shares, 400);

    let out = pool.request_withdraw(&bob, 400, &bob, &bob).unwrap();
    assert_eq!(out.amount(), 400);
    assert!(pool.request_withdraw(&bob, 1, &bob, &bob).is_err());
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

#[test]
fn compliance_freeze_and_confiscate() {
    let (mut pool, _) = pool();
    let (alice, bob, admin, officer) = (addr("alice"), addr("bob"), addr("admin"), addr("officer"));
    pool.grant_role(&admin, Role::Compliance, &officer).unwrap();

    pool.deposit(&alice, 3_000, &alice).unwrap();
    pool.freeze(&officer, &alice).unwrap();

    assert!(pool.deposit(&alice, 1, &alice).is_err());
    assert!(pool.request_withdraw(&alice, 1, &alice, &alice).is_err());
    assert!(pool.transfer_shares(&alice, &bob, 1).is_err());
    // Nobody may deposit on a frozen account's behalf either.
    assert!(pool.deposit(&bob, 1, &alice).is_err());

    let vault_before = pool.status().unwrap().vault_balance;
    assert_eq!(pool.confiscate(&officer, &alice).unwrap(), 3_000);
    assert_eq!(pool.account(&alice).unwrap().shares, 0);
    assert_eq!(pool.status().unwrap().vault_balance, vault_before);

    pool.unfreeze(&officer, &alice).unwrap();
    pool.deposit(&alice, 10, &alice).unwrap();
}

#[test]
fn pause_blocks_new_obligations_but_not_claims() {
    let (mut pool, _) = pool();
    let (alice, admin, guardian) = (addr("alice"), addr("admin"), addr("guardian"));
    pool.grant_role(&admin, Role::Pauser, &guardian).unwrap();

    pool.deposit(&alice, 10_000, &alice).unwrap();
    pool.withdraw_for_restaking(&admin).unwrap();
    let id = pool
        .request_withdraw(&alice, 5_000, &alice, &alice)
        .unwrap()
        .order_id();
    pool.deposit_from_restaker(&admin, 5_000).unwrap();

    pool.pause(&guardian).unwrap();
    assert!(pool.deposit(&alice, 1, &alice).is_err());
    assert!(pool.request_withdraw(&alice, 1, &alice, &alice).is_err());
    assert!(pool.transfer_shares(&alice, &addr("bob"), 1).is_err());
    assert_eq!(pool.claim(&alice, id).unwrap(), 5_000);

    pool.unpause(&guardian).unwrap();
    pool.deposit(&alice, 1, &alice).unwrap();
}

#[test]
fn restaker_rotation_is_two_phase() {
    let (mut pool, _) = pool();
    let (admin, bot, mallory) = (addr("admin"), addr("bot"), addr("mallory"));

    let err = pool.grant_role(&admin, Role::Restaker, &bot).unwrap_err();
    assert!(matches!(
        err,
        PoolError::Access(AccessError::RotationRequired(Role::Restaker))
    ));

    pool.propose_rotation(&admin, Role::Restaker, &admin, &bot).unwrap();
    assert!(pool.accept_rotation(&mallory, Role::Restaker).is_err());
    pool.accept_rotation(&bot, Role::Restaker).unwrap();

    let access = &pool.state().access;
    assert_eq!(access.members(Role::Restaker), vec![bot.clone()]);
    assert!(access.has_role(Role::Admin, &admin));

    pool.deposit(&addr("alice"), 1_000, &addr("alice")).unwrap();
    assert!(pool.withdraw_for_restaking(&admin).is_err());
    assert_eq!(pool.withdraw_for_restaking(&bot).unwrap(), 900);
}

#[test]
fn restaking_without_surplus_is_a_liquidity_error() {
    let (mut pool, _) = pool();
    let err = pool.withdraw_for_restaking(&addr("admin")).unwrap_err();
    assert!(matches!(
        err,
        PoolError::Vault(VaultError::NoSurplus { surplus: 0 })
    ));
    assert_eq!(err.class(), ErrorClass::Liquidity);
}

// ---------------------------------------------------------------------------
// Conservation
// ---------------------------------------------------------------------------

/// Deterministic pseudo-random walk over the public surface. Whatever
/// succeeds or fails, the books must balance after every step and the
/// watermark must never move backwards.
#[test]
fn books_balance_across_mixed_operations() {
    let (mut pool, clock) = pool();
    let users = [addr("alice"), addr("bob"), addr("carol")];
    let admin = addr("admin");
    let mut seed: u64 = 0x5eed;
    let mut next = |bound: u64| {
        seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        (seed >> 33) % bound
    };

    let mut last_released = 0;
    for _ in 0..400 {
        let who = &users[next(3) as usize];
        let amount = Amount::from(next(2_000) + 1);
        let _ = match next(6) {
            0 | 1 => pool.deposit(who, amount, who).map(|_| ()),
            2 => pool.request_withdraw(who, amount, who, who).map(|_| ()),
            3 => {
                let tickets = pool.account(who).unwrap().tickets;
                match tickets.first() {
                    Some(id) => pool.claim(who, *id).map(|_| ()),
                    None => pool.advance_queue().map(|_| ()),
                }
            }
            4 => pool.withdraw_for_restaking(&admin).map(|_| ()),
            _ => pool.deposit_from_restaker(&admin, amount).map(|_| ()),
        };
        if next(10) == 0 {
            clock.advance(Duration::hours(7));
        }

        assert!(!pool.is_halted());
        assert_books_balance(&pool);
        let released = pool.status().unwrap().total_released;
        assert!(released >= last_released);
        last_released = released;
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn snapshot_survives_store_round_trip() {
    let (mut pool, clock) = pool();
    let (alice, admin) = (addr("alice"), addr("admin"));
    pool.deposit(&alice, 10_000, &alice).unwrap();
    pool.withdraw_for_restaking(&admin).unwrap();
    pool.request_withdraw(&alice, 4_000, &alice, &alice).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::open(dir.path()).unwrap();
    let seq = store.put_snapshot(&pool.snapshot()).unwrap();

    let (loaded_seq, state): (u64, PoolState) = store.latest_snapshot().unwrap().unwrap();
    assert_eq!(loaded_seq, seq);
    assert_eq!(state, pool.snapshot());

    let mut restored = RestakingPool::from_state(state, clock);
    restored.deposit_from_restaker(&admin, 4_000).unwrap();
    assert_eq!(restored.order_status(OrderId(0)), OrderStatus::Claimable);
    assert_eq!(restored.claim(&alice, OrderId(0)).unwrap(), 4_000);
}
