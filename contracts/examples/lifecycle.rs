//! Walkthrough of one day in the life of a restaking pool.
//!
//! Two depositors enter, the restaker moves the surplus out, one holder
//! exits instantly from the fast reserve, another waits in the queue until
//! the restaker brings liquidity back, and the rate feed ticks up.
//!
//! Run with:
//!   cargo run -p restake-contracts --example lifecycle

use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;

use restake_contracts::{RestakingPool, WithdrawOutcome};
use restake_protocol::access::Role;
use restake_protocol::clock::ManualClock;
use restake_protocol::config::{ProtocolConfig, ONE_ASSET, RATE_PRECISION};
use restake_protocol::types::{Address, Amount};

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

fn step(n: usize, title: &str) {
    println!();
    println!("{BOLD}[{n}] {title}{RESET}");
}

fn asset(amount: Amount) -> String {
    format!("{}.{:04}", amount / ONE_ASSET, (amount % ONE_ASSET) / (ONE_ASSET / 10_000))
}

fn print_books(pool: &RestakingPool) -> Result<()> {
    let s = pool.status()?;
    println!(
        "{DIM}    shares {}  vault {}  reserve {}  queued {}  surplus {}{RESET}",
        asset(s.total_shares),
        asset(s.vault_balance),
        asset(s.claim_reserve),
        asset(s.queued_claims),
        s.surplus,
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("restake_contracts=info")
        .with_writer(std::io::stderr)
        .init();

    let admin = Address::from("admin");
    let oracle = Address::from("oracle");
    let alice = Address::from("alice");
    let bob = Address::from("bob");

    let mut config = ProtocolConfig::default();
    config.ledger.daily_limit_bps = 5_000;
    let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
    let mut pool = RestakingPool::new(
        &config,
        admin.clone(),
        [(alice.clone(), 1_000 * ONE_ASSET), (bob.clone(), 1_000 * ONE_ASSET)],
        clock.clone(),
    )?;
    pool.grant_role(&admin, Role::RateSource, &oracle)?;

    step(1, "Deposits");
    for (who, amount) in [(&alice, 400 * ONE_ASSET), (&bob, 600 * ONE_ASSET)] {
        let out = pool.deposit(who, amount, who)?;
        println!(
            "    {who} deposits {} -> {GREEN}{} shares{RESET}",
            asset(amount),
            asset(out.shares_minted)
        );
    }
    print_books(&pool)?;

    step(2, "Restaker takes the surplus");
    let moved = pool.withdraw_for_restaking(&admin)?;
    println!("    {} sent to the restaking venue", asset(moved));
    print_books(&pool)?;

    step(3, "Alice exits from the fast reserve");
    let out = pool.request_withdraw(&alice, 30 * ONE_ASSET, &alice, &alice)?;
    println!("    {out:?}");

    step(4, "Bob asks for more than the vault holds");
    let out = pool.request_withdraw(&bob, 200 * ONE_ASSET, &bob, &bob)?;
    let ticket = out.order_id();
    if let WithdrawOutcome::Queued { position, .. } = out {
        println!(
            "    {YELLOW}ticket {ticket} queued at position {}{RESET}",
            asset(position)
        );
    }
    print_books(&pool)?;

    step(5, "Twelve hours later the restaker returns liquidity");
    clock.advance(Duration::hours(12));
    pool.deposit_from_restaker(&admin, 250 * ONE_ASSET)?;
    println!("    ticket {ticket} is {:?}", pool.order_status(ticket));
    let paid = pool.claim(&bob, ticket)?;
    println!("    {GREEN}bob claims {}{RESET}", asset(paid));
    print_books(&pool)?;

    step(6, "Rate feed reports 0.4% growth");
    pool.set_rate(&oracle, RATE_PRECISION + RATE_PRECISION * 40 / 10_000)?;
    let preview = pool.preview_withdraw(100 * ONE_ASSET)?;
    println!("    100 shares now redeem for {}", asset(preview));

    let s = pool.status()?;
    println!();
    println!(
        "{BOLD}Done.{RESET} {} holders, {} open orders, average wait {:?}s",
        s.holders, s.open_orders, s.average_processing_secs
    );
    Ok(())
}
