//! # Scenario Simulator
//!
//! Replays a JSON list of operations against a fresh pool on a manual
//! clock. Rejected steps are recorded, not fatal, so a scenario can
//! assert on expected failures as well as successes.
//!
//! ```json
//! {
//!   "config": { "ledger": { "cap": 1000, "daily_limit_bps": 1000 } },
//!   "accounts": [{ "address": "alice", "balance": 500 }],
//!   "steps": [
//!     { "op": "deposit", "caller": "alice", "amount": 60 },
//!     { "op": "advance_time", "secs": 86400 }
//!   ]
//! }
//! ```
//!
//! Amounts accept numbers or decimal strings; use strings above 2^64.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use restake_contracts::{
    DepositOutcome, ErrorClass, OrderId, PoolError, PoolStatus, RestakingPool, WithdrawOutcome,
};
use restake_protocol::access::Role;
use restake_protocol::clock::ManualClock;
use restake_protocol::config::ProtocolConfig;
use restake_protocol::types::{decimal, Address, Amount};

use crate::config::GenesisAccount;

/// Default scenario start: 2024-01-01T00:00:00Z.
pub const DEFAULT_START: i64 = 1_704_067_200;

fn default_admin() -> Address {
    Address::from("admin")
}

fn default_start() -> i64 {
    DEFAULT_START
}

/// A scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: ProtocolConfig,
    #[serde(default = "default_admin")]
    pub admin: Address,
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
    /// Unix seconds.
    #[serde(default = "default_start")]
    pub start: i64,
    pub steps: Vec<Step>,
}

/// One operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Deposit {
        caller: Address,
        #[serde(with = "decimal")]
        amount: Amount,
        receiver: Option<Address>,
    },
    RequestWithdraw {
        caller: Address,
        #[serde(with = "decimal")]
        shares: Amount,
        receiver: Option<Address>,
        owner: Option<Address>,
    },
    Claim {
        caller: Address,
        order: u64,
    },
    Approve {
        caller: Address,
        spender: Address,
        #[serde(with = "decimal")]
        shares: Amount,
    },
    TransferShares {
        caller: Address,
        to: Address,
        #[serde(with = "decimal")]
        amount: Amount,
    },
    TransferTicket {
        caller: Address,
        order: u64,
        to: Address,
    },
    AdvanceQueue,
    SetRate {
        caller: Address,
        #[serde(with = "decimal")]
        rate: Amount,
    },
    ResetDailyCounters {
        caller: Address,
    },
    SetCap {
        caller: Address,
        #[serde(with = "decimal")]
        cap: Amount,
    },
    WithdrawForRestaking {
        caller: Address,
    },
    DepositFromRestaker {
        caller: Address,
        #[serde(with = "decimal")]
        amount: Amount,
    },
    GrantRole {
        caller: Address,
        role: Role,
        account: Address,
    },
    Pause {
        caller: Address,
    },
    Unpause {
        caller: Address,
    },
    Freeze {
        caller: Address,
        account: Address,
    },
    Unfreeze {
        caller: Address,
        account: Address,
    },
    Confiscate {
        caller: Address,
        account: Address,
    },
    AdvanceTime {
        secs: i64,
    },
    Status,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Deposit { .. } => "deposit",
            Step::RequestWithdraw { .. } => "request_withdraw",
            Step::Claim { .. } => "claim",
            Step::Approve { .. } => "approve",
            Step::TransferShares { .. } => "transfer_shares",
            Step::TransferTicket { .. } => "transfer_ticket",
            Step::AdvanceQueue => "advance_queue",
            Step::SetRate { .. } => "set_rate",
            Step::ResetDailyCounters { .. } => "reset_daily_counters",
            Step::SetCap { .. } => "set_cap",
            Step::WithdrawForRestaking { .. } => "withdraw_for_restaking",
            Step::DepositFromRestaker { .. } => "deposit_from_restaker",
            Step::GrantRole { .. } => "grant_role",
            Step::Pause { .. } => "pause",
            Step::Unpause { .. } => "unpause",
            Step::Freeze { .. } => "freeze",
            Step::Unfreeze { .. } => "unfreeze",
            Step::Confiscate { .. } => "confiscate",
            Step::AdvanceTime { .. } => "advance_time",
            Step::Status => "status",
        }
    }
}

/// What a successful step returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepOutcome {
    Deposit(DepositOutcome),
    Withdraw(WithdrawOutcome),
    Amount { amount: Amount },
    Status(Box<PoolStatus>),
    Done,
}

/// One line of the report.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub op: &'static str,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<StepOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<ErrorClass>,
}

impl StepReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// The full run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub steps: Vec<StepReport>,
    pub final_status: PoolStatus,
}

impl SimulationReport {
    /// Number of rejected steps.
    pub fn rejected(&self) -> usize {
        self.steps.iter().filter(|s| !s.is_ok()).count()
    }
}

/// Runs `scenario` from genesis.
///
/// # Errors
///
/// Only genesis failures (bad config, bad balances) and a final status
/// that cannot be computed are errors; step rejections are reported.
pub fn run_scenario(scenario: &Scenario) -> Result<SimulationReport, PoolError> {
    let clock = Arc::new(ManualClock::at_unix(scenario.start));
    let balances = scenario
        .accounts
        .iter()
        .map(|a| (a.address.clone(), a.balance));
    let mut pool = RestakingPool::new(
        &scenario.config,
        scenario.admin.clone(),
        balances,
        clock.clone(),
    )?;

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let outcome = apply(&mut pool, &clock, step);
        let report = match outcome {
            Ok(result) => StepReport {
                step: index,
                op: step.name(),
                at: pool.now(),
                result: Some(result),
                error: None,
                class: None,
            },
            Err(e) => StepReport {
                step: index,
                op: step.name(),
                at: pool.now(),
                result: None,
                error: Some(e.to_string()),
                class: Some(e.class()),
            },
        };
        tracing::debug!(step = index, op = report.op, ok = report.is_ok(), "scenario step");
        steps.push(report);
    }

    Ok(SimulationReport {
        steps,
        final_status: pool.status()?,
    })
}

fn apply(
    pool: &mut RestakingPool,
    clock: &ManualClock,
    step: &Step,
) -> Result<StepOutcome, PoolError> {
    let done = |()| StepOutcome::Done;
    let amount = |amount| StepOutcome::Amount { amount };

    match step {
        Step::Deposit {
            caller,
            amount,
            receiver,
        } => pool
            .deposit(caller, *amount, receiver.as_ref().unwrap_or(caller))
            .map(StepOutcome::Deposit),
        Step::RequestWithdraw {
            caller,
            shares,
            receiver,
            owner,
        } => {
            let owner = owner.as_ref().unwrap_or(caller);
            let receiver = receiver.as_ref().unwrap_or(owner);
            pool.request_withdraw(caller, *shares, receiver, owner)
                .map(StepOutcome::Withdraw)
        }
        Step::Claim { caller, order } => pool.claim(caller, OrderId(*order)).map(amount),
        Step::Approve {
            caller,
            spender,
            shares,
        } => pool.approve(caller, spender, *shares).map(done),
        Step::TransferShares { caller, to, amount } => {
            pool.transfer_shares(caller, to, *amount).map(done)
        }
        Step::TransferTicket { caller, order, to } => {
            pool.transfer_ticket(caller, OrderId(*order), to).map(done)
        }
        Step::AdvanceQueue => pool.advance_queue().map(amount),
        Step::SetRate { caller, rate } => pool.set_rate(caller, *rate).map(done),
        Step::ResetDailyCounters { caller } => pool.reset_daily_counters(caller).map(done),
        Step::SetCap { caller, cap } => pool.set_cap(caller, *cap).map(done),
        Step::WithdrawForRestaking { caller } => pool.withdraw_for_restaking(caller).map(amount),
        Step::DepositFromRestaker { caller, amount } => {
            pool.deposit_from_restaker(caller, *amount).map(done)
        }
        Step::GrantRole {
            caller,
            role,
            account,
        } => pool.grant_role(caller, *role, account).map(done),
        Step::Pause { caller } => pool.pause(caller).map(done),
        Step::Unpause { caller } => pool.unpause(caller).map(done),
        Step::Freeze { caller, account } => pool.freeze(caller, account).map(done),
        Step::Unfreeze { caller, account } => pool.unfreeze(caller, account).map(done),
        Step::Confiscate { caller, account } => pool.confiscate(caller, account).map(amount),
        Step::AdvanceTime { secs } => {
            clock.advance(Duration::seconds(*secs));
            Ok(StepOutcome::Done)
        }
        Step::Status => pool.status().map(|s| StepOutcome::Status(Box::new(s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minted(report: &StepReport) -> Amount {
        match &report.result {
            Some(StepOutcome::Deposit(out)) => out.shares_minted,
            other => panic!("expected a deposit, got {other:?}"),
        }
    }

    #[test]
    fn bundled_daily_limit_scenario() {
        let scenario: Scenario =
            serde_json::from_str(include_str!("../scenarios/daily_limit.json")).unwrap();
        let report = run_scenario(&scenario).unwrap();

        assert_eq!(report.rejected(), 0);
        let deposits: Vec<Amount> = report
            .steps
            .iter()
            .filter(|s| s.op == "deposit")
            .map(minted)
            .collect();
        assert_eq!(deposits, vec![60, 40, 0, 30]);
        assert_eq!(report.final_status.total_shares, 130);
        assert_eq!(report.final_status.issued_today, 30);
    }

    #[test]
    fn rejected_steps_do_not_stop_the_run() {
        let scenario: Scenario = serde_json::from_str(
            r#"{
                "config": { "ledger": { "cap": "10000", "daily_limit_bps": 10000 },
                            "vault": { "fast_reserve_bps": 0 } },
                "accounts": [{ "address": "alice", "balance": 1000 }],
                "steps": [
                    { "op": "deposit", "caller": "alice", "amount": 1000 },
                    { "op": "withdraw_for_restaking", "caller": "admin" },
                    { "op": "request_withdraw", "caller": "alice", "shares": "250" },
                    { "op": "claim", "caller": "alice", "order": 0 },
                    { "op": "advance_time", "secs": 3600 },
                    { "op": "deposit_from_restaker", "caller": "admin", "amount": 250 },
                    { "op": "claim", "caller": "alice", "order": 0 },
                    { "op": "status" }
                ]
            }"#,
        )
        .unwrap();
        let report = run_scenario(&scenario).unwrap();

        assert_eq!(report.rejected(), 1);
        assert_eq!(report.steps[3].class, Some(ErrorClass::Liquidity));
        assert_eq!(
            report.steps[6].result,
            Some(StepOutcome::Amount { amount: 250 })
        );
        assert_eq!(report.final_status.average_processing_secs, Some(3_600));
        assert_eq!(report.final_status.open_orders, 0);
    }

    #[test]
    fn genesis_errors_surface() {
        let scenario: Scenario = serde_json::from_str(
            r#"{ "config": { "vault": { "fast_reserve_bps": 10001 } }, "steps": [] }"#,
        )
        .unwrap();
        assert!(matches!(run_scenario(&scenario), Err(PoolError::Config(_))));
    }
}
