//! # Fungible Token Capability
//!
//! Two ledgers in the system speak "fungible token": the base asset that
//! users deposit and the shares the pool issues against it. Both expose
//! the same [`FungibleToken`] surface; the bookkeeping underneath is the
//! shared [`Balances`] table.
//!
//! The base asset itself is external to the accounting core. [`AssetLedger`]
//! is its in-memory stand-in: plain balances, checked transfers, and a
//! supply that only changes when an account is seeded at construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::journal::{JournaledMap, Transactional};
use crate::types::{Address, Amount};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from balance bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The sender holds less than the amount moved.
    #[error("insufficient balance: {account} has {balance}, needs {amount}")]
    InsufficientBalance {
        /// The debited account.
        account: Address,
        /// Its current balance.
        balance: Amount,
        /// The amount requested.
        amount: Amount,
    },

    /// A credit would overflow the supply or a balance.
    #[error("supply overflow: crediting {amount} exceeds u128::MAX")]
    SupplyOverflow {
        /// The amount that was attempted.
        amount: Amount,
    },
}

// ---------------------------------------------------------------------------
// Capability Trait
// ---------------------------------------------------------------------------

/// Read and transfer surface shared by every fungible balance book.
pub trait FungibleToken {
    /// Error returned by a rejected transfer.
    type Error: std::error::Error;

    /// Sum of all balances.
    fn total_supply(&self) -> Amount;

    /// Balance of `account`, zero if never seen.
    fn balance_of(&self, account: &Address) -> Amount;

    /// Moves `amount` from `from` to `to`.
    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount)
        -> Result<(), Self::Error>;
}

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

/// Per-account balances plus the running total.
///
/// Invariant: `total == balances.values().sum()`. Every mutator keeps it.
/// Zero balances are pruned so the map only holds live holders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    balances: JournaledMap<Address, Amount>,
    total: Amount,
    #[serde(skip)]
    saved_total: Option<Amount>,
}

impl Balances {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `account`.
    pub fn get(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Running total across all accounts.
    pub fn total(&self) -> Amount {
        self.total
    }

    /// Number of accounts holding a non-zero balance.
    pub fn holders(&self) -> usize {
        self.balances.len()
    }

    /// Iterates `(account, balance)` in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    /// Credits `amount` to `account`, growing the total.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::SupplyOverflow`] if the total would overflow.
    pub fn mint(&mut self, account: &Address, amount: Amount) -> Result<(), TokenError> {
        let total = self
            .total
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow { amount })?;
        if amount == 0 {
            return Ok(());
        }
        // A balance can never exceed the total, so this add cannot overflow.
        let credited = self.get(account) + amount;
        self.balances.insert(account.clone(), credited);
        self.total = total;
        Ok(())
    }

    /// Debits `amount` from `account`, shrinking the total.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InsufficientBalance`] if the account holds less.
    pub fn burn(&mut self, account: &Address, amount: Amount) -> Result<(), TokenError> {
        self.debit(account, amount)?;
        self.total -= amount;
        Ok(())
    }

    /// Moves `amount` between accounts. The total is unchanged.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<(), TokenError> {
        self.debit(from, amount)?;
        if amount > 0 {
            let credited = self.get(to) + amount;
            self.balances.insert(to.clone(), credited);
        }
        Ok(())
    }

    fn debit(&mut self, account: &Address, amount: Amount) -> Result<(), TokenError> {
        let balance = self.get(account);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                account: account.clone(),
                balance,
                amount,
            });
        }
        let remaining = balance - amount;
        if remaining == 0 {
            self.balances.remove(account);
        } else {
            self.balances.insert(account.clone(), remaining);
        }
        Ok(())
    }
}

impl Transactional for Balances {
    fn begin(&mut self) {
        self.balances.begin();
        self.saved_total = Some(self.total);
    }

    fn commit(&mut self) {
        self.balances.commit();
        self.saved_total = None;
    }

    fn rollback(&mut self) {
        self.balances.rollback();
        if let Some(total) = self.saved_total.take() {
            self.total = total;
        }
    }
}

// ---------------------------------------------------------------------------
// AssetLedger
// ---------------------------------------------------------------------------

/// In-memory book of the base asset.
///
/// The pool never mints or burns the base asset; it only moves it between
/// depositors, the vault, the restaker, and claimants. Supply is fixed by
/// whatever the ledger was seeded with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLedger {
    balances: Balances,
}

impl AssetLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger with the given starting balances.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::SupplyOverflow`] if the balances sum past `u128::MAX`.
    pub fn with_balances<I>(seed: I) -> Result<Self, TokenError>
    where
        I: IntoIterator<Item = (Address, Amount)>,
    {
        let mut ledger = Self::new();
        for (account, amount) in seed {
            ledger.balances.mint(&account, amount)?;
        }
        Ok(ledger)
    }

    /// Number of accounts holding the asset.
    pub fn holders(&self) -> usize {
        self.balances.holders()
    }
}

impl Transactional for AssetLedger {
    fn begin(&mut self) {
        self.balances.begin();
    }

    fn commit(&mut self) {
        self.balances.commit();
    }

    fn rollback(&mut self) {
        self.balances.rollback();
    }
}

impl FungibleToken for AssetLedger {
    type Error = TokenError;

    fn total_supply(&self) -> Amount {
        self.balances.total()
    }

    fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<(), TokenError> {
        self.balances.transfer(from, to, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::from(s)
    }

    #[test]
    fn mint_and_burn_track_total() {
        let mut b = Balances::new();
        b.mint(&addr("alice"), 100).unwrap();
        b.mint(&addr("bob"), 50).unwrap();
        assert_eq!(b.total(), 150);

        b.burn(&addr("alice"), 40).unwrap();
        assert_eq!(b.get(&addr("alice")), 60);
        assert_eq!(b.total(), 110);
    }

    #[test]
    fn burn_more_than_balance_rejected() {
        let mut b = Balances::new();
        b.mint(&addr("alice"), 10).unwrap();
        let err = b.burn(&addr("alice"), 11).unwrap_err();
        assert_eq!(
            err,
            TokenError::InsufficientBalance {
                account: addr("alice"),
                balance: 10,
                amount: 11,
            }
        );
        assert_eq!(b.total(), 10);
    }

    #[test]
    fn mint_overflow_rejected() {
        let mut b = Balances::new();
        b.mint(&addr("alice"), u128::MAX).unwrap();
        assert!(matches!(
            b.mint(&addr("bob"), 1),
            Err(TokenError::SupplyOverflow { .. })
        ));
    }

    #[test]
    fn transfer_preserves_total_and_prunes_empty() {
        let mut b = Balances::new();
        b.mint(&addr("alice"), 10).unwrap();
        b.transfer(&addr("alice"), &addr("bob"), 10).unwrap();
        assert_eq!(b.total(), 10);
        assert_eq!(b.holders(), 1);
        assert_eq!(b.get(&addr("bob")), 10);
    }

    #[test]
    fn rollback_restores_balances_and_total() {
        let mut b = Balances::new();
        b.mint(&addr("alice"), 100).unwrap();
        let before = b.clone();

        b.begin();
        b.mint(&addr("bob"), 40).unwrap();
        b.transfer(&addr("alice"), &addr("carol"), 100).unwrap();
        b.burn(&addr("bob"), 15).unwrap();
        assert_eq!(b.total(), 125);
        b.rollback();

        assert_eq!(b, before);
        assert_eq!(b.total(), 100);
        assert_eq!(b.get(&addr("alice")), 100);
        assert_eq!(b.holders(), 1);
    }

    #[test]
    fn asset_ledger_seeds_and_transfers() {
        let mut asset =
            AssetLedger::with_balances([(addr("alice"), 1_000), (addr("bob"), 500)]).unwrap();
        assert_eq!(asset.total_supply(), 1_500);

        asset.transfer(&addr("alice"), &addr("vault"), 400).unwrap();
        assert_eq!(asset.balance_of(&addr("alice")), 600);
        assert_eq!(asset.balance_of(&addr("vault")), 400);
        assert_eq!(asset.total_supply(), 1_500);

        assert!(asset.transfer(&addr("bob"), &addr("vault"), 501).is_err());
    }
}
