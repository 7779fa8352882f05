//! Interfaces to the outside world
//!
//! The distributor neither stores roles nor moves tokens. It consumes an
//! `Authorizer` for privileged calls, uses a `Custody` to collect program
//! funding and credit payouts, and exposes `BalanceHook` for the share token.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::Result;
use crate::types::{Action, Address, ProgramKey};

/// External role check
pub trait Authorizer {
    fn is_authorized(&self, caller: &Address, action: Action) -> bool;
}

/// Custodial balances of the reward tokens
pub trait Custody {
    /// Pull `amount` of `token` from `from` into program funding
    ///
    /// Called after all checks and before any state change; an error aborts
    /// the operation.
    fn collect(&self, from: &Address, token: &Address, amount: u128) -> core::result::Result<(), String>;

    /// Credit a payout to `to`
    fn credit(&self, to: &Address, token: &Address, amount: u128);
}

/// Pre-mutation hook the share token must call
///
/// # Ordering
///
/// The token calls these **before** writing the new balances, synchronously,
/// and must not apply its write if the hook returns an error. Calling after the
/// write settles the elapsed interval against the new balance and breaks
/// reward conservation.
pub trait BalanceHook {
    /// `participant`'s balance on `key` is about to become `new_balance`
    fn before_balance_change(
        &self,
        key: &ProgramKey,
        participant: &Address,
        new_balance: u128,
        now: u64,
    ) -> Result<()>;

    /// Shares are about to move between two holders of the same pool
    fn before_transfer(
        &self,
        key: &ProgramKey,
        from: &Address,
        from_new_balance: u128,
        to: &Address,
        to_new_balance: u128,
        now: u64,
    ) -> Result<()>;
}

/// Fixed set of admins allowed every privileged action
#[derive(Clone, Debug, Default)]
pub struct AdminList {
    admins: HashSet<Address>,
}

impl AdminList {
    pub fn new(admins: impl IntoIterator<Item = Address>) -> Self {
        AdminList {
            admins: admins.into_iter().collect(),
        }
    }
}

impl Authorizer for AdminList {
    fn is_authorized(&self, caller: &Address, _action: Action) -> bool {
        self.admins.contains(caller)
    }
}

/// Custody kept in process memory, keyed by `(holder, token)`
#[derive(Debug, Default)]
pub struct InMemoryCustody {
    balances: Mutex<HashMap<(Address, Address), u128>>,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a holder's balance (e.g. an admin treasury)
    pub fn mint(&self, holder: Address, token: Address, amount: u128) {
        let mut balances = self.balances.lock().unwrap_or_else(|p| p.into_inner());
        let slot = balances.entry((holder, token)).or_insert(0);
        *slot = slot.saturating_add(amount);
    }

    pub fn balance_of(&self, holder: &Address, token: &Address) -> u128 {
        let balances = self.balances.lock().unwrap_or_else(|p| p.into_inner());
        balances.get(&(*holder, *token)).copied().unwrap_or(0)
    }
}

impl Custody for InMemoryCustody {
    fn collect(&self, from: &Address, token: &Address, amount: u128) -> core::result::Result<(), String> {
        let mut balances = self.balances.lock().map_err(|_| "custody lock poisoned".to_string())?;
        let slot = balances.entry((*from, *token)).or_insert(0);
        if *slot < amount {
            return Err(format!("{} holds {} of {}, needs {}", from, slot, token, amount));
        }
        *slot -= amount;
        Ok(())
    }

    fn credit(&self, to: &Address, token: &Address, amount: u128) {
        self.mint(*to, *token, amount);
    }
}
