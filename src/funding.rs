//! Per-program reward reserves
//!
//! Each program generation owns one reserve. Setup funds it with the program's
//! `total_reward`; admin top-ups add to it; claims debit it. Accrual is bounded
//! by construction so debits never exceed `total_reward`, and `debit` refuses
//! to go below zero regardless.

use crate::error::{Result, StateError};
use crate::types::ProgramKey;

/// Funding state of one program generation
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Reserve {
    /// Total ever deposited (setup + top-ups)
    pub funded: u128,
    /// Total ever paid out
    pub debited: u128,
}

impl Reserve {
    /// Undistributed balance
    #[inline]
    pub fn available(&self) -> u128 {
        self.funded.saturating_sub(self.debited)
    }
}

/// Reserves of every generation of one program key
#[derive(Clone, Debug)]
pub struct FundingLedger {
    key: ProgramKey,
    reserves: Vec<Reserve>,
}

impl FundingLedger {
    pub fn new(key: ProgramKey) -> Self {
        FundingLedger {
            key,
            reserves: Vec::new(),
        }
    }

    /// Open the next generation's reserve holding `funded` and return its index
    pub(crate) fn open(&mut self, funded: u128) -> u32 {
        self.reserves.push(Reserve { funded, debited: 0 });
        (self.reserves.len() - 1) as u32
    }

    pub fn reserve(&self, generation: u32) -> Option<Reserve> {
        self.reserves.get(generation as usize).copied()
    }

    /// Increase a generation's reserve
    pub fn fund(&mut self, generation: u32, amount: u128) -> Result<()> {
        let key = self.key;
        let r = self.slot_mut(generation)?;
        r.funded = r
            .funded
            .checked_add(amount)
            .ok_or(reward_math::accrual::MathError::Overflow)?;
        log::debug!("{} gen {}: funded +{} (total {})", key, generation, amount, r.funded);
        Ok(())
    }

    /// Fail unless `amount` can be debited from `generation`
    pub fn check_debit(&self, generation: u32, amount: u128) -> Result<()> {
        let available = self
            .reserve(generation)
            .ok_or(StateError::ProgramNotFound(self.key))?
            .available();
        if amount > available {
            return Err(StateError::InsufficientReserve {
                key: self.key,
                generation,
                requested: amount,
                available,
            }
            .into());
        }
        Ok(())
    }

    /// Pay `amount` out of a generation's reserve
    pub fn debit(&mut self, generation: u32, amount: u128) -> Result<()> {
        self.check_debit(generation, amount)?;
        let r = self.slot_mut(generation)?;
        r.debited += amount;
        Ok(())
    }

    fn slot_mut(&mut self, generation: u32) -> Result<&mut Reserve> {
        let key = self.key;
        self.reserves
            .get_mut(generation as usize)
            .ok_or_else(|| StateError::ProgramNotFound(key).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DistributorError;
    use crate::types::{PoolId, Role};

    fn ledger() -> FundingLedger {
        FundingLedger::new(ProgramKey::new(PoolId(1), Role::Lender))
    }

    #[test]
    fn test_fund_and_debit() {
        let mut f = ledger();
        let g = f.open(0);
        assert_eq!(g, 0);
        f.fund(g, 1_000).unwrap();
        f.debit(g, 400).unwrap();
        assert_eq!(f.reserve(g), Some(Reserve { funded: 1_000, debited: 400 }));
        assert_eq!(f.reserve(g).unwrap().available(), 600);
    }

    #[test]
    fn test_overdraw_rejected_without_mutation() {
        let mut f = ledger();
        let g = f.open(0);
        f.fund(g, 100).unwrap();

        let err = f.debit(g, 101).unwrap_err();
        assert!(matches!(
            err,
            DistributorError::State(StateError::InsufficientReserve { requested: 101, available: 100, .. })
        ));
        assert_eq!(f.reserve(g).unwrap().debited, 0);
    }

    #[test]
    fn test_generations_are_isolated() {
        let mut f = ledger();
        let g0 = f.open(0);
        let g1 = f.open(0);
        f.fund(g0, 10).unwrap();
        f.fund(g1, 20).unwrap();
        assert!(f.debit(g0, 15).is_err());
        f.debit(g1, 15).unwrap();
        assert_eq!(f.reserve(g0).unwrap().available(), 10);
        assert_eq!(f.reserve(g1).unwrap().available(), 5);
    }

    #[test]
    fn test_unknown_generation() {
        let mut f = ledger();
        assert!(matches!(
            f.fund(3, 1),
            Err(DistributorError::State(StateError::ProgramNotFound(_)))
        ));
    }
}
