//! Claim processing across several programs
//!
//! A claim is two-phase. `prepare` settles the participant in every requested
//! book on copies and checks each reserve can cover its share; nothing is
//! written. Only when the aggregate is non-zero and every book prepared
//! cleanly does `commit` store the copies and debit the reserves. The caller
//! holds the locks of all books for the whole sequence.

use std::collections::BTreeMap;

use reward_math::accrual::Accrual;

use crate::error::{DistributorError, Result};
use crate::ledger::ParticipantEntry;
use crate::registry::ProgramBook;
use crate::types::{Address, ProgramKey};

/// One payout line: a generation of a key, paid in its token
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClaimLine {
    pub key: ProgramKey,
    pub generation: u32,
    pub reward_token: Address,
    pub amount: u128,
}

/// What a successful claim paid
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub participant: Address,
    pub lines: Vec<ClaimLine>,
    /// Aggregate per reward token, as credited to the payout sink
    pub per_token: BTreeMap<Address, u128>,
}

impl ClaimReceipt {
    /// Sum over every line (tokens mixed; only meaningful for a single token)
    pub fn total(&self) -> u128 {
        self.lines.iter().map(|l| l.amount).sum()
    }
}

/// Settled-but-uncommitted claim on one book
#[derive(Clone, Debug)]
pub(crate) struct PreparedClaim {
    accrual: Accrual,
    entry: ParticipantEntry,
    lines: Vec<ClaimLine>,
}

impl PreparedClaim {
    pub fn amount(&self) -> u128 {
        self.lines.iter().map(|l| l.amount).sum()
    }
}

pub(crate) struct ClaimProcessor;

impl ClaimProcessor {
    /// Settle `participant` at their unchanged balance and collect payouts
    ///
    /// Returns `None` when the book has no program or the participant has no
    /// record; such books contribute nothing.
    pub fn prepare(book: &ProgramBook, participant: &Address, now: u64) -> Result<Option<PreparedClaim>> {
        let Some(current) = book.current() else {
            return Ok(None);
        };
        if book.participants.entry(participant).is_none() {
            return Ok(None);
        }

        let balance = book
            .participants
            .record(participant)
            .map(|r| r.old_balance)
            .unwrap_or(0);
        let touched = book.participants.prepare_touch(
            &book.programs,
            current.accrual,
            participant,
            balance,
            now,
        )?;
        let mut entry = touched.entry;

        let mut lines = Vec::new();
        for (generation, amount) in std::mem::take(&mut entry.carried) {
            if amount == 0 {
                continue;
            }
            let program = book
                .generation(generation)
                .ok_or(crate::error::StateError::ProgramNotFound(book.key()))?;
            book.funding.check_debit(generation, amount)?;
            lines.push(ClaimLine {
                key: book.key(),
                generation,
                reward_token: program.reward_token,
                amount,
            });
        }

        let live = std::mem::take(&mut entry.record.fixed_reward);
        if live > 0 {
            book.funding.check_debit(current.generation, live)?;
            lines.push(ClaimLine {
                key: book.key(),
                generation: current.generation,
                reward_token: current.reward_token,
                amount: live,
            });
        }

        Ok(Some(PreparedClaim {
            accrual: touched.accrual,
            entry,
            lines,
        }))
    }

    /// Store a prepared claim; `prepare` already checked every debit
    pub fn commit(book: &mut ProgramBook, participant: Address, prepared: PreparedClaim) -> Result<Vec<ClaimLine>> {
        for line in &prepared.lines {
            book.funding.debit(line.generation, line.amount)?;
        }
        if let Some(current) = book.current_mut() {
            let was_finished = current.accrual.is_finished;
            current.accrual = prepared.accrual;
            if !was_finished && current.accrual.is_finished {
                log::info!("{} gen {} finished", current.key, current.generation);
            }
        }
        book.participants.commit_entry(participant, prepared.entry);
        Ok(prepared.lines)
    }

    /// Aggregate prepared claims into a receipt, rejecting an all-zero batch
    pub fn receipt(participant: Address, lines: Vec<ClaimLine>) -> Result<ClaimReceipt> {
        let mut per_token = BTreeMap::new();
        for line in &lines {
            let slot = per_token.entry(line.reward_token).or_insert(0u128);
            *slot = slot
                .checked_add(line.amount)
                .ok_or(reward_math::accrual::MathError::Overflow)?;
        }
        if per_token.values().all(|v| *v == 0) {
            return Err(DistributorError::ZeroClaim);
        }
        Ok(ClaimReceipt {
            participant,
            lines,
            per_token,
        })
    }
}
