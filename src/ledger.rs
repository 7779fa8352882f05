//! Participant ledger - pre-mutation balance hook and reward snapshots
//!
//! The ledger must see every balance change of the share token *before* the
//! token writes the new balance: the snapshot needs the balance that held
//! during the interval being settled. A hook called after the write would pay
//! the interval on the wrong balance and break conservation.
//!
//! Records are created lazily on first touch and never removed. A key may host
//! several program generations over time; a record that still points at a
//! finished generation is rolled forward on its next touch, settling what it
//! earned in each generation it skipped.

use std::collections::{BTreeMap, HashMap};

use reward_math::accrual::{
    project_claimable, settle_participant, touch, Accrual, MathError, ParticipantRecord,
    TouchOutcome, Wad,
};

use crate::error::Result;
use crate::registry::RewardProgram;
use crate::types::Address;

/// Stored state of one participant on one key
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ParticipantEntry {
    pub record: ParticipantRecord,
    /// Unclaimed reward settled out of finished generations, by generation
    pub carried: BTreeMap<u32, u128>,
}

impl ParticipantEntry {
    fn new(generation: u32) -> Self {
        ParticipantEntry {
            record: ParticipantRecord::new(generation),
            carried: BTreeMap::new(),
        }
    }
}

/// Result of a prepared (not yet committed) touch
#[derive(Clone, Debug)]
pub(crate) struct Touched {
    pub participant: Address,
    pub accrual: Accrual,
    pub entry: ParticipantEntry,
    pub outcome: TouchOutcome,
}

/// Participant records of one program key
#[derive(Clone, Debug, Default)]
pub struct ParticipantLedger {
    entries: HashMap<Address, ParticipantEntry>,
}

impl ParticipantLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the stored record, as last written
    pub fn record(&self, participant: &Address) -> Option<ParticipantRecord> {
        self.entries.get(participant).map(|e| e.record)
    }

    pub(crate) fn entry(&self, participant: &Address) -> Option<&ParticipantEntry> {
        self.entries.get(participant)
    }

    /// Stored entry brought forward to the current generation
    ///
    /// Every finished generation the record skipped is settled against its
    /// final index and parked in `carried`. Pure: works on a copy.
    pub(crate) fn rolled_entry(
        &self,
        programs: &[RewardProgram],
        participant: &Address,
    ) -> Result<ParticipantEntry> {
        let current = current_generation(programs);
        let mut entry = self
            .entries
            .get(participant)
            .cloned()
            .unwrap_or_else(|| ParticipantEntry::new(current));

        while entry.record.needs_rollover(current) {
            let generation = entry.record.generation;
            let finished = &programs[generation as usize];
            settle_participant(&mut entry.record, finished.accrual.reward_index)?;

            if entry.record.fixed_reward > 0 {
                let slot = entry.carried.entry(generation).or_insert(0);
                *slot = slot
                    .checked_add(entry.record.fixed_reward)
                    .ok_or(MathError::Overflow)?;
            }
            log::debug!(
                "{}: rolled {} from gen {} (carried {})",
                participant,
                finished.key,
                generation,
                entry.record.fixed_reward
            );

            entry.record.fixed_reward = 0;
            entry.record.last_updated_reward_index = Wad::ZERO;
            entry.record.generation = generation + 1;
        }
        Ok(entry)
    }

    /// Compute the effect of a balance change without storing it
    ///
    /// `accrual` is the working copy of the current program; pass the
    /// `accrual` of a previous `Touched` to chain several legs atomically.
    pub(crate) fn prepare_touch(
        &self,
        programs: &[RewardProgram],
        accrual: Accrual,
        participant: &Address,
        new_balance: u128,
        now: u64,
    ) -> Result<Touched> {
        let mut entry = self.rolled_entry(programs, participant)?;
        let mut accrual = accrual;
        let outcome = touch(&mut accrual, &mut entry.record, new_balance, now)?;
        Ok(Touched {
            participant: *participant,
            accrual,
            entry,
            outcome,
        })
    }

    /// Store the participant half of a prepared touch
    pub(crate) fn commit_entry(&mut self, participant: Address, entry: ParticipantEntry) {
        self.entries.insert(participant, entry);
    }

    /// Unclaimed reward the participant would hold after a touch at `now`
    pub fn claimable(
        &self,
        programs: &[RewardProgram],
        participant: &Address,
        now: u64,
    ) -> Result<u128> {
        let Some(current) = programs.last() else {
            return Ok(0);
        };
        if !self.entries.contains_key(participant) {
            return Ok(0);
        }
        let entry = self.rolled_entry(programs, participant)?;
        let live = project_claimable(&current.accrual, &entry.record, now)?;
        let carried = entry
            .carried
            .values()
            .try_fold(0u128, |acc, v| acc.checked_add(*v))
            .ok_or(MathError::Overflow)?;
        Ok(live.checked_add(carried).ok_or(MathError::Overflow)?)
    }
}

fn current_generation(programs: &[RewardProgram]) -> u32 {
    programs.len().saturating_sub(1) as u32
}
