//! Program accumulators and participant snapshots for reward accrual
//!
//! This module defines the core data structures for O(1) reward streaming:
//! - `Accrual`: per-program schedule, cumulative index and participating supply
//! - `ParticipantRecord`: per-participant snapshot reconciled lazily on touch

use crate::accrual::wad::{MathError, Wad};

/// Seconds in a day
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Lifecycle of a single program instance
///
/// `Created -> Accruing -> Finished`; nothing leaves `Finished`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProgramStatus {
    /// Set up, no time has been accounted yet
    Created,
    /// At least one index update happened before the end of the stream
    Accruing,
    /// Stream exhausted by time; index frozen
    Finished,
}

/// Per-program accrual state
///
/// # Invariants
/// - `reward_index` is monotone non-decreasing
/// - `start_timestamp <= last_updated_timestamp <= end_timestamp`
/// - `is_finished` implies `last_updated_timestamp == end_timestamp`
/// - `reward_per_share == 0` whenever `scaled_total_supply == 0`
/// - `total_reward` and `reward_per_day` never change after construction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Accrual {
    /// Total reward streamed over the program lifetime (reward token units)
    pub total_reward: u128,

    /// Emission per day while the pool is non-empty
    pub reward_per_day: u128,

    /// Setup time
    pub start_timestamp: u64,

    /// Time up to which `reward_index` has been advanced
    pub last_updated_timestamp: u64,

    /// End of the stream; pushed forward by idle (zero-supply) time
    pub end_timestamp: u64,

    /// Cumulative reward per unit of supply, WAD-scaled
    pub reward_index: Wad,

    /// Current per-second reward per unit of supply, WAD-scaled
    pub reward_per_share: Wad,

    /// Sum of participating balances
    pub scaled_total_supply: u128,

    /// Terminal flag
    pub is_finished: bool,
}

impl Accrual {
    /// Start a new stream at `now`
    ///
    /// `scaled_total_supply` is the participating supply inherited from a
    /// predecessor program on the same key (0 for a fresh key). The rate is
    /// derived from it immediately so inherited holders earn from `now`.
    ///
    /// # Errors
    /// - `DivisionByZero` if `reward_per_day == 0`
    /// - `Overflow` if the end of the stream is not representable
    pub fn new(
        total_reward: u128,
        reward_per_day: u128,
        now: u64,
        scaled_total_supply: u128,
    ) -> Result<Self, MathError> {
        let end_timestamp = schedule_end(now, total_reward, reward_per_day)?;
        let mut accrual = Accrual {
            total_reward,
            reward_per_day,
            start_timestamp: now,
            last_updated_timestamp: now,
            end_timestamp,
            reward_index: Wad::ZERO,
            reward_per_share: Wad::ZERO,
            scaled_total_supply,
            is_finished: false,
        };
        crate::accrual::index::recompute_reward_per_share(&mut accrual)?;
        Ok(accrual)
    }

    /// Current lifecycle state
    #[inline]
    pub fn status(&self) -> ProgramStatus {
        if self.is_finished {
            ProgramStatus::Finished
        } else if self.last_updated_timestamp == self.start_timestamp {
            ProgramStatus::Created
        } else {
            ProgramStatus::Accruing
        }
    }

    /// Seconds of stream left after `last_updated_timestamp`
    #[inline]
    pub fn remaining_seconds(&self) -> u64 {
        self.end_timestamp.saturating_sub(self.last_updated_timestamp)
    }
}

/// Length of a stream in seconds: whole days of `total / per_day`
///
/// # Errors
/// - `DivisionByZero` if `reward_per_day == 0`
/// - `Overflow` if the duration does not fit in a `u64` timestamp
#[inline]
pub fn schedule_duration(total_reward: u128, reward_per_day: u128) -> Result<u64, MathError> {
    if reward_per_day == 0 {
        return Err(MathError::DivisionByZero);
    }
    let days = total_reward / reward_per_day;
    let secs = days
        .checked_mul(SECONDS_PER_DAY as u128)
        .ok_or(MathError::Overflow)?;
    u64::try_from(secs).map_err(|_| MathError::Overflow)
}

/// `start + total / per_day * SECONDS_PER_DAY`
#[inline]
pub fn schedule_end(start: u64, total_reward: u128, reward_per_day: u128) -> Result<u64, MathError> {
    start
        .checked_add(schedule_duration(total_reward, reward_per_day)?)
        .ok_or(MathError::Overflow)
}

/// Per-participant snapshot
///
/// A participant does not follow the index in real time. The record stores
/// the balance and index at the last touch; the next touch settles
/// `old_balance * (index - last_updated_reward_index)` into `fixed_reward`.
///
/// # Invariants
/// - `last_updated_reward_index` <= program `reward_index` of `generation`
/// - `old_balance` is the balance *before* the event that last touched it
/// - `fixed_reward` only grows between claims
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ParticipantRecord {
    /// Balance at last snapshot
    pub old_balance: u128,

    /// Program index at last snapshot
    pub last_updated_reward_index: Wad,

    /// Accrued, unclaimed reward for `generation`
    pub fixed_reward: u128,

    /// Program generation this record was last settled against
    pub generation: u32,
}

impl ParticipantRecord {
    /// Empty record bound to a program generation
    pub const fn new(generation: u32) -> Self {
        ParticipantRecord {
            old_balance: 0,
            last_updated_reward_index: Wad::ZERO,
            fixed_reward: 0,
            generation,
        }
    }

    /// Whether the record lags behind the key's current generation
    #[inline]
    pub fn needs_rollover(&self, current_generation: u32) -> bool {
        self.generation < current_generation
    }
}
