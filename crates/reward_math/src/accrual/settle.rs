//! Lazy participant settlement
//!
//! A participant's reward is only computed when they are touched: on a
//! balance change, on a claim, or for a read-only projection. Settlement is
//! O(1) and idempotent for a fixed index.

use crate::accrual::index::{apply_supply_change, update_index, IndexAdvance};
use crate::accrual::state::{Accrual, ParticipantRecord};
use crate::accrual::wad::{MathError, Wad};

/// Outcome of touching a participant
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TouchOutcome {
    /// Index movement caused by bringing the program to `now`
    pub advance: IndexAdvance,

    /// Reward settled into `fixed_reward` by this touch
    pub settled: u128,
}

/// Reward earned since the record's last snapshot, at `index`
///
/// `old_balance * (index - last_updated_reward_index) / WAD`, floored.
#[inline]
pub fn pending_since(record: &ParticipantRecord, index: Wad) -> Result<u128, MathError> {
    if record.old_balance == 0 {
        return Ok(0);
    }
    index
        .saturating_sub(record.last_updated_reward_index)
        .mul_amount(record.old_balance)
}

/// Move pending reward at `index` into `fixed_reward` and re-snapshot
///
/// Returns the settled amount. Calling twice with the same index settles 0 the
/// second time.
pub fn settle_participant(record: &mut ParticipantRecord, index: Wad) -> Result<u128, MathError> {
    let pending = pending_since(record, index)?;
    let fixed = record
        .fixed_reward
        .checked_add(pending)
        .ok_or(MathError::Overflow)?;
    record.fixed_reward = fixed;
    record.last_updated_reward_index = index;
    Ok(pending)
}

/// Full pre-mutation hook for one participant of one program
///
/// Steps, in order:
/// 1. Advance the program index to `now`
/// 2. Replace the participant's contribution to supply (`old -> new`) and
///    re-derive the rate
/// 3. Settle `old_balance` against the (unchanged-by-step-2) index
/// 4. `old_balance = new_balance`
///
/// Both structures are written only after every step succeeded.
pub fn touch(
    program: &mut Accrual,
    record: &mut ParticipantRecord,
    new_balance: u128,
    now: u64,
) -> Result<TouchOutcome, MathError> {
    let mut next_program = *program;
    let mut next_record = *record;

    let advance = update_index(&mut next_program, now)?;
    apply_supply_change(&mut next_program, next_record.old_balance, new_balance)?;
    let settled = settle_participant(&mut next_record, next_program.reward_index)?;
    next_record.old_balance = new_balance;

    *program = next_program;
    *record = next_record;
    Ok(TouchOutcome { advance, settled })
}

/// `fixed_reward` the participant would hold after a touch at `now`
///
/// Pure: neither the program nor the record is modified.
pub fn project_claimable(
    program: &Accrual,
    record: &ParticipantRecord,
    now: u64,
) -> Result<u128, MathError> {
    let index = crate::accrual::index::preview_index(program, now)?;
    let pending = pending_since(record, index)?;
    record
        .fixed_reward
        .checked_add(pending)
        .ok_or(MathError::Overflow)
}
