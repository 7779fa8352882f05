//! Reward index advance - O(1) time-weighted streaming
//!
//! The stream emits `reward_per_day / SECONDS_PER_DAY` per second while the
//! pool holds a non-zero participating supply. Instead of crediting each
//! participant, a single cumulative index is advanced by
//! `reward_per_share * elapsed`; participants settle against it lazily.
//!
//! ## Key Properties
//!
//! - **O(1) complexity**: no iteration over participants
//! - **Monotonic index**: the index never decreases
//! - **Bounded emission**: every rate is floored, so the sum owed to all
//!   participants never exceeds `reward_per_day * active_seconds / SECONDS_PER_DAY`
//! - **Idle tail**: time with zero supply pushes `end_timestamp` forward instead
//!   of being paid retroactively
//! - **Frozen after finish**: once `end_timestamp` is reached nothing moves

use crate::accrual::state::{Accrual, SECONDS_PER_DAY};
use primitive_types::U256;

use crate::accrual::wad::{MathError, Wad};

/// Outcome of a single index update
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexAdvance {
    /// Seconds of stream accounted into the index
    pub accrued_seconds: u64,

    /// Seconds with zero supply pushed onto the tail of the stream
    pub idle_seconds: u64,

    /// Increase of `reward_index`
    pub index_delta: Wad,

    /// Whether this update is the one that finished the program
    pub finished_now: bool,
}

/// Advance the cumulative index to `now`
///
/// Performs, in O(1):
/// 1. No-op if finished or `now <= last_updated_timestamp` (monotone clamp)
/// 2. Zero supply: extend `end_timestamp` by the idle interval, index unchanged
/// 3. Otherwise: `t = min(now, end)`, `index += reward_per_share * (t - last)`
/// 4. `is_finished = (t == end)`
///
/// The state is only written once every step has succeeded.
///
/// # Errors
/// `Overflow` if the index or the extended end does not fit
pub fn update_index(a: &mut Accrual, now: u64) -> Result<IndexAdvance, MathError> {
    if a.is_finished || now <= a.last_updated_timestamp {
        return Ok(IndexAdvance::default());
    }

    let mut next = *a;
    let mut advance = IndexAdvance::default();

    if next.scaled_total_supply == 0 {
        let idle = now - next.last_updated_timestamp;
        next.end_timestamp = next
            .end_timestamp
            .checked_add(idle)
            .ok_or(MathError::Overflow)?;
        next.last_updated_timestamp = now;
        advance.idle_seconds = idle;
    } else {
        let t = core::cmp::min(now, next.end_timestamp);
        let elapsed = t - next.last_updated_timestamp;
        let delta = next.reward_per_share.checked_mul_int(elapsed)?;
        next.reward_index = next.reward_index.checked_add(delta)?;
        next.last_updated_timestamp = t;
        advance.accrued_seconds = elapsed;
        advance.index_delta = delta;
    }

    if next.last_updated_timestamp == next.end_timestamp {
        next.is_finished = true;
        advance.finished_now = true;
    }

    *a = next;
    Ok(advance)
}

/// Recompute the per-second reward per unit of supply
///
/// `reward_per_share = reward_per_day * WAD / (SECONDS_PER_DAY * supply)`,
/// a single floor at 256 bits. Any supply from 1 up to `u128::MAX` yields a
/// representable rate; zero supply pauses the stream with a zero rate.
pub fn recompute_reward_per_share(a: &mut Accrual) -> Result<(), MathError> {
    if a.scaled_total_supply == 0 {
        a.reward_per_share = Wad::ZERO;
        return Ok(());
    }
    let denom = U256::from(SECONDS_PER_DAY) * U256::from(a.scaled_total_supply);
    a.reward_per_share = Wad::ratio_wide(a.reward_per_day, denom)?;
    Ok(())
}

/// Replace one participant's contribution to the supply and re-derive the rate
///
/// `supply = supply - old_balance + new_balance`. Callers must have advanced
/// the index to the current time first, so the old rate covers exactly the
/// interval during which the old supply held.
///
/// # Errors
/// - `Underflow` if `old_balance` exceeds the tracked supply
/// - `Overflow` if the new supply does not fit
pub fn apply_supply_change(
    a: &mut Accrual,
    old_balance: u128,
    new_balance: u128,
) -> Result<(), MathError> {
    if old_balance == new_balance {
        return Ok(());
    }
    let mut next = *a;
    next.scaled_total_supply = next
        .scaled_total_supply
        .checked_sub(old_balance)
        .ok_or(MathError::Underflow)?
        .checked_add(new_balance)
        .ok_or(MathError::Overflow)?;
    recompute_reward_per_share(&mut next)?;
    *a = next;
    Ok(())
}

/// Index the program would have at `now`, without touching the stored state
#[inline]
pub fn preview_index(a: &Accrual, now: u64) -> Result<Wad, MathError> {
    let mut copy = *a;
    update_index(&mut copy, now)?;
    Ok(copy.reward_index)
}
