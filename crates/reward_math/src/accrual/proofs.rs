//! Kani harnesses for the accrual core
//!
//! Run with: cargo kani -p reward_math
//!
//! - A1: index is monotone under update_index
//! - A2: finished programs are frozen
//! - A3: settlement is idempotent at a fixed index
//! - A4: a single holder never receives more than the emission
//! - A5: zero balance never earns

use super::*;

fn bounded_program() -> Accrual {
    let total: u128 = kani::any();
    let per_day: u128 = kani::any();
    let supply: u128 = kani::any();
    kani::assume(per_day > 0 && per_day <= 1_000_000);
    kani::assume(total >= per_day && total <= 100_000_000);
    kani::assume(supply <= 1_000_000_000);
    Accrual::new(total, per_day, 0, supply).unwrap()
}

#[kani::proof]
#[kani::unwind(130)]
fn a1_index_monotone() {
    let mut p = bounded_program();
    let t1: u64 = kani::any();
    let t2: u64 = kani::any();
    kani::assume(t1 <= t2 && t2 <= 10_000_000);

    update_index(&mut p, t1).unwrap();
    let i1 = p.reward_index;
    update_index(&mut p, t2).unwrap();
    assert!(p.reward_index >= i1);
}

#[kani::proof]
#[kani::unwind(130)]
fn a2_finished_is_frozen() {
    let mut p = bounded_program();
    kani::assume(p.scaled_total_supply > 0);
    update_index(&mut p, p.end_timestamp).unwrap();
    assert!(p.is_finished);

    let frozen = p;
    let later: u64 = kani::any();
    update_index(&mut p, later).unwrap();
    assert!(p == frozen);
}

#[kani::proof]
#[kani::unwind(130)]
fn a3_settle_idempotent() {
    let mut r = ParticipantRecord::new(0);
    r.old_balance = kani::any();
    kani::assume(r.old_balance <= 1_000_000_000);
    let raw: u128 = kani::any();
    kani::assume(raw <= 1u128 << 100);
    let index = Wad::from(raw);

    if settle_participant(&mut r, index).is_ok() {
        let before = r.fixed_reward;
        assert!(settle_participant(&mut r, index) == Ok(0));
        assert!(r.fixed_reward == before);
    }
}

#[kani::proof]
#[kani::unwind(130)]
fn a4_single_holder_bounded_by_emission() {
    let mut p = Accrual::new(10_000, 1_000, 0, 0).unwrap();
    let mut r = ParticipantRecord::new(0);
    let balance: u128 = kani::any();
    let now: u64 = kani::any();
    kani::assume(balance > 0 && balance <= 1_000_000_000);

    touch(&mut p, &mut r, balance, 0).unwrap();
    touch(&mut p, &mut r, balance, now).unwrap();
    assert!(r.fixed_reward <= p.total_reward);
}

#[kani::proof]
#[kani::unwind(130)]
fn a5_zero_balance_never_earns() {
    let mut p = bounded_program();
    let mut r = ParticipantRecord::new(0);
    let now: u64 = kani::any();
    kani::assume(now <= 10_000_000);

    if touch(&mut p, &mut r, 0, now).is_ok() {
        assert!(r.fixed_reward == 0);
    }
}
