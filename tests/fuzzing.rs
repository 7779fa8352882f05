//! Property tests for the incentives distributor
//! Run with: cargo test --test fuzzing
//!
//! These tests use proptest to generate random schedules and balance
//! histories and verify the accrual invariants hold.

use incentives::*;
use proptest::prelude::*;

const DAY: u64 = SECONDS_PER_DAY;
const ADMIN: Address = Address([1; 32]);
const TOKEN: Address = Address([9; 32]);

fn key() -> ProgramKey {
    ProgramKey::new(PoolId(3), Role::Trader)
}

fn engine_with(total: u128, per_day: u128) -> RewardDistributor<AdminList, InMemoryCustody> {
    let custody = InMemoryCustody::new();
    custody.mint(ADMIN, TOKEN, total);
    let e = RewardDistributor::new(AdminList::new([ADMIN]), custody);
    e.setup_bucket(
        &ADMIN,
        ProgramParams {
            key: key(),
            reward_token: TOKEN,
            total_reward: total,
            reward_per_day: per_day,
        },
        0,
    )
    .unwrap();
    e
}

// Strategy for reward schedules: (reward_per_day, days)
fn schedule_strategy() -> impl Strategy<Value = (u128, u128)> {
    (1u128..10_000_000_000, 1u128..30)
}

// Strategy for balances, including empty pools
fn balance_strategy() -> impl Strategy<Value = u128> {
    prop_oneof![Just(0u128), 1u128..1_000_000_000_000_000_000_000]
}

// Strategy for a balance event: (holder, new balance, seconds since previous event)
fn event_strategy() -> impl Strategy<Value = (u8, u128, u64)> {
    (0u8..4, balance_strategy(), 0u64..2 * DAY)
}

// The index never decreases, whatever the balance history
proptest! {
    #[test]
    fn fuzz_index_monotonic(
        (per_day, days) in schedule_strategy(),
        events in prop::collection::vec(event_strategy(), 1..40)
    ) {
        let e = engine_with(per_day * days, per_day);
        let mut now = 0;
        let mut last = Wad::ZERO;

        for (holder, balance, dt) in events {
            now += dt;
            e.on_balance_change(&key(), &Address([holder + 10; 32]), balance, now).unwrap();
            let p = e.get_program(&key()).unwrap().unwrap();
            prop_assert!(p.reward_index() >= last);
            prop_assert!(p.accrual.last_updated_timestamp <= p.end_timestamp());
            last = p.reward_index();
        }
    }
}

// Everything paid out never exceeds the total reward
proptest! {
    #[test]
    fn fuzz_conservation(
        (per_day, days) in schedule_strategy(),
        events in prop::collection::vec(event_strategy(), 1..40),
        claim_at in 0u64..60 * DAY
    ) {
        let total = per_day * days;
        let e = engine_with(total, per_day);
        let mut now = 0;
        for (holder, balance, dt) in events {
            now += dt;
            e.on_balance_change(&key(), &Address([holder + 10; 32]), balance, now).unwrap();
        }

        let at = now + claim_at;
        let mut paid = 0u128;
        for holder in 0u8..4 {
            match e.claim_reward(&Address([holder + 10; 32]), &[key()], at) {
                Ok(r) => paid += r.total(),
                Err(DistributorError::ZeroClaim) => {}
                Err(err) => return Err(TestCaseError::fail(err.to_string())),
            }
        }
        prop_assert!(paid <= total);
        prop_assert_eq!(e.custody().balance_of(&ADMIN, &TOKEN), 0);
    }
}

// A holder with zero balance over a window earns nothing for it
proptest! {
    #[test]
    fn fuzz_no_retroactive_credit(
        (per_day, days) in schedule_strategy(),
        incumbent in 1u128..1_000_000_000,
        joiner in 1u128..1_000_000_000,
        join_at in 0u64..40 * DAY
    ) {
        let e = engine_with(per_day * days, per_day);
        let late = Address([20; 32]);
        e.on_balance_change(&key(), &Address([10; 32]), incumbent, 0).unwrap();
        e.on_balance_change(&key(), &late, joiner, join_at).unwrap();

        prop_assert_eq!(e.get_claimable(&key(), &late, join_at).unwrap(), 0);
        let rec = e.get_participant_record(&key(), &late).unwrap().unwrap();
        prop_assert_eq!(rec.fixed_reward, 0);
    }
}

// Moving shares inside the pool never changes the participating supply
proptest! {
    #[test]
    fn fuzz_transfer_keeps_supply(
        (per_day, days) in schedule_strategy(),
        balance in 1u128..1_000_000_000_000,
        moved in 0u128..1_000_000_000_000,
        at in 0u64..20 * DAY
    ) {
        let moved = moved % (balance + 1);
        let e = engine_with(per_day * days, per_day);
        let (a, b) = (Address([10; 32]), Address([11; 32]));
        e.on_balance_change(&key(), &a, balance, 0).unwrap();

        let before = e.get_program(&key()).unwrap().unwrap().accrual.scaled_total_supply;
        e.on_transfer(&key(), &a, balance - moved, &b, moved, at).unwrap();
        let after = e.get_program(&key()).unwrap().unwrap().accrual.scaled_total_supply;
        prop_assert_eq!(before, after);
    }
}

// A second claim at the same instant pays nothing
proptest! {
    #[test]
    fn fuzz_claim_idempotent(
        (per_day, days) in schedule_strategy(),
        balance in 1u128..1_000_000_000,
        at in 1u64..40 * DAY
    ) {
        let e = engine_with(per_day * days, per_day);
        let who = Address([10; 32]);
        e.on_balance_change(&key(), &who, balance, 0).unwrap();

        let _ = e.claim_reward(&who, &[key()], at);
        prop_assert_eq!(e.claim_reward(&who, &[key()], at).unwrap_err(), DistributorError::ZeroClaim);
    }
}
