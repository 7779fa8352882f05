//! Scenario tests for the incentives distributor
//! Run with: cargo test

use incentives::*;

const DAY: u64 = SECONDS_PER_DAY;

const ADMIN: Address = Address([1; 32]);
const LENDER: Address = Address([2; 32]);
const SECOND: Address = Address([3; 32]);
const LATE: Address = Address([4; 32]);
const TOKEN: Address = Address([10; 32]);

fn engine() -> RewardDistributor<AdminList, InMemoryCustody> {
    let custody = InMemoryCustody::new();
    custody.mint(ADMIN, TOKEN, 1_000_000_000);
    RewardDistributor::new(AdminList::new([ADMIN]), custody)
}

fn key() -> ProgramKey {
    ProgramKey::new(PoolId(1), Role::Lender)
}

fn setup(e: &RewardDistributor<AdminList, InMemoryCustody>, total: u128, per_day: u128, now: u64) {
    e.setup_bucket(
        &ADMIN,
        ProgramParams {
            key: key(),
            reward_token: TOKEN,
            total_reward: total,
            reward_per_day: per_day,
        },
        now,
    )
    .unwrap();
}

/// floor(per_day * WAD / (86400 * supply)), computed without the library
fn rate(per_day: u128, supply: u128) -> u128 {
    per_day * WAD / (SECONDS_PER_DAY as u128 * supply)
}

#[test]
fn test_reference_scenario_bit_exact() {
    let e = engine();
    setup(&e, 10_000, 1_000, 0);

    // Nobody in the pool for two days: the end moves out by two days
    e.on_balance_change(&key(), &LENDER, 50, 2 * DAY).unwrap();
    let p = e.get_program(&key()).unwrap().unwrap();
    assert_eq!(p.end_timestamp(), 12 * DAY);
    assert_eq!(p.reward_index(), Wad::ZERO);
    assert_eq!(p.accrual.reward_per_share, Wad::from(rate(1_000, 50)));
    assert_eq!(p.accrual.reward_per_share, Wad::from(231_481_481_481_481));

    // Second depositor one day later
    e.on_balance_change(&key(), &SECOND, 150, 3 * DAY).unwrap();
    let p = e.get_program(&key()).unwrap().unwrap();
    let index_3 = rate(1_000, 50) * DAY as u128;
    assert_eq!(p.reward_index(), Wad::from(index_3));
    assert_eq!(p.accrual.scaled_total_supply, 200);
    assert_eq!(p.accrual.reward_per_share, Wad::from(rate(1_000, 200)));

    // Lender withdraws 50/3 one more day later
    let withdrawn = 50 / 3;
    e.on_balance_change(&key(), &LENDER, 50 - withdrawn, 4 * DAY).unwrap();
    let p = e.get_program(&key()).unwrap().unwrap();
    let index_4 = index_3 + rate(1_000, 200) * DAY as u128;
    assert_eq!(p.reward_index(), Wad::from(index_4));
    assert_eq!(p.accrual.scaled_total_supply, 200 - withdrawn);

    let rec = e.get_participant_record(&key(), &LENDER).unwrap().unwrap();
    assert_eq!(rec.old_balance, 34);
    assert_eq!(rec.last_updated_reward_index, Wad::from(index_4));
    assert_eq!(rec.fixed_reward, 50 * index_4 / WAD);
    assert_eq!(rec.fixed_reward, 1_249);

    assert_eq!(
        e.get_claimable(&key(), &SECOND, 4 * DAY).unwrap(),
        150 * (index_4 - index_3) / WAD
    );
}

#[test]
fn test_double_setup_rejected() {
    let e = engine();
    setup(&e, 10_000, 1_000, 0);
    e.on_balance_change(&key(), &LENDER, 10, 0).unwrap();

    let err = e
        .setup_bucket(
            &ADMIN,
            ProgramParams {
                key: key(),
                reward_token: TOKEN,
                total_reward: 5_000,
                reward_per_day: 1_000,
            },
            9 * DAY,
        )
        .unwrap_err();
    assert_eq!(err, DistributorError::State(StateError::ProgramAlreadyActive(key())));
    assert_eq!(e.get_program(&key()).unwrap().unwrap().accrual.total_reward, 10_000);
}

#[test]
fn test_finish_and_late_joiner() {
    let e = engine();
    setup(&e, 1_000, 1_000, 0);
    e.on_balance_change(&key(), &LENDER, 100, 0).unwrap();

    e.on_balance_change(&key(), &LATE, 500, 2 * DAY).unwrap();
    let p = e.get_program(&key()).unwrap().unwrap();
    assert!(p.is_finished());
    assert_eq!(p.accrual.last_updated_timestamp, DAY);

    for now in [2 * DAY, 5 * DAY, 100 * DAY] {
        assert_eq!(e.get_claimable(&key(), &LATE, now).unwrap(), 0);
    }
    assert_eq!(e.claim_reward(&LATE, &[key()], 6 * DAY).unwrap_err(), DistributorError::ZeroClaim);

    // Frozen: the original holder earned exactly one day
    assert_eq!(e.claim_reward(&LENDER, &[key()], 100 * DAY).unwrap().total(), 999);
}

#[test]
fn test_no_retroactive_credit() {
    let e = engine();
    setup(&e, 10_000, 1_000, 0);
    e.on_balance_change(&key(), &LENDER, 100, 0).unwrap();

    e.on_balance_change(&key(), &SECOND, 100, 5 * DAY).unwrap();
    assert_eq!(e.get_claimable(&key(), &SECOND, 5 * DAY).unwrap(), 0);

    // Earns only from its own deposit onwards
    let expected = 100 * (rate(1_000, 200) * DAY as u128) / WAD;
    assert_eq!(e.get_claimable(&key(), &SECOND, 6 * DAY).unwrap(), expected);
}

#[test]
fn test_claim_idempotence() {
    let e = engine();
    setup(&e, 10_000, 1_000, 0);
    e.on_balance_change(&key(), &LENDER, 100, 0).unwrap();

    let first = e.claim_reward(&LENDER, &[key()], 3 * DAY).unwrap();
    assert!(first.total() > 0);
    assert_eq!(e.claim_reward(&LENDER, &[key()], 3 * DAY).unwrap_err(), DistributorError::ZeroClaim);
    assert_eq!(e.get_claimable(&key(), &LENDER, 3 * DAY).unwrap(), 0);
    assert_eq!(e.custody().balance_of(&LENDER, &TOKEN), first.total());
}

#[test]
fn test_transfer_neutrality() {
    // Same supply throughout; one book moves 30 shares after a day
    let held = engine();
    setup(&held, 10_000, 1_000, 0);
    held.on_balance_change(&key(), &LENDER, 100, 0).unwrap();

    let moved = engine();
    setup(&moved, 10_000, 1_000, 0);
    moved.on_balance_change(&key(), &LENDER, 100, 0).unwrap();
    moved.on_transfer(&key(), &LENDER, 70, &SECOND, 30, DAY).unwrap();

    let total_held = held.get_claimable(&key(), &LENDER, 2 * DAY).unwrap();
    let total_moved = moved.get_claimable(&key(), &LENDER, 2 * DAY).unwrap()
        + moved.get_claimable(&key(), &SECOND, 2 * DAY).unwrap();
    // Only per-participant flooring differs
    assert!(total_held.abs_diff(total_moved) <= 2, "{} vs {}", total_held, total_moved);

    let a = held.get_program(&key()).unwrap().unwrap();
    let b = moved.get_program(&key()).unwrap().unwrap();
    assert_eq!(a.accrual.scaled_total_supply, b.accrual.scaled_total_supply);

    let second = rate(1_000, 100) * DAY as u128;
    assert_eq!(moved.get_claimable(&key(), &SECOND, 2 * DAY).unwrap(), 30 * second / WAD);
}

#[test]
fn test_successor_pays_existing_holders_without_touch() {
    let e = engine();
    setup(&e, 1_000, 1_000, 0);
    e.on_balance_change(&key(), &LENDER, 100, 0).unwrap();

    setup(&e, 2_000, 1_000, 3 * DAY);
    let p = e.get_program(&key()).unwrap().unwrap();
    assert_eq!(p.generation, 1);
    assert_eq!(p.status(), ProgramStatus::Created);
    assert_eq!(p.status_at(4 * DAY).unwrap(), ProgramStatus::Accruing);

    // Generation 0 (999) plus one day of generation 1 (999)
    assert_eq!(e.get_claimable(&key(), &LENDER, 4 * DAY).unwrap(), 1_998);
    let receipt = e.claim_reward(&LENDER, &[key()], 4 * DAY).unwrap();
    assert_eq!(receipt.lines.len(), 2);
    assert_eq!(receipt.per_token.get(&TOKEN), Some(&1_998));
}

#[test]
fn test_top_up_authorization() {
    let e = engine();
    setup(&e, 1_000, 1_000, 0);
    let err = e.top_up(&LENDER, &key(), 10, 1).unwrap_err();
    assert_eq!(
        err,
        DistributorError::Authorization(AuthorizationError::Unauthorized {
            caller: LENDER,
            action: Action::TopUp,
        })
    );
    assert_eq!(e.get_reserve(&key(), 0).unwrap().unwrap().funded, 1_000);
    assert_eq!(e.top_up(&ADMIN, &key(), 10, 1).unwrap().funded, 1_010);
}

#[test]
fn test_batch_length_mismatch() {
    let e = engine();
    setup(&e, 1_000, 1_000, 0);
    let err = e
        .claim_reward_batch(&LENDER, &[PoolId(1), PoolId(2)], &[Role::Lender], DAY)
        .unwrap_err();
    assert!(matches!(
        err,
        DistributorError::Validation(ValidationError::LengthMismatch { expected: 2, got: 1, .. })
    ));
}

#[test]
fn test_batch_claim_across_roles() {
    let e = engine();
    let trader = ProgramKey::new(PoolId(1), Role::Trader);
    e.setup_buckets(
        &ADMIN,
        &[PoolId(1), PoolId(1)],
        &[Role::Lender, Role::Trader],
        &[1_000, 1_000],
        &[1_000, 1_000],
        &[TOKEN, TOKEN],
        0,
    )
    .unwrap();
    e.on_balance_change(&key(), &LENDER, 100, 0).unwrap();
    e.on_balance_change(&trader, &LENDER, 7, 0).unwrap();

    let receipt = e
        .claim_reward_batch(&LENDER, &[PoolId(1), PoolId(1)], &[Role::Lender, Role::Trader], DAY)
        .unwrap();
    let expected_trader = 7 * (rate(1_000, 7) * DAY as u128) / WAD;
    assert_eq!(receipt.total(), 999 + expected_trader);
    assert_eq!(e.custody().balance_of(&LENDER, &TOKEN), receipt.total());
}

#[test]
fn test_conservation_many_holders() {
    let e = engine();
    setup(&e, 10_000, 1_000, 0);
    let holders: Vec<Address> = (0..20u8).map(|i| Address([50 + i; 32])).collect();

    for (i, h) in holders.iter().enumerate() {
        e.on_balance_change(&key(), h, 1 + i as u128 * 13, i as u64 * 3_600).unwrap();
    }
    for (i, h) in holders.iter().enumerate().filter(|(i, _)| i % 3 == 0) {
        e.on_balance_change(&key(), h, 0, 4 * DAY + i as u64).unwrap();
    }

    let mut paid = 0;
    for h in &holders {
        if let Ok(r) = e.claim_reward(h, &[key()], 20 * DAY) {
            paid += r.total();
        }
    }
    assert!(paid <= 10_000);
    assert!(e.get_program(&key()).unwrap().unwrap().is_finished());
    assert_eq!(e.get_reserve(&key(), 0).unwrap().unwrap().debited, paid);
}

#[test]
fn test_dust_holder_with_18_decimal_rewards() {
    let e = engine();
    e.custody().mint(ADMIN, TOKEN, 1_000_000 * WAD);
    setup(&e, 1_000_000 * WAD, 100_000 * WAD, 0);

    // A single wei of supply pushes the per-second rate past 2^128
    e.on_balance_change(&key(), &LENDER, 1, 0).unwrap();
    e.on_balance_change(&key(), &SECOND, 10 * WAD, DAY).unwrap();
    let p = e.get_program(&key()).unwrap().unwrap();
    assert!(p.reward_index().raw() > U256::from(u128::MAX));

    e.on_balance_change(&key(), &LENDER, 0, 2 * DAY).unwrap();
    let receipt = e.claim_reward(&LENDER, &[key()], 2 * DAY).unwrap();
    // Whole first day plus a 1e-19 share of the second, floored once
    assert_eq!(receipt.total(), 100_000 * WAD + 9_999);

    let second = e.get_claimable(&key(), &SECOND, 2 * DAY).unwrap();
    assert_eq!(second, 99_999_999_999_999_999_360_000);
    assert!(receipt.total() + second <= 200_000 * WAD);
}

#[test]
fn test_successor_over_dust_supply_is_funded_exactly() {
    let e = engine();
    let huge = 100_000_000 * WAD;
    e.custody().mint(ADMIN, TOKEN, huge);
    setup(&e, 1_000, 1_000, 0);
    e.on_balance_change(&key(), &LENDER, 1, 0).unwrap();

    let before = e.custody().balance_of(&ADMIN, &TOKEN);
    setup(&e, huge, huge, 3 * DAY);
    assert_eq!(e.custody().balance_of(&ADMIN, &TOKEN), before - huge);

    let p = e.get_program(&key()).unwrap().unwrap();
    assert_eq!(p.generation, 1);
    assert_eq!(p.accrual.scaled_total_supply, 1);
    assert_eq!(e.get_reserve(&key(), 1).unwrap().unwrap().funded, huge);

    let receipt = e.claim_reward(&LENDER, &[key()], 4 * DAY).unwrap();
    assert_eq!(receipt.total(), 999 + huge - 1);
}

#[test]
fn test_rejected_successor_collects_nothing() {
    let e = engine();
    setup(&e, 1_000, 1_000, 0);
    e.on_balance_change(&key(), &LENDER, 1, 0).unwrap();
    let before = e.custody().balance_of(&ADMIN, &TOKEN);

    // Finished predecessor, but the successor's end does not fit a timestamp
    let err = e
        .setup_bucket(
            &ADMIN,
            ProgramParams {
                key: key(),
                reward_token: TOKEN,
                total_reward: 2_000,
                reward_per_day: 1_000,
            },
            u64::MAX - DAY,
        )
        .unwrap_err();
    assert_eq!(err, DistributorError::Math(MathError::Overflow));
    assert_eq!(e.custody().balance_of(&ADMIN, &TOKEN), before);
    assert_eq!(e.get_program(&key()).unwrap().unwrap().generation, 0);
    assert_eq!(e.get_reserve(&key(), 1).unwrap(), None);
}
