// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rust_decimal_macros::dec;
use yare::parameterized;

#[test]
fn final_week_collects_full_outstanding() {
    // Three weeks in, one week left: the catch-up floor is the whole balance
    let amount = repayment_amount(dec!(2000.00), dec!(1000.00), dec!(10), 3);
    assert_eq!(amount, dec!(1000.00));
}

#[parameterized(
    floor_binds_week_zero = { 0, dec!(250.00) },
    floor_binds_week_one = { 1, dec!(333.33) },
    floor_binds_week_two = { 2, dec!(500.00) },
    floor_binds_week_three = { 3, dec!(1000.00) },
    floor_binds_past_horizon = { 10, dec!(1000.00) },
)]
fn catch_up_floor_spreads_over_weeks_left(weeks_elapsed: u32, expected: Decimal) {
    // Rate 0 isolates the floor: outstanding / weeks_left
    let amount = repayment_amount(dec!(2000.00), dec!(1000.00), Decimal::ZERO, weeks_elapsed);
    assert_eq!(amount, expected);
}

#[test]
fn standard_rate_binds_when_above_floor() {
    // 5000 * 10% = 500 beats the week-zero floor of 250
    let amount = repayment_amount(dec!(5000.00), dec!(1000.00), dec!(10), 0);
    assert_eq!(amount, dec!(500.00));
}

#[test]
fn collection_never_exceeds_outstanding() {
    let amount = repayment_amount(dec!(50000.00), dec!(1000.00), dec!(10), 0);
    assert_eq!(amount, dec!(1000.00));
}

#[test]
fn decide_collects_when_wallet_covers_amount() {
    let decision = decide(dec!(2000.00), dec!(1000.00), dec!(10), 3);
    assert_eq!(decision, RepaymentDecision::Collect(dec!(1000.00)));
}

#[test]
fn decide_skips_underfunded_wallet() {
    // Required catch-up is 1000 but the wallet only holds 100
    let decision = decide(dec!(100.00), dec!(1000.00), dec!(10), 3);
    assert_eq!(decision, RepaymentDecision::Skip(SkipReason::InsufficientFunds));
}

#[test]
fn decide_skips_when_rounding_leaves_nothing_due() {
    let decision = decide(Decimal::ZERO, dec!(0.01), Decimal::ZERO, 0);
    assert_eq!(decision, RepaymentDecision::Skip(SkipReason::NothingDue));
}

#[test]
fn funded_wallet_clears_within_amortization_horizon() {
    let mut outstanding = dec!(1000.00);
    let mut cycles = 0u32;
    while outstanding > Decimal::ZERO {
        match decide(dec!(100000.00), outstanding, Decimal::ZERO, cycles) {
            RepaymentDecision::Collect(amount) => outstanding -= amount,
            RepaymentDecision::Skip(reason) => panic!("unexpected skip: {reason}"),
        }
        cycles += 1;
        assert!(i64::from(cycles) <= AMORTIZATION_WEEKS, "did not clear in time");
    }
    assert_eq!(i64::from(cycles), AMORTIZATION_WEEKS);
}

// Property-based tests
use proptest::prelude::*;

fn arb_cents(max: i64) -> impl Strategy<Value = Decimal> {
    (1i64..=max).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    #[test]
    fn amount_stays_within_outstanding(
        wallet in arb_cents(100_000_00),
        outstanding in arb_cents(100_000_00),
        rate in 0u32..=100,
        weeks in 0u32..=8,
    ) {
        let amount = repayment_amount(wallet, outstanding, Decimal::from(rate), weeks);
        prop_assert!(amount >= Decimal::ZERO);
        prop_assert!(amount <= outstanding);
    }

    #[test]
    fn last_week_always_demands_the_full_balance(
        wallet in arb_cents(100_000_00),
        outstanding in arb_cents(100_000_00),
        rate in 0u32..=100,
    ) {
        let weeks = u32::try_from(AMORTIZATION_WEEKS - 1).unwrap();
        let amount = repayment_amount(wallet, outstanding, Decimal::from(rate), weeks);
        prop_assert_eq!(amount, outstanding);
    }
}
