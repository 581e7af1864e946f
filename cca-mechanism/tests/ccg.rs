use approx::{assert_abs_diff_eq, assert_relative_eq};
use cca_core::models::{BidSet, BidderId, MAX_VALUE};
use cca_mechanism::{AuctionMechanism, CcgMechanism, VcgMechanism, WinnerDetermination};
use cca_solver::clarabel::ClarabelSolver;
use rstest::*;

mod common;
use common::*;

const TOLERANCE: f64 = 1e-4;

#[rstest]
fn singletons_share_the_package_value(solver: ClarabelSolver) {
    let ccg = CcgMechanism::new(WinnerDetermination::new(small_package()), solver);
    let result = ccg.mechanism_result().unwrap();

    assert_abs_diff_eq!(result.allocation.total_value(), 4.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.payment.payment_of(BidderId(1)), 1.0, epsilon = TOLERANCE);
    assert_abs_diff_eq!(result.payment.payment_of(BidderId(2)), 1.0, epsilon = TOLERANCE);
    assert_eq!(result.payment.payment_of(BidderId(3)), 0.0);
}

#[rstest]
fn traitors_are_priced_out(solver: ClarabelSolver) {
    let ccg = CcgMechanism::new(WinnerDetermination::new(traitors()), solver);
    let result = ccg.mechanism_result().unwrap();

    assert_abs_diff_eq!(result.allocation.total_value(), 40.0, epsilon = 1e-6);
    for bidder in 1..=4 {
        assert_abs_diff_eq!(
            result.payment.payment_of(BidderId(bidder)),
            4.0,
            epsilon = TOLERANCE
        );
    }
    for bidder in 5..=7 {
        assert_eq!(result.payment.payment_of(BidderId(bidder)), 0.0);
    }
}

#[rstest]
fn only_the_blocked_goods_are_charged(solver: ClarabelSolver) {
    let bids = bids(&[
        (1, &[(&[A], 10.0)]),
        (2, &[(&[B], 10.0)]),
        (3, &[(&[C], 10.0)]),
        (4, &[(&[A, B], 6.0)]),
    ]);
    let ccg = CcgMechanism::new(WinnerDetermination::new(bids), solver);
    let result = ccg.mechanism_result().unwrap();

    assert_abs_diff_eq!(result.allocation.total_value(), 30.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.payment.payment_of(BidderId(1)), 3.0, epsilon = TOLERANCE);
    assert_abs_diff_eq!(result.payment.payment_of(BidderId(2)), 3.0, epsilon = TOLERANCE);
    assert_abs_diff_eq!(result.payment.payment_of(BidderId(3)), 0.0, epsilon = TOLERANCE);
}

#[fixture]
fn mixed() -> BidSet {
    bids(&[
        (1, &[(&[A], 6.0), (&[A, B], 9.0)]),
        (2, &[(&[B], 5.0), (&[B, C], 7.0)]),
        (3, &[(&[C], 4.0)]),
        (4, &[(&[A, B, C], 12.0)]),
        (5, &[(&[A, C], 8.0)]),
    ])
}

#[rstest]
fn core_payments_stay_between_vcg_and_the_bids(solver: ClarabelSolver, mixed: BidSet) {
    let vcg = VcgMechanism::new(WinnerDetermination::new(mixed.clone()), &solver);
    let ccg = CcgMechanism::new(WinnerDetermination::new(mixed), &solver);
    let vcg = vcg.mechanism_result().unwrap();
    let ccg = ccg.mechanism_result().unwrap();

    assert_eq!(ccg.allocation, vcg.allocation);
    assert_eq!(ccg.overcharged(TOLERANCE).count(), 0);
    assert!(ccg.payment.total() >= vcg.payment.total() - TOLERANCE);
    for (bidder, payment) in ccg.payment.iter() {
        assert!(payment >= -TOLERANCE, "bidder {bidder} is paid {payment}");
    }
}

#[rstest]
fn core_payments_are_unblocked(solver: ClarabelSolver, mixed: BidSet) {
    let ccg = CcgMechanism::new(WinnerDetermination::new(mixed.clone()), &solver);
    let result = ccg.mechanism_result().unwrap();

    // no coalition of the losers alone offers more than the winners pay in total
    for loser in [BidderId(4), BidderId(5)] {
        let value = mixed.get(loser).unwrap().max_value();
        assert!(value <= result.payment.total() + TOLERANCE);
    }
}

#[rstest]
fn the_result_is_computed_once(solver: ClarabelSolver) {
    let ccg = CcgMechanism::new(WinnerDetermination::new(traitors()), solver);
    let first = ccg.mechanism_result().unwrap();
    let second = ccg.mechanism_result().unwrap();
    assert!(std::ptr::eq(first, second));
}

#[rstest]
#[case::thousand(1000.0)]
#[case::beyond_the_solver_range(2.0 * MAX_VALUE)]
fn payments_scale_with_values(solver: ClarabelSolver, #[case] factor: f64) {
    let ccg = CcgMechanism::new(
        WinnerDetermination::new(scaled(&small_package(), factor)),
        solver,
    );
    let payment = ccg.payment().unwrap();

    for bidder in [BidderId(1), BidderId(2)] {
        assert_relative_eq!(payment.payment_of(bidder), factor, max_relative = TOLERANCE);
    }
}

#[rstest]
#[case::spectrum_sized(1e5)]
#[case::near_the_solver_range(0.05 * MAX_VALUE)]
#[case::beyond_the_solver_range(0.2 * MAX_VALUE)]
fn traitor_payments_scale_with_values(solver: ClarabelSolver, #[case] factor: f64) {
    // singletons at 10 * factor, so each should pay 4 * factor
    let ccg = CcgMechanism::new(WinnerDetermination::new(scaled(&traitors(), factor)), solver);
    let result = ccg.mechanism_result().unwrap();

    assert_relative_eq!(
        result.allocation.total_value(),
        40.0 * factor,
        max_relative = 1e-9
    );
    for bidder in 1..=4 {
        assert_relative_eq!(
            result.payment.payment_of(BidderId(bidder)),
            4.0 * factor,
            max_relative = TOLERANCE
        );
    }
    for bidder in 5..=7 {
        assert_eq!(result.payment.payment_of(BidderId(bidder)), 0.0);
    }
    assert_eq!(result.overcharged(TOLERANCE * factor).count(), 0);
}
