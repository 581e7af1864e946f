use approx::{assert_abs_diff_eq, assert_relative_eq};
use cca_core::models::{BidderId, MAX_VALUE};
use cca_mechanism::{AuctionMechanism, VcgMechanism, WinnerDetermination};
use cca_solver::clarabel::ClarabelSolver;
use rstest::*;
use std::time::Duration;

mod common;
use common::*;

#[rstest]
fn winner_pays_the_second_price(solver: ClarabelSolver) {
    let bids = bids(&[(1, &[(&[A], 10.0)]), (2, &[(&[A], 7.0)])]);
    let vcg = VcgMechanism::new(WinnerDetermination::new(bids), solver);

    let payment = vcg.payment().unwrap();
    assert_abs_diff_eq!(payment.payment_of(BidderId(1)), 7.0, epsilon = 1e-6);
    assert_eq!(payment.len(), 1);
}

#[rstest]
fn singletons_pay_nothing_against_a_weak_package(solver: ClarabelSolver) {
    let vcg = VcgMechanism::new(WinnerDetermination::new(small_package()), solver);
    let result = vcg.mechanism_result().unwrap();

    assert_abs_diff_eq!(result.allocation.total_value(), 4.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.payment.payment_of(BidderId(1)), 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.payment.payment_of(BidderId(2)), 0.0, epsilon = 1e-6);
    assert_eq!(result.payment.payment_of(BidderId(3)), 0.0);
}

#[rstest]
fn traitors_leave_everyone_paying_nothing(solver: ClarabelSolver) {
    let vcg = VcgMechanism::new(WinnerDetermination::new(traitors()), solver);
    let result = vcg.mechanism_result().unwrap();

    assert_abs_diff_eq!(result.allocation.total_value(), 40.0, epsilon = 1e-6);
    for bidder in 1..=7 {
        assert_abs_diff_eq!(
            result.payment.payment_of(BidderId(bidder)),
            0.0,
            epsilon = 1e-6
        );
    }
}

#[rstest]
fn payments_stay_within_trade_values(solver: ClarabelSolver) {
    let bids = bids(&[
        (1, &[(&[A], 6.0), (&[A, B], 9.0)]),
        (2, &[(&[B], 5.0), (&[B, C], 7.0)]),
        (3, &[(&[C], 4.0)]),
        (4, &[(&[A, B, C], 12.0)]),
    ]);
    let vcg = VcgMechanism::new(WinnerDetermination::new(bids), solver);
    let result = vcg.mechanism_result().unwrap();

    assert_eq!(result.overcharged(1e-6).count(), 0);
    for (bidder, payment) in result.payment.iter() {
        assert!(payment >= -1e-6, "bidder {bidder} is paid {payment}");
    }
}

#[rstest]
fn the_result_is_computed_once(solver: ClarabelSolver) {
    let vcg = VcgMechanism::new(WinnerDetermination::new(small_package()), solver);
    let first = vcg.mechanism_result().unwrap();
    let second = vcg.mechanism_result().unwrap();
    assert!(std::ptr::eq(first, second));
}

#[rstest]
#[case::thousand(1000.0)]
#[case::beyond_the_solver_range(2.0 * MAX_VALUE)]
fn payments_scale_with_values(solver: ClarabelSolver, #[case] factor: f64) {
    let bids = bids(&[(1, &[(&[A], 10.0)]), (2, &[(&[A], 7.0)]), (3, &[(&[B], 3.0)])]);
    let base = VcgMechanism::new(WinnerDetermination::new(bids.clone()), &solver);
    let scaled = VcgMechanism::new(WinnerDetermination::new(scaled(&bids, factor)), &solver);

    let base = base.payment().unwrap();
    let scaled = scaled.payment().unwrap();
    for bidder in [BidderId(1), BidderId(3)] {
        assert_relative_eq!(
            scaled.payment_of(bidder),
            base.payment_of(bidder) * factor,
            epsilon = 1e-6 * factor,
            max_relative = 1e-6
        );
    }
}

#[rstest]
fn an_exhausted_time_limit_charges_nobody(solver: ClarabelSolver) {
    let wdp = WinnerDetermination::new(small_package()).with_time_limit(Some(Duration::ZERO));
    let vcg = VcgMechanism::new(wdp, solver);
    let result = vcg.mechanism_result().unwrap();

    assert_eq!(result.allocation.total_value(), 0.0);
    assert!(result.payment.is_empty());
}
