use approx::{assert_abs_diff_eq, assert_relative_eq};
use cca_core::models::{BidSet, BidderId, MAX_VALUE, Map};
use cca_mechanism::WinnerDetermination;
use cca_solver::clarabel::ClarabelSolver;
use rstest::*;
use std::time::Duration;

mod common;
use common::*;

#[rstest]
fn packages_lose_to_the_singletons(solver: ClarabelSolver) {
    let allocation = WinnerDetermination::new(small_package())
        .solve(&solver)
        .unwrap();

    assert_abs_diff_eq!(allocation.total_value(), 4.0, epsilon = 1e-6);
    assert_eq!(allocation.bundle_of(BidderId(1)), Some(&bundle(&[A])));
    assert_eq!(allocation.bundle_of(BidderId(2)), Some(&bundle(&[B])));
    assert!(!allocation.is_winner(BidderId(3)));
    assert_eq!(allocation.trade_value(BidderId(3)), 0.0);
}

#[rstest]
fn traitor_packages_lose_to_the_singletons(solver: ClarabelSolver) {
    let allocation = WinnerDetermination::new(traitors()).solve(&solver).unwrap();

    assert_abs_diff_eq!(allocation.total_value(), 40.0, epsilon = 1e-6);
    let winners: Vec<_> = allocation.winners().collect();
    assert_eq!(
        winners,
        vec![BidderId(1), BidderId(2), BidderId(3), BidderId(4)]
    );
}

#[rstest]
fn a_bidder_wins_at_most_one_entry(solver: ClarabelSolver) {
    // bidder 1 would take both goods for 6 if its entries were additive
    let bids = bids(&[(1, &[(&[A], 3.0), (&[B], 3.0)]), (2, &[(&[A, B], 5.0)])]);
    let allocation = WinnerDetermination::new(bids).solve(&solver).unwrap();

    assert_abs_diff_eq!(allocation.total_value(), 5.0, epsilon = 1e-6);
    assert!(allocation.is_winner(BidderId(2)));
    assert!(!allocation.is_winner(BidderId(1)));
}

#[rstest]
fn nothing_to_allocate(solver: ClarabelSolver) {
    let allocation = WinnerDetermination::new(BidSet::new())
        .solve(&solver)
        .unwrap();
    assert_eq!(allocation.winners().len(), 0);
    assert_eq!(allocation.total_value(), 0.0);
}

#[rstest]
fn removing_a_bidder_leaves_the_original_alone(solver: ClarabelSolver) {
    let wdp = WinnerDetermination::new(small_package());
    let without = wdp.without_bidder(BidderId(1)).solve(&solver).unwrap();

    assert_abs_diff_eq!(without.total_value(), 2.0, epsilon = 1e-6);
    assert!(!without.is_winner(BidderId(1)));
    assert_eq!(wdp.bids().len(), 3);
    assert_abs_diff_eq!(wdp.solve(&solver).unwrap().total_value(), 4.0, epsilon = 1e-6);
}

#[rstest]
fn payoffs_shift_the_allocation(solver: ClarabelSolver) {
    let bids = bids(&[(1, &[(&[A], 3.0), (&[B], 3.0)]), (2, &[(&[A, B], 5.0)])]);
    let wdp = WinnerDetermination::new(bids);
    let payoffs: Map<BidderId, f64> = [(BidderId(2), 3.0)].into_iter().collect();

    let allocation = wdp.reweighted_copy(&payoffs).solve(&solver).unwrap();

    // 5 - 3 for bidder 2 is worse than 3 for bidder 1; values stay declared
    assert!(allocation.is_winner(BidderId(1)));
    assert!(!allocation.is_winner(BidderId(2)));
    assert_abs_diff_eq!(allocation.total_value(), 3.0, epsilon = 1e-6);
}

#[rstest]
fn payoffs_only_count_once_per_bidder(solver: ClarabelSolver) {
    // bidder 1 pays its payoff once whichever entry it wins
    let bids = bids(&[(1, &[(&[A], 4.0), (&[B], 6.0)]), (2, &[(&[A], 3.0)])]);
    let wdp = WinnerDetermination::new(bids);
    let payoffs: Map<BidderId, f64> = [(BidderId(1), 2.0)].into_iter().collect();

    let allocation = wdp.reweighted_copy(&payoffs).solve(&solver).unwrap();
    assert_eq!(allocation.bundle_of(BidderId(1)), Some(&bundle(&[B])));
    assert!(allocation.is_winner(BidderId(2)));
    assert_abs_diff_eq!(allocation.total_value(), 9.0, epsilon = 1e-6);
}

#[rstest]
fn huge_values_are_reported_in_declared_units(solver: ClarabelSolver) {
    let factor = 2.0 * MAX_VALUE;
    let wdp = WinnerDetermination::new(scaled(&small_package(), factor));
    assert!(wdp.scaling_factor() < 1.0);

    let allocation = wdp.solve(&solver).unwrap();
    assert!(allocation.is_winner(BidderId(1)));
    assert!(allocation.is_winner(BidderId(2)));
    assert_relative_eq!(allocation.total_value(), 4.0 * factor, max_relative = 1e-9);
}

#[rstest]
#[case::zero(Duration::ZERO)]
#[case::one_nanosecond(Duration::from_nanos(1))]
fn an_exhausted_time_limit_allocates_nothing(
    solver: ClarabelSolver,
    #[case] limit: Duration,
) {
    let wdp = WinnerDetermination::new(traitors()).with_time_limit(Some(limit));
    let allocation = wdp.solve(&solver).unwrap();

    assert_eq!(allocation.total_value(), 0.0);
    for bidder in 1..=7 {
        assert!(!allocation.is_winner(BidderId(bidder)));
    }

    let payoffs: Map<BidderId, f64> = [(BidderId(1), 5.0)].into_iter().collect();
    let reweighted = wdp.reweighted_copy(&payoffs).solve(&solver).unwrap();
    assert_eq!(reweighted.total_value(), 0.0);
}
