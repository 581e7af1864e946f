#![allow(dead_code)]
use cca_core::{
    models::{BidSet, BidderId, Bundle, GoodId, Map, PriceVector, XorBid},
    ports::{DemandOracle, DemandResponse, PopulationSampler, Valuation},
};
use cca_solver::clarabel::ClarabelSolver;
use rand::{Rng, rngs::StdRng};
use rstest::*;
use std::{convert::Infallible, time::Duration};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

pub const A: GoodId = GoodId(1);
pub const B: GoodId = GoodId(2);
pub const C: GoodId = GoodId(3);
pub const D: GoodId = GoodId(4);
pub const E: GoodId = GoodId(5);

/// Route mechanism logs to the test output, filtered by `RUST_LOG`
pub fn init_logging() {
    // the first test to get here wins, the others find a subscriber in place
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

#[fixture]
pub fn solver() -> ClarabelSolver {
    init_logging();
    ClarabelSolver::default()
}

pub fn bundle(goods: &[GoodId]) -> Bundle {
    goods.iter().copied().collect()
}

/// One XOR bid per (bidder, entries) pair
pub fn bids(spec: &[(u64, &[(&[GoodId], f64)])]) -> BidSet {
    spec.iter()
        .map(|(bidder, entries)| {
            let mut builder = XorBid::builder(BidderId(*bidder));
            for (goods, value) in entries.iter() {
                builder.add_value(bundle(goods), *value).unwrap();
            }
            builder.build()
        })
        .collect()
}

/// The same bids with every value multiplied by `factor`
pub fn scaled(bids: &BidSet, factor: f64) -> BidSet {
    bids.iter()
        .map(|bid| {
            let mut builder = XorBid::builder(bid.bidder());
            for entry in bid.entries() {
                builder
                    .add_value(entry.bundle().clone(), entry.value() * factor)
                    .unwrap();
            }
            builder.build()
        })
        .collect()
}

/// {A}=2, {B}=2, {A,B}=2
pub fn small_package() -> BidSet {
    bids(&[(1, &[(&[A], 2.0)]), (2, &[(&[B], 2.0)]), (3, &[(&[A, B], 2.0)])])
}

/// Four singletons at 10, the grand package at 12, and two traitor packages
/// at 8 that each need one of the singletons' goods plus E
pub fn traitors() -> BidSet {
    bids(&[
        (1, &[(&[A], 10.0)]),
        (2, &[(&[B], 10.0)]),
        (3, &[(&[C], 10.0)]),
        (4, &[(&[D], 10.0)]),
        (5, &[(&[A, B, C, D, E], 12.0)]),
        (6, &[(&[A, B, E], 8.0)]),
        (7, &[(&[C, D, E], 8.0)]),
    ])
}

/// Bidders with explicit XOR valuations over a few bundles.
///
/// Bundles not listed are worth the best listed bundle they contain. Demand
/// queries enumerate the listed bundles.
#[derive(Debug, Clone, Default)]
pub struct XorValuation {
    values: Map<BidderId, Vec<(Bundle, f64)>>,
    sampling: bool,
}

impl XorValuation {
    pub fn new(spec: &[(u64, &[(&[GoodId], f64)])]) -> Self {
        Self {
            values: spec
                .iter()
                .map(|(bidder, entries)| {
                    (
                        BidderId(*bidder),
                        entries
                            .iter()
                            .map(|(goods, value)| (bundle(goods), *value))
                            .collect(),
                    )
                })
                .collect(),
            sampling: true,
        }
    }

    pub fn without_sampling(mut self) -> Self {
        self.sampling = false;
        self
    }

    pub fn bidders(&self) -> Vec<BidderId> {
        self.values.keys().copied().collect()
    }
}

impl Valuation for XorValuation {
    fn value(&self, bidder: BidderId, bundle: &Bundle) -> f64 {
        self.values
            .get(&bidder)
            .into_iter()
            .flatten()
            .filter(|(listed, _)| listed.iter().all(|good| bundle.contains(good)))
            .map(|(_, value)| *value)
            .fold(0.0, f64::max)
    }
}

impl DemandOracle for XorValuation {
    type Error = Infallible;

    fn query(
        &self,
        bidder: BidderId,
        prices: &PriceVector,
        epsilon: f64,
        pool_size: usize,
        _: Option<Duration>,
    ) -> Result<Vec<DemandResponse>, Infallible> {
        let mut profitable: Vec<(f64, DemandResponse)> = self
            .values
            .get(&bidder)
            .into_iter()
            .flatten()
            .filter_map(|(bundle, value)| {
                let utility = value - prices.bundle_price(bundle);
                (utility > epsilon).then(|| {
                    (
                        utility,
                        DemandResponse {
                            bundle: bundle.clone(),
                            willingness_to_pay: *value,
                        },
                    )
                })
            })
            .collect();
        profitable.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(profitable
            .into_iter()
            .take(pool_size)
            .map(|(_, response)| response)
            .collect())
    }
}

impl PopulationSampler for XorValuation {
    fn supports_random_bids(&self) -> bool {
        self.sampling
    }

    fn sample_bids(
        &self,
        bidders: &[BidderId],
        bids_per_bidder: usize,
        rng: &mut StdRng,
    ) -> Vec<(Bundle, f64)> {
        bidders
            .iter()
            .filter_map(|bidder| self.values.get(bidder))
            .flat_map(|listed| listed.iter().take(bids_per_bidder))
            .map(|(bundle, value)| (bundle.clone(), value * rng.random_range(0.9..1.1)))
            .collect()
    }
}
