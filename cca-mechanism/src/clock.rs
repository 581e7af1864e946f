use crate::MechanismError;
use cca_core::{
    models::{
        BidEntry, BidError, BidSet, BidderId, Bundle, CcaConfig, GoodId, Map, PriceVector, World,
        XorBid, XorBidBuilder,
    },
    ports::DemandOracle,
};
use rayon::prelude::*;
use std::time::Duration;
use tracing::{Level, event, span};

mod price_update;
pub use price_update::{PriceUpdater, SimpleRelativePriceUpdate};

/// Where a clock phase stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    /// More rounds are needed
    Running,
    /// Prices stopped moving, or the round limit was reached
    Converged,
}

/// Everything the clock phase leaves behind for the later phases.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockPhaseOutcome {
    /// Every bundle a bidder demanded, at the highest price it was demanded at
    pub bids: BidSet,
    /// The prices of the last round
    pub final_prices: PriceVector,
    /// Per good, the price of the last round it was over-demanded in, or its
    /// starting price if it never was
    pub last_prices: PriceVector,
    /// The demand observed at the final prices
    pub final_demand: Map<GoodId, usize>,
    /// The prices of every round, in order
    pub price_history: Vec<PriceVector>,
    /// Total supply minus total demand of every round, in order
    pub slack_history: Vec<i64>,
    /// Whether the phase ended because prices stopped moving
    pub converged: bool,
}

impl ClockPhaseOutcome {
    /// The number of rounds run
    pub fn rounds(&self) -> usize {
        self.price_history.len()
    }

    /// Total supply minus total demand in the last round
    pub fn supply_minus_demand(&self) -> i64 {
        self.slack_history.last().copied().unwrap_or_default()
    }
}

/// An ascending clock auction over unit-supply goods.
///
/// Each round asks every bidder for its demand at the current prices, records
/// the answers as bids, and raises the prices of over-demanded goods.
pub struct ClockPhase<'a, O> {
    world: &'a World,
    bidders: &'a [BidderId],
    oracle: &'a O,
    updater: &'a dyn PriceUpdater,
    epsilon: f64,
    pool_size: usize,
    max_rounds: usize,
    time_limit: Option<Duration>,

    state: ClockState,
    converged: bool,
    round: usize,
    prices: PriceVector,
    last_prices: PriceVector,
    bids: Map<BidderId, XorBidBuilder>,
    demand: Map<GoodId, usize>,
    price_history: Vec<PriceVector>,
    slack_history: Vec<i64>,
}

impl<'a, O: DemandOracle> ClockPhase<'a, O> {
    /// Prepare a clock phase starting at `starting_prices`
    pub fn new(
        world: &'a World,
        bidders: &'a [BidderId],
        oracle: &'a O,
        updater: &'a dyn PriceUpdater,
        config: &CcaConfig,
        starting_prices: PriceVector,
    ) -> Self {
        Self {
            world,
            bidders,
            oracle,
            updater,
            epsilon: config.epsilon,
            pool_size: config.clock_phase_bundles,
            max_rounds: config.max_rounds,
            time_limit: config.time_limit,
            state: ClockState::Running,
            converged: false,
            round: 0,
            last_prices: starting_prices.clone(),
            prices: starting_prices,
            bids: bidders
                .iter()
                .map(|&bidder| (bidder, XorBid::builder(bidder)))
                .collect(),
            demand: Map::default(),
            price_history: Vec::new(),
            slack_history: Vec::new(),
        }
    }

    /// The current state
    pub fn state(&self) -> ClockState {
        self.state
    }

    /// The number of rounds run so far
    pub fn round(&self) -> usize {
        self.round
    }

    /// The prices the next round will be run at
    pub fn prices(&self) -> &PriceVector {
        &self.prices
    }

    /// Run a single round, unless the phase is over already
    pub fn step(&mut self) -> Result<ClockState, MechanismError> {
        if self.state == ClockState::Converged {
            return Ok(self.state);
        }
        self.round += 1;
        let span = span!(Level::DEBUG, "clock_round", round = self.round);
        let _guard = span.enter();

        let (oracle, prices) = (self.oracle, &self.prices);
        let (epsilon, pool_size, time_limit) = (self.epsilon, self.pool_size, self.time_limit);
        let responses = self
            .bidders
            .par_iter()
            .map(|&bidder| {
                oracle
                    .query(bidder, prices, epsilon, pool_size, time_limit)
                    .map(|responses| (bidder, responses))
                    .map_err(MechanismError::oracle(bidder))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut demand: Map<GoodId, usize> = self.world.goods().map(|good| (good, 0)).collect();
        for (bidder, responses) in responses {
            if let Some(best) = responses.first() {
                for good in best.bundle.iter() {
                    *demand.entry(good).or_default() += 1;
                }
            }
            let bid = self
                .bids
                .entry(bidder)
                .or_insert_with(|| XorBid::builder(bidder));
            for response in responses {
                if response.bundle.is_empty() {
                    continue;
                }
                let price = self.prices.bundle_price(&response.bundle);
                record_clock_bid(bid, response.bundle, price)?;
            }
        }

        let mut over_demanded = 0;
        for (&good, &count) in &demand {
            if count > self.world.supply(good) {
                over_demanded += 1;
                self.last_prices.set(good, self.prices.get(good));
            }
        }
        let slack = self.world.len() as i64 - demand.values().sum::<usize>() as i64;
        event!(
            Level::INFO,
            round = self.round,
            over_demanded,
            slack,
            "clock round finished"
        );

        let updated = self.updater.update_prices(self.world, &self.prices, &demand);
        self.price_history.push(self.prices.clone());
        self.slack_history.push(slack);
        self.demand = demand;

        if updated == self.prices {
            self.converged = true;
            self.state = ClockState::Converged;
            event!(Level::INFO, rounds = self.round, "clock phase converged");
        } else if self.round >= self.max_rounds {
            self.state = ClockState::Converged;
            event!(
                Level::WARN,
                max_rounds = self.max_rounds,
                "clock phase stopped at the round limit with goods still over-demanded"
            );
        } else {
            self.prices = updated;
        }
        Ok(self.state)
    }

    /// Run rounds until the phase is over
    pub fn run(mut self) -> Result<ClockPhaseOutcome, MechanismError> {
        while self.step()? == ClockState::Running {}
        Ok(self.into_outcome())
    }

    /// The results so far
    pub fn into_outcome(self) -> ClockPhaseOutcome {
        ClockPhaseOutcome {
            bids: self
                .bids
                .into_iter()
                .map(|(_, builder)| builder.build())
                .collect(),
            final_prices: self.prices,
            last_prices: self.last_prices,
            final_demand: self.demand,
            price_history: self.price_history,
            slack_history: self.slack_history,
            converged: self.converged,
        }
    }
}

/// Record a bundle demanded at `price`. A bundle already bid for keeps the
/// higher of the two prices; on a tie the new entry wins and becomes the most
/// recent one.
fn record_clock_bid(bid: &mut XorBidBuilder, bundle: Bundle, price: f64) -> Result<(), BidError> {
    match bid.contains_bundle(&bundle).map(BidEntry::value) {
        None => {
            bid.add(BidEntry::new(bundle, price))?;
        }
        Some(recorded) if recorded <= price => {
            bid.replace(BidEntry::new(bundle, price))?;
        }
        Some(_) => {}
    }
    Ok(())
}
