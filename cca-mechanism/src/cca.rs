use crate::{
    AuctionMechanism, CcgMechanism, ClockPhase, ClockPhaseOutcome, ConfigError, MechanismError,
    PriceUpdater, ProfitMaximizing, SimpleRelativePriceUpdate, StartingPriceSampling,
    SupplementaryRound, VcgMechanism, WinnerDetermination, merge_supplementary_bids,
    sampled_starting_prices,
};
use cca_core::{
    models::{
        Allocation, BidSet, BidderId, CcaConfig, GoodId, Map, MechanismResult, PaymentRule,
        PriceVector, World, XorBid,
    },
    ports::{DemandOracle, MipSolver, PopulationSampler},
};
use rayon::prelude::*;
use std::{sync::OnceLock, time::Duration};
use tracing::{Level, event, span};

/// A combinatorial clock auction.
///
/// The phases run lazily: asking for anything computes the phases it depends
/// on, once. Settings can be changed until the phase they affect has run;
/// afterwards changes are rejected with a [`ConfigError`]. [`Self::reset`]
/// discards every computed phase.
pub struct CcaMechanism<O, S> {
    world: World,
    bidders: Vec<BidderId>,
    oracle: O,
    solver: S,
    config: CcaConfig,
    price_updater: Box<dyn PriceUpdater>,
    supplementary_rounds: Vec<Box<dyn SupplementaryRound<O>>>,

    clock_phase: OnceLock<ClockPhaseOutcome>,
    clock_phase_allocation: OnceLock<Allocation>,
    supplementary_bids: OnceLock<BidSet>,
    supplementary_allocation: OnceLock<Allocation>,
    result: OnceLock<MechanismResult>,
}

impl<O: DemandOracle, S: MipSolver> CcaMechanism<O, S> {
    /// Set up an auction of the goods of `world` among `bidders`.
    ///
    /// Prices are updated by [`SimpleRelativePriceUpdate`] with its defaults,
    /// and the supplementary round is [`ProfitMaximizing`] with its defaults,
    /// unless configured otherwise.
    pub fn new(
        world: World,
        bidders: impl IntoIterator<Item = BidderId>,
        oracle: O,
        solver: S,
        config: CcaConfig,
    ) -> Result<Self, ConfigError> {
        let bidders: Vec<BidderId> = bidders.into_iter().collect();
        if bidders.is_empty() {
            return Err(ConfigError::NoBidders);
        }
        validate(&config)?;

        Ok(Self {
            world,
            bidders,
            oracle,
            solver,
            config,
            price_updater: Box::new(SimpleRelativePriceUpdate::default()),
            supplementary_rounds: Vec::new(),
            clock_phase: OnceLock::new(),
            clock_phase_allocation: OnceLock::new(),
            supplementary_bids: OnceLock::new(),
            supplementary_allocation: OnceLock::new(),
            result: OnceLock::new(),
        })
    }

    /// The goods for sale
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The participating bidders
    pub fn bidders(&self) -> &[BidderId] {
        &self.bidders
    }

    /// The current settings
    pub fn config(&self) -> &CcaConfig {
        &self.config
    }

    fn clock_phase_pending(&self) -> Result<(), ConfigError> {
        if self.clock_phase.get().is_some() {
            Err(ConfigError::ClockPhaseAlreadyRun)
        } else {
            Ok(())
        }
    }

    /// Start `good` at `price` instead of the fallback price
    pub fn set_starting_price(&mut self, good: GoodId, price: f64) -> Result<(), ConfigError> {
        self.clock_phase_pending()?;
        non_negative("starting price", price)?;
        self.config.starting_prices.insert(good, price);
        Ok(())
    }

    /// Start every good without an explicit starting price at `price`
    pub fn set_fallback_starting_price(&mut self, price: f64) -> Result<(), ConfigError> {
        self.clock_phase_pending()?;
        non_negative("fallback starting price", price)?;
        self.config.fallback_starting_price = price;
        Ok(())
    }

    /// Require demanded bundles to beat holding nothing by `epsilon`
    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<(), ConfigError> {
        self.clock_phase_pending()?;
        non_negative("epsilon", epsilon)?;
        self.config.epsilon = epsilon;
        Ok(())
    }

    /// Stop the clock phase after `max_rounds` rounds at the latest
    pub fn set_max_rounds(&mut self, max_rounds: usize) -> Result<(), ConfigError> {
        self.clock_phase_pending()?;
        positive("max rounds", max_rounds)?;
        self.config.max_rounds = max_rounds;
        Ok(())
    }

    /// Let every clock-phase demand query return up to `bundles` bundles
    pub fn set_clock_phase_bundles(&mut self, bundles: usize) -> Result<(), ConfigError> {
        self.clock_phase_pending()?;
        positive("clock phase bundles", bundles)?;
        self.config.clock_phase_bundles = bundles;
        Ok(())
    }

    /// Limit every individual solve and demand query to `time_limit`
    pub fn set_time_limit(&mut self, time_limit: Option<Duration>) -> Result<(), ConfigError> {
        self.clock_phase_pending()?;
        self.config.time_limit = time_limit;
        Ok(())
    }

    /// Replace the price-update policy of the clock phase
    pub fn set_price_updater(
        &mut self,
        updater: impl PriceUpdater + 'static,
    ) -> Result<(), ConfigError> {
        self.clock_phase_pending()?;
        self.price_updater = Box::new(updater);
        Ok(())
    }

    /// Append a supplementary-round strategy. Without any, the supplementary
    /// round is [`ProfitMaximizing`] with its defaults.
    pub fn add_supplementary_round(
        &mut self,
        round: impl SupplementaryRound<O> + 'static,
    ) -> Result<(), ConfigError> {
        if self.supplementary_bids.get().is_some() {
            return Err(ConfigError::SupplementaryRoundAlreadyRun);
        }
        self.supplementary_rounds.push(Box::new(round));
        Ok(())
    }

    /// Choose between VCG and core-constrained payments
    pub fn set_payment_rule(&mut self, rule: PaymentRule) -> Result<(), ConfigError> {
        if self.result.get().is_some() {
            return Err(ConfigError::PaymentsAlreadyComputed);
        }
        self.config.payment_rule = rule;
        Ok(())
    }

    /// Replace the starting prices by estimates from sampled populations.
    ///
    /// Samplers that cannot draw random bids leave the starting prices alone;
    /// this is logged, not returned as an error.
    pub fn calculate_sampled_starting_prices(
        &mut self,
        sampler: &impl PopulationSampler,
        sampling: &StartingPriceSampling,
    ) -> Result<(), MechanismError> {
        self.clock_phase_pending()?;
        if !(sampling.fraction.is_finite() && sampling.fraction >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "sampling fraction",
                reason: format!("{} is not a non-negative number", sampling.fraction),
            }
            .into());
        }
        let prices = sampled_starting_prices(
            &self.world,
            &self.bidders,
            sampler,
            &self.solver,
            sampling,
            self.config.time_limit,
        )?;
        if let Some(prices) = prices {
            self.config.starting_prices.extend(prices);
        }
        Ok(())
    }

    /// Discard every computed phase and result. Settings are kept.
    pub fn reset(&mut self) {
        self.clock_phase.take();
        self.clock_phase_allocation.take();
        self.supplementary_bids.take();
        self.supplementary_allocation.take();
        self.result.take();
    }

    /// The prices of the first clock round
    pub fn starting_prices(&self) -> PriceVector {
        PriceVector::with_fallback(
            &self.world,
            &self.config.starting_prices,
            self.config.fallback_starting_price,
        )
    }

    /// The outcome of the clock phase, running it on first access
    pub fn clock_phase(&self) -> Result<&ClockPhaseOutcome, MechanismError> {
        if let Some(outcome) = self.clock_phase.get() {
            return Ok(outcome);
        }
        let span = span!(
            Level::INFO,
            "clock_phase",
            bidders = self.bidders.len(),
            goods = self.world.len()
        );
        let outcome = span.in_scope(|| {
            ClockPhase::new(
                &self.world,
                &self.bidders,
                &self.oracle,
                self.price_updater.as_ref(),
                &self.config,
                self.starting_prices(),
            )
            .run()
        })?;
        Ok(self.clock_phase.get_or_init(|| outcome))
    }

    /// The bids after the clock phase
    pub fn bids_after_clock_phase(&self) -> Result<&BidSet, MechanismError> {
        Ok(&self.clock_phase()?.bids)
    }

    /// One bidder's bid after the clock phase, `None` for unknown bidders
    pub fn bid_after_clock_phase(
        &self,
        bidder: BidderId,
    ) -> Result<Option<&XorBid>, MechanismError> {
        Ok(self.bids_after_clock_phase()?.get(bidder))
    }

    /// The number of entries per bidder after the clock phase
    pub fn bid_counts_after_clock_phase(&self) -> Result<Map<BidderId, usize>, MechanismError> {
        Ok(self.bids_after_clock_phase()?.entry_counts())
    }

    /// The prices of the last clock round
    pub fn final_prices(&self) -> Result<&PriceVector, MechanismError> {
        Ok(&self.clock_phase()?.final_prices)
    }

    /// Per good, the price of the last round it was over-demanded in
    pub fn last_prices(&self) -> Result<&PriceVector, MechanismError> {
        Ok(&self.clock_phase()?.last_prices)
    }

    /// The number of clock rounds
    pub fn total_rounds(&self) -> Result<usize, MechanismError> {
        Ok(self.clock_phase()?.rounds())
    }

    /// Total supply minus total demand in the last clock round
    pub fn supply_minus_demand(&self) -> Result<i64, MechanismError> {
        Ok(self.clock_phase()?.supply_minus_demand())
    }

    /// The allocation the clock-phase bids alone would yield
    pub fn clock_phase_allocation(&self) -> Result<&Allocation, MechanismError> {
        if let Some(allocation) = self.clock_phase_allocation.get() {
            return Ok(allocation);
        }
        let allocation = self.winner_determination(self.bids_after_clock_phase()?)?;
        Ok(self.clock_phase_allocation.get_or_init(|| allocation))
    }

    /// The bids after the supplementary round, running the earlier phases on
    /// first access
    pub fn bids_after_supplementary_round(&self) -> Result<&BidSet, MechanismError> {
        if let Some(bids) = self.supplementary_bids.get() {
            return Ok(bids);
        }
        let span = span!(Level::INFO, "supplementary_round");
        let bids = span.in_scope(|| self.run_supplementary_round())?;
        Ok(self.supplementary_bids.get_or_init(|| bids))
    }

    /// One bidder's final bid, `None` for unknown bidders
    pub fn bid_after_supplementary_round(
        &self,
        bidder: BidderId,
    ) -> Result<Option<&XorBid>, MechanismError> {
        Ok(self.bids_after_supplementary_round()?.get(bidder))
    }

    /// The number of entries per bidder after the supplementary round
    pub fn bid_counts_after_supplementary_round(
        &self,
    ) -> Result<Map<BidderId, usize>, MechanismError> {
        Ok(self.bids_after_supplementary_round()?.entry_counts())
    }

    /// The allocation of the final bids
    pub fn allocation_after_supplementary_round(&self) -> Result<&Allocation, MechanismError> {
        if let Some(allocation) = self.supplementary_allocation.get() {
            return Ok(allocation);
        }
        let allocation = self.winner_determination(self.bids_after_supplementary_round()?)?;
        Ok(self.supplementary_allocation.get_or_init(|| allocation))
    }

    fn winner_determination(&self, bids: &BidSet) -> Result<Allocation, MechanismError> {
        WinnerDetermination::new(bids.clone())
            .with_time_limit(self.config.time_limit)
            .solve(&self.solver)
    }

    fn run_supplementary_round(&self) -> Result<BidSet, MechanismError> {
        let clock_phase = self.clock_phase()?;
        let fallback = ProfitMaximizing::default();
        let rounds: Vec<&dyn SupplementaryRound<O>> = if self.supplementary_rounds.is_empty() {
            vec![&fallback as &dyn SupplementaryRound<O>]
        } else {
            self.supplementary_rounds
                .iter()
                .map(|round| round.as_ref() as &dyn SupplementaryRound<O>)
                .collect()
        };
        let time_limit = self.config.time_limit;

        let bids = self
            .bidders
            .par_iter()
            .map(|&bidder| {
                let mut bid = clock_phase
                    .bids
                    .get(bidder)
                    .cloned()
                    .unwrap_or_else(|| XorBid::builder(bidder).build());
                for round in &rounds {
                    let entries = round.supplementary_bids(
                        bidder,
                        &bid,
                        clock_phase,
                        &self.oracle,
                        time_limit,
                    )?;
                    bid = merge_supplementary_bids(&bid, entries)?;
                }
                Ok(bid)
            })
            .collect::<Result<Vec<_>, MechanismError>>()?;
        let bids: BidSet = bids.into_iter().collect();

        event!(
            Level::INFO,
            entries = bids.iter().map(XorBid::len).sum::<usize>(),
            strategies = rounds.len(),
            "supplementary round finished"
        );
        Ok(bids)
    }

    fn calculate(&self) -> Result<MechanismResult, MechanismError> {
        let wdp = WinnerDetermination::new(self.bids_after_supplementary_round()?.clone())
            .with_time_limit(self.config.time_limit);
        match self.config.payment_rule {
            PaymentRule::Vcg => VcgMechanism::new(wdp, &self.solver).calculate(),
            PaymentRule::Ccg => CcgMechanism::new(wdp, &self.solver).calculate(),
        }
    }
}

impl<O: DemandOracle, S: MipSolver> AuctionMechanism for CcaMechanism<O, S> {
    fn mechanism_result(&self) -> Result<&MechanismResult, MechanismError> {
        if let Some(result) = self.result.get() {
            return Ok(result);
        }
        let result = self.calculate()?;
        Ok(self.result.get_or_init(|| result))
    }
}

fn validate(config: &CcaConfig) -> Result<(), ConfigError> {
    non_negative("epsilon", config.epsilon)?;
    non_negative("fallback starting price", config.fallback_starting_price)?;
    for (_, &price) in &config.starting_prices {
        non_negative("starting price", price)?;
    }
    positive("max rounds", config.max_rounds)?;
    positive("clock phase bundles", config.clock_phase_bundles)?;
    Ok(())
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("{value} is not a non-negative number"),
        })
    }
}

fn positive(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: "must be at least 1".to_owned(),
        })
    }
}
