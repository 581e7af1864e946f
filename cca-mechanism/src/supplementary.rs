use crate::{ClockPhaseOutcome, MechanismError};
use cca_core::{
    models::{BidEntry, BidError, BidderId, XorBid},
    ports::{DemandOracle, Valuation},
};
use std::time::Duration;
use tracing::{Level, event};

/// A strategy producing additional bids after the clock phase.
///
/// Strategies run in the order they were added. Each sees the bidder's bid as
/// it stands after the clock phase and all earlier strategies.
pub trait SupplementaryRound<O>: Send + Sync {
    /// The additional entries of `bidder`.
    ///
    /// Entries for bundles already in `current` are dropped during the merge
    /// unless they raise the recorded value.
    fn supplementary_bids(
        &self,
        bidder: BidderId,
        current: &XorBid,
        clock_phase: &ClockPhaseOutcome,
        oracle: &O,
        time_limit: Option<Duration>,
    ) -> Result<Vec<BidEntry>, MechanismError>;
}

/// Bid on the most profitable bundles not bid on yet, at the bidder's
/// willingness to pay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfitMaximizing {
    count: usize,
    use_last_prices: bool,
}

impl Default for ProfitMaximizing {
    fn default() -> Self {
        Self {
            count: 500,
            use_last_prices: false,
        }
    }
}

impl ProfitMaximizing {
    /// Bid on up to `count` bundles
    pub fn new(count: usize) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    /// Rank bundles at the last prices each good was over-demanded at instead
    /// of the final prices
    pub fn with_last_prices(mut self, use_last_prices: bool) -> Self {
        self.use_last_prices = use_last_prices;
        self
    }
}

impl<O: DemandOracle> SupplementaryRound<O> for ProfitMaximizing {
    fn supplementary_bids(
        &self,
        bidder: BidderId,
        current: &XorBid,
        clock_phase: &ClockPhaseOutcome,
        oracle: &O,
        time_limit: Option<Duration>,
    ) -> Result<Vec<BidEntry>, MechanismError> {
        if self.count == 0 {
            return Ok(Vec::new());
        }
        let prices = if self.use_last_prices {
            &clock_phase.last_prices
        } else {
            &clock_phase.final_prices
        };

        // known bundles come back too, so ask for enough to skip them all
        let responses = oracle
            .query(bidder, prices, 0.0, self.count + current.len(), time_limit)
            .map_err(MechanismError::oracle(bidder))?;
        Ok(responses
            .into_iter()
            .filter(|response| {
                !response.bundle.is_empty() && current.contains_bundle(&response.bundle).is_none()
            })
            .take(self.count)
            .map(|response| BidEntry::new(response.bundle, response.willingness_to_pay))
            .collect())
    }
}

/// Re-bid the last bundles of the clock phase at their true value.
pub struct LastBidsTrueValue<V> {
    count: usize,
    valuation: V,
}

impl<V: Valuation> LastBidsTrueValue<V> {
    /// Re-bid the last `count` clock-phase bundles, valued by `valuation`
    pub fn new(count: usize, valuation: V) -> Self {
        Self { count, valuation }
    }
}

impl<O: DemandOracle, V: Valuation + Send + Sync> SupplementaryRound<O> for LastBidsTrueValue<V> {
    fn supplementary_bids(
        &self,
        bidder: BidderId,
        _: &XorBid,
        clock_phase: &ClockPhaseOutcome,
        _: &O,
        _: Option<Duration>,
    ) -> Result<Vec<BidEntry>, MechanismError> {
        let Some(clock_bid) = clock_phase.bids.get(bidder) else {
            return Ok(Vec::new());
        };
        let entries = clock_bid.entries();
        let last = &entries[entries.len().saturating_sub(self.count)..];

        let mut bids = Vec::with_capacity(last.len());
        for entry in last {
            let value = self.valuation.value(bidder, entry.bundle());
            if value > entry.value() {
                bids.push(BidEntry::new(entry.bundle().clone(), value));
            } else {
                // a truthful bidder never demands a bundle above its value
                event!(
                    Level::WARN,
                    %bidder,
                    bundle = %entry.bundle(),
                    clock_price = entry.value(),
                    value,
                    "true value does not exceed the clock price, skipping"
                );
            }
        }
        Ok(bids)
    }
}

/// Merge `entries` into `bid`. New bundles are appended; a bundle already
/// present is only replaced by a strictly higher value.
pub fn merge_supplementary_bids(
    bid: &XorBid,
    entries: impl IntoIterator<Item = BidEntry>,
) -> Result<XorBid, BidError> {
    let mut builder = bid.to_builder();
    for entry in entries {
        match builder.contains_bundle(entry.bundle()).map(BidEntry::value) {
            None => {
                builder.add(entry)?;
            }
            Some(recorded) if entry.value() > recorded => {
                builder.replace(entry)?;
            }
            Some(_) => {}
        }
    }
    Ok(builder.build())
}
