use super::{BidderId, Bundle, Map};
use crate::ports::Valuation;

/// An assignment of bundles to bidders together with their values.
///
/// Bidders absent from the allocation hold the empty bundle. Values are
/// whatever the producing value function says they are: the declared values
/// of the accepted bid entries for a solved WDP, or the true values after
/// [`Allocation::revalue`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Allocation {
    trades: Map<BidderId, (Bundle, f64)>,
    total_value: f64,
}

impl Allocation {
    /// Collect an allocation from (bidder, bundle, value) triples.
    ///
    /// Empty bundles are dropped, the total is the sum of the remaining values.
    pub fn new(trades: impl IntoIterator<Item = (BidderId, Bundle, f64)>) -> Self {
        let trades = trades
            .into_iter()
            .filter(|(_, bundle, _)| !bundle.is_empty())
            .map(|(bidder, bundle, value)| (bidder, (bundle, value)))
            .collect::<Map<_, _>>();
        let total_value = trades.values().map(|(_, value)| value).sum();
        Self {
            trades,
            total_value,
        }
    }

    /// The allocation where nobody receives anything
    pub fn empty() -> Self {
        Self::default()
    }

    /// The bidders receiving a non-empty bundle, in a stable order
    pub fn winners(&self) -> impl ExactSizeIterator<Item = BidderId> + '_ {
        self.trades.keys().copied()
    }

    /// Whether the bidder receives a non-empty bundle
    pub fn is_winner(&self, bidder: BidderId) -> bool {
        self.trades.contains_key(&bidder)
    }

    /// The bundle allocated to a bidder; `None` stands for the empty bundle
    pub fn bundle_of(&self, bidder: BidderId) -> Option<&Bundle> {
        self.trades.get(&bidder).map(|(bundle, _)| bundle)
    }

    /// The value of the bidder's trade (0 for losers)
    pub fn trade_value(&self, bidder: BidderId) -> f64 {
        self.trades
            .get(&bidder)
            .map(|(_, value)| *value)
            .unwrap_or_default()
    }

    /// The total value of the allocation
    pub fn total_value(&self) -> f64 {
        self.total_value
    }

    /// Iterate over (bidder, bundle, value) for every winner
    pub fn iter(&self) -> impl Iterator<Item = (BidderId, &Bundle, f64)> {
        self.trades
            .iter()
            .map(|(bidder, (bundle, value))| (*bidder, bundle, *value))
    }

    /// Recompute every trade value with another value function, typically the
    /// bidders' true valuation, keeping the assignment of goods unchanged.
    pub fn revalue(&self, valuation: &impl Valuation) -> Allocation {
        Allocation::new(self.iter().map(|(bidder, bundle, _)| {
            (bidder, bundle.clone(), valuation.value(bidder, bundle))
        }))
    }
}
