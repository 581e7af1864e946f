use crate::models::{BidderId, Bundle, PriceVector};
use std::time::Duration;

/// One answer of a demand query: a bundle and what the bidder would pay for it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DemandResponse {
    /// The demanded bundle
    pub bundle: Bundle,
    /// The bidder's willingness to pay for the bundle
    pub willingness_to_pay: f64,
}

/// Interface for asking bidders what they demand at given prices.
///
/// This is how a mechanism learns about bidders without knowing their
/// valuation model. Queries within one clock round are issued concurrently,
/// hence the `Sync` bound.
pub trait DemandOracle: Sync {
    /// Error type for oracle failures
    type Error: std::error::Error + Send + Sync + 'static;

    /// Ask a bidder for its best responses at `prices`.
    ///
    /// # Arguments
    ///
    /// - `bidder`: the bidder being queried
    /// - `prices`: the price of every good
    /// - `epsilon`: the minimal improvement over holding nothing a bundle must offer
    /// - `pool_size`: the maximal number of bundles to return
    /// - `time_limit`: the time budget of the underlying optimization, if any
    ///
    /// # Returns
    ///
    /// At most `pool_size` responses, best first. The list is empty only when no
    /// bundle beats holding nothing.
    fn query(
        &self,
        bidder: BidderId,
        prices: &PriceVector,
        epsilon: f64,
        pool_size: usize,
        time_limit: Option<Duration>,
    ) -> Result<Vec<DemandResponse>, Self::Error>;
}

impl<T: DemandOracle + ?Sized> DemandOracle for &T {
    type Error = T::Error;

    fn query(
        &self,
        bidder: BidderId,
        prices: &PriceVector,
        epsilon: f64,
        pool_size: usize,
        time_limit: Option<Duration>,
    ) -> Result<Vec<DemandResponse>, Self::Error> {
        (**self).query(bidder, prices, epsilon, pool_size, time_limit)
    }
}
