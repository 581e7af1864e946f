use crate::models::{BidderId, Bundle};
use rand::rngs::StdRng;

/// A bidder's true value for bundles.
///
/// Mechanisms never see true values while running; they are used to enrich
/// bids with true values for efficiency studies and to revalue allocations.
pub trait Valuation {
    /// The bidder's true value for the bundle
    fn value(&self, bidder: BidderId, bundle: &Bundle) -> f64;
}

impl<T: Valuation + ?Sized> Valuation for &T {
    fn value(&self, bidder: BidderId, bundle: &Bundle) -> f64 {
        (**self).value(bidder, bundle)
    }
}

/// Draws bids from populations similar to the participating one.
///
/// Used to estimate starting prices. Not every valuation model can draw
/// random bids, so callers check [`PopulationSampler::supports_random_bids`]
/// before asking for any.
pub trait PopulationSampler {
    /// Whether this sampler can draw random XOR bids at all
    fn supports_random_bids(&self) -> bool;

    /// Redraw a population similar to `bidders` and draw up to
    /// `bids_per_bidder` random (bundle, value) pairs from each of its bidders.
    fn sample_bids(
        &self,
        bidders: &[BidderId],
        bids_per_bidder: usize,
        rng: &mut StdRng,
    ) -> Vec<(Bundle, f64)>;
}
