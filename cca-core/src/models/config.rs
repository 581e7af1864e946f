use super::{GoodId, Map};
use std::time::Duration;

/// The payment rule applied to the final bids of an auction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum PaymentRule {
    /// Vickrey-Clarke-Groves opportunity-cost payments
    #[default]
    Vcg,
    /// Core-constrained payments closest to VCG
    Ccg,
}

/// The tunable parameters of a combinatorial clock auction.
///
/// The price-update policy and the supplementary-round strategies are
/// behaviour rather than data, so they are configured on the mechanism itself.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct CcaConfig {
    /// Explicit starting prices; goods missing here start at `fallback_starting_price`
    pub starting_prices: Map<GoodId, f64>,
    /// The starting price of every good without an explicit one
    pub fallback_starting_price: f64,
    /// The minimal improvement over holding nothing a demanded bundle must offer
    pub epsilon: f64,
    /// The clock phase stops after this many rounds at the latest
    pub max_rounds: usize,
    /// How many bundles each demand query of the clock phase may return
    pub clock_phase_bundles: usize,
    /// The payment rule applied to the final bids
    pub payment_rule: PaymentRule,
    /// The time limit of every individual solve and demand query
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde::option"))]
    pub time_limit: Option<Duration>,
}

impl Default for CcaConfig {
    fn default() -> Self {
        Self {
            starting_prices: Map::default(),
            fallback_starting_price: 0.0,
            epsilon: 1e-4,
            max_rounds: 1000,
            clock_phase_bundles: 1,
            payment_rule: PaymentRule::Vcg,
            time_limit: None,
        }
    }
}
