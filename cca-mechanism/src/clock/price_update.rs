use cca_core::models::{GoodId, Map, PriceVector, World};

/// A policy mapping the prices and demand of one clock round to the prices of
/// the next.
///
/// The clock phase stops once a policy returns the prices unchanged, so a
/// policy must leave prices alone when no good is over-demanded.
pub trait PriceUpdater: Send + Sync {
    /// The prices of the next round
    fn update_prices(
        &self,
        world: &World,
        prices: &PriceVector,
        demand: &Map<GoodId, usize>,
    ) -> PriceVector;
}

/// Raise the price of every over-demanded good by a fixed share of itself.
///
/// Goods priced at exactly zero cannot grow relatively, so they jump to the
/// initial update instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleRelativePriceUpdate {
    price_update: f64,
    initial_update: f64,
}

impl Default for SimpleRelativePriceUpdate {
    fn default() -> Self {
        Self {
            price_update: 0.1,
            initial_update: 1e5,
        }
    }
}

impl SimpleRelativePriceUpdate {
    /// Use `price_update` as the relative step, e.g. 0.1 for +10%
    pub fn with_price_update(mut self, price_update: f64) -> Self {
        self.price_update = price_update;
        self
    }

    /// Use `initial_update` as the price of over-demanded goods priced at zero
    pub fn with_initial_update(mut self, initial_update: f64) -> Self {
        self.initial_update = initial_update;
        self
    }

    /// The relative step
    pub fn price_update(&self) -> f64 {
        self.price_update
    }

    /// The jump taken from a zero price
    pub fn initial_update(&self) -> f64 {
        self.initial_update
    }
}

impl PriceUpdater for SimpleRelativePriceUpdate {
    fn update_prices(
        &self,
        world: &World,
        prices: &PriceVector,
        demand: &Map<GoodId, usize>,
    ) -> PriceVector {
        prices
            .iter()
            .map(|(good, price)| {
                let demanded = demand.get(&good).copied().unwrap_or_default();
                if demanded <= world.supply(good) {
                    (good, price)
                } else if price == 0.0 {
                    (good, self.initial_update)
                } else {
                    (good, price * (1.0 + self.price_update))
                }
            })
            .collect()
    }
}
