use super::{Bundle, GoodId, Map, World};

/// A price for every good of a world.
///
/// Prices are non-negative. Lookups of goods outside the vector yield 0, which
/// only happens for bundles referencing goods of another world.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct PriceVector(Map<GoodId, f64>);

impl PriceVector {
    /// Price every good of the world at `price`
    pub fn uniform(world: &World, price: f64) -> Self {
        Self(world.goods().map(|good| (good, price.max(0.0))).collect())
    }

    /// Price every good of the world from `overrides`, using `fallback` for the rest
    pub fn with_fallback(world: &World, overrides: &Map<GoodId, f64>, fallback: f64) -> Self {
        Self(
            world
                .goods()
                .map(|good| {
                    let price = overrides.get(&good).copied().unwrap_or(fallback);
                    (good, price.max(0.0))
                })
                .collect(),
        )
    }

    /// The price of a single good
    pub fn get(&self, good: GoodId) -> f64 {
        self.0.get(&good).copied().unwrap_or_default()
    }

    /// Overwrite the price of a good (negative prices are clipped to 0)
    pub fn set(&mut self, good: GoodId, price: f64) {
        self.0.insert(good, price.max(0.0));
    }

    /// The sum of the prices of the bundle's goods
    pub fn bundle_price(&self, bundle: &Bundle) -> f64 {
        bundle.iter().map(|good| self.get(good)).sum()
    }

    /// Iterate over (good, price) pairs in the world's order
    pub fn iter(&self) -> impl Iterator<Item = (GoodId, f64)> + '_ {
        self.0.iter().map(|(good, price)| (*good, *price))
    }

    /// The number of priced goods
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no good is priced
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every price is at least the corresponding price in `other`
    pub fn dominates(&self, other: &PriceVector) -> bool {
        other.iter().all(|(good, price)| self.get(good) >= price)
    }
}

impl FromIterator<(GoodId, f64)> for PriceVector {
    fn from_iter<T: IntoIterator<Item = (GoodId, f64)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(good, price)| (good, price.max(0.0)))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_and_fallback() {
        let world = World::new([GoodId(1), GoodId(2), GoodId(3)]);
        let overrides = [(GoodId(2), 5.0), (GoodId(9), 1.0)]
            .into_iter()
            .collect::<Map<_, _>>();
        let prices = PriceVector::with_fallback(&world, &overrides, 1.5);

        assert_eq!(prices.len(), 3);
        assert_eq!(prices.get(GoodId(1)), 1.5);
        assert_eq!(prices.get(GoodId(2)), 5.0);
        assert_eq!(prices.get(GoodId(9)), 0.0);
        assert_eq!(prices.bundle_price(&Bundle::from([GoodId(1), GoodId(2)])), 6.5);
    }

    #[test]
    fn prices_are_never_negative() {
        let world = World::new([GoodId(1)]);
        let mut prices = PriceVector::uniform(&world, -3.0);
        assert_eq!(prices.get(GoodId(1)), 0.0);
        prices.set(GoodId(1), 2.0);
        assert!(prices.dominates(&PriceVector::uniform(&world, 1.0)));
        assert!(!prices.dominates(&PriceVector::uniform(&world, 3.0)));
    }
}
