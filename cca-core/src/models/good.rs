use super::{GoodId, Set};
use std::fmt;

/// The fixed universe of goods an auction is run over.
///
/// Every good has unit supply. The world's ordering of goods is the canonical
/// ordering used for price vectors and regressions.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct World {
    goods: Set<GoodId>,
}

impl World {
    /// Create a world from its goods. Duplicates are collapsed.
    pub fn new(goods: impl IntoIterator<Item = GoodId>) -> Self {
        Self {
            goods: goods.into_iter().collect(),
        }
    }

    /// The goods of the world, in canonical order
    pub fn goods(&self) -> impl ExactSizeIterator<Item = GoodId> + '_ {
        self.goods.iter().copied()
    }

    /// Whether the good belongs to this world
    pub fn contains(&self, good: GoodId) -> bool {
        self.goods.contains(&good)
    }

    /// The number of goods
    pub fn len(&self) -> usize {
        self.goods.len()
    }

    /// Whether the world has no goods at all
    pub fn is_empty(&self) -> bool {
        self.goods.is_empty()
    }

    /// The supply of a single good. Goods are indivisible with unit supply.
    pub fn supply(&self, good: GoodId) -> usize {
        if self.contains(good) { 1 } else { 0 }
    }
}

/// A set of goods.
///
/// The goods are kept sorted and deduplicated, so two bundles compare (and
/// hash) equal exactly when they contain the same goods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "Vec<GoodId>", into = "Vec<GoodId>")
)]
pub struct Bundle(Vec<GoodId>);

impl Bundle {
    /// The empty bundle
    pub fn empty() -> Self {
        Self::default()
    }

    /// Iterate over the goods in ascending order
    pub fn iter(&self) -> impl ExactSizeIterator<Item = GoodId> + '_ {
        self.0.iter().copied()
    }

    /// Whether the bundle contains the good
    pub fn contains(&self, good: GoodId) -> bool {
        self.0.binary_search(&good).is_ok()
    }

    /// The number of goods in the bundle
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the empty bundle
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the two bundles share at least one good
    pub fn intersects(&self, other: &Bundle) -> bool {
        self.iter().any(|good| other.contains(good))
    }

    /// The union of two bundles
    pub fn union(&self, other: &Bundle) -> Bundle {
        self.iter().chain(other.iter()).collect()
    }
}

impl FromIterator<GoodId> for Bundle {
    fn from_iter<T: IntoIterator<Item = GoodId>>(iter: T) -> Self {
        let mut goods = iter.into_iter().collect::<Vec<_>>();
        goods.sort_unstable();
        goods.dedup();
        Self(goods)
    }
}

impl From<Vec<GoodId>> for Bundle {
    fn from(value: Vec<GoodId>) -> Self {
        value.into_iter().collect()
    }
}

impl From<Bundle> for Vec<GoodId> {
    fn from(value: Bundle) -> Self {
        value.0
    }
}

impl<const N: usize> From<[GoodId; N]> for Bundle {
    fn from(value: [GoodId; N]) -> Self {
        value.into_iter().collect()
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, good) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{good}")?;
        }
        write!(f, "}}")
    }
}
