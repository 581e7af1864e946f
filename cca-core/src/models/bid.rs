use super::{BidderId, Bundle, Map};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

// Entries are identified by creation order, across all bidders and all bids.
static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(0);

/// A single (bundle, declared value) pair of an XOR bid.
///
/// The id is assigned on creation and only serves to tell entries apart; it
/// carries no ordering semantics for the auction. Deserialized entries get a
/// fresh id, and their value is checked like [`XorBidBuilder::add`] does.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "EntryRecord")
)]
pub struct BidEntry {
    id: u64,
    bundle: Bundle,
    value: f64,
}

impl BidEntry {
    /// Create a new entry with a fresh id
    pub fn new(bundle: Bundle, value: f64) -> Self {
        Self {
            id: NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed),
            bundle,
            value,
        }
    }

    /// The creation-order identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The bundle this entry bids on
    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    /// The declared value for the bundle
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Whether both entries bid on the same set of goods
    pub fn same_bundle(&self, other: &BidEntry) -> bool {
        self.bundle == other.bundle
    }
}

/// The ways in which a bid under construction can be invalid.
#[derive(Debug, PartialEq, Error)]
pub enum BidError {
    /// The bid already holds an entry for this bundle
    #[error("bidder {bidder} already bids on bundle {bundle}")]
    DuplicateBundle {
        /// The bidder whose bid was being built
        bidder: BidderId,
        /// The offending bundle
        bundle: Bundle,
    },
    /// Declared values must be finite and non-negative
    #[error("invalid value {value} for bundle {bundle}")]
    InvalidValue {
        /// The offending bundle
        bundle: Bundle,
        /// The offending value
        value: f64,
    },
}

/// An XOR bid: the bidder wants at most one of its entries.
///
/// Entries keep their insertion order, and no two entries share a bundle.
/// An `XorBid` is immutable; changes go through [`XorBidBuilder`], which
/// produces a new snapshot. Deserialization goes through the builder as well.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "BidRecord")
)]
pub struct XorBid {
    bidder: BidderId,
    entries: Vec<BidEntry>,
}

impl XorBid {
    /// Start building a bid for the bidder
    pub fn builder(bidder: BidderId) -> XorBidBuilder {
        XorBidBuilder::new(bidder)
    }

    /// The bidder who submitted this bid
    pub fn bidder(&self) -> BidderId {
        self.bidder
    }

    /// The entries, in insertion order
    pub fn entries(&self) -> &[BidEntry] {
        &self.entries
    }

    /// The number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bid holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the entry for a bundle, if any
    pub fn contains_bundle(&self, bundle: &Bundle) -> Option<&BidEntry> {
        self.entries.iter().find(|entry| entry.bundle() == bundle)
    }

    /// The largest declared value over all entries (0 for an empty bid)
    pub fn max_value(&self) -> f64 {
        self.entries
            .iter()
            .map(BidEntry::value)
            .fold(0.0, f64::max)
    }

    /// A builder seeded with this bid's entries
    pub fn to_builder(&self) -> XorBidBuilder {
        XorBidBuilder {
            bidder: self.bidder,
            entries: self.entries.clone(),
        }
    }
}

/// Incremental construction of an [`XorBid`].
///
/// Every mutation checks the bid invariants, so `build` cannot fail.
#[derive(Debug, Clone)]
pub struct XorBidBuilder {
    bidder: BidderId,
    entries: Vec<BidEntry>,
}

impl XorBidBuilder {
    /// An empty builder for the bidder
    pub fn new(bidder: BidderId) -> Self {
        Self {
            bidder,
            entries: Vec::new(),
        }
    }

    /// The bidder this bid is built for
    pub fn bidder(&self) -> BidderId {
        self.bidder
    }

    /// Look up the entry for a bundle, if any
    pub fn contains_bundle(&self, bundle: &Bundle) -> Option<&BidEntry> {
        self.entries.iter().find(|entry| entry.bundle() == bundle)
    }

    /// Append an entry, rejecting duplicate bundles and invalid values
    pub fn add(&mut self, entry: BidEntry) -> Result<&mut Self, BidError> {
        if !(entry.value().is_finite() && entry.value() >= 0.0) {
            return Err(BidError::InvalidValue {
                bundle: entry.bundle,
                value: entry.value,
            });
        }
        if self.contains_bundle(entry.bundle()).is_some() {
            return Err(BidError::DuplicateBundle {
                bidder: self.bidder,
                bundle: entry.bundle,
            });
        }
        self.entries.push(entry);
        Ok(self)
    }

    /// Convenience for `add(BidEntry::new(bundle, value))`
    pub fn add_value(
        &mut self,
        bundle: impl Into<Bundle>,
        value: f64,
    ) -> Result<&mut Self, BidError> {
        self.add(BidEntry::new(bundle.into(), value))
    }

    /// Remove an entry by its identity, returning it if present
    pub fn remove(&mut self, entry_id: u64) -> Option<BidEntry> {
        let position = self.entries.iter().position(|entry| entry.id() == entry_id)?;
        Some(self.entries.remove(position))
    }

    /// Put `entry` in place of the entry holding the same bundle.
    ///
    /// The new entry is appended, so it becomes the most recent one. Returns the
    /// entry that was replaced, if there was one.
    pub fn replace(&mut self, entry: BidEntry) -> Result<Option<BidEntry>, BidError> {
        let previous = self
            .entries
            .iter()
            .position(|existing| existing.same_bundle(&entry))
            .map(|position| self.entries.remove(position));
        match self.add(entry) {
            Ok(_) => Ok(previous),
            Err(error) => {
                // put the old entry back so a failed replace leaves no trace
                if let Some(previous) = previous {
                    self.entries.push(previous);
                }
                Err(error)
            }
        }
    }

    /// The number of entries so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were added so far
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Produce the immutable bid
    pub fn build(self) -> XorBid {
        XorBid {
            bidder: self.bidder,
            entries: self.entries,
        }
    }
}

// The serialized form of an entry; a stored id is ignored
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct EntryRecord {
    bundle: Bundle,
    value: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<EntryRecord> for BidEntry {
    type Error = BidError;

    fn try_from(record: EntryRecord) -> Result<Self, Self::Error> {
        if !(record.value.is_finite() && record.value >= 0.0) {
            return Err(BidError::InvalidValue {
                bundle: record.bundle,
                value: record.value,
            });
        }
        Ok(BidEntry::new(record.bundle, record.value))
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct BidRecord {
    bidder: BidderId,
    entries: Vec<BidEntry>,
}

#[cfg(feature = "serde")]
impl TryFrom<BidRecord> for XorBid {
    type Error = BidError;

    fn try_from(record: BidRecord) -> Result<Self, Self::Error> {
        let mut builder = XorBid::builder(record.bidder);
        for entry in record.entries {
            builder.add(entry)?;
        }
        Ok(builder.build())
    }
}

/// The bids of all participating bidders, one XOR bid per bidder.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BidSet(Map<BidderId, XorBid>);

impl BidSet {
    /// An empty bid set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a bid, replacing (and returning) the bidder's previous bid
    pub fn insert(&mut self, bid: XorBid) -> Option<XorBid> {
        self.0.insert(bid.bidder(), bid)
    }

    /// The bid of a bidder, or `None` if the bidder did not participate
    pub fn get(&self, bidder: BidderId) -> Option<&XorBid> {
        self.0.get(&bidder)
    }

    /// Iterate over all bids
    pub fn iter(&self) -> impl Iterator<Item = &XorBid> {
        self.0.values()
    }

    /// Iterate over the participating bidders
    pub fn bidders(&self) -> impl Iterator<Item = BidderId> + '_ {
        self.0.keys().copied()
    }

    /// The number of bids
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no bids
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A copy of this bid set without the bidder's bid
    pub fn without(&self, bidder: BidderId) -> BidSet {
        self.iter()
            .filter(|bid| bid.bidder() != bidder)
            .cloned()
            .collect()
    }

    /// The number of entries per bidder
    pub fn entry_counts(&self) -> Map<BidderId, usize> {
        self.iter().map(|bid| (bid.bidder(), bid.len())).collect()
    }

    /// The largest declared value over every entry of every bid
    pub fn max_value(&self) -> f64 {
        self.iter().map(XorBid::max_value).fold(0.0, f64::max)
    }
}

impl FromIterator<XorBid> for BidSet {
    fn from_iter<T: IntoIterator<Item = XorBid>>(iter: T) -> Self {
        Self(iter.into_iter().map(|bid| (bid.bidder(), bid)).collect())
    }
}

impl IntoIterator for BidSet {
    type Item = XorBid;
    type IntoIter = indexmap::map::IntoValues<BidderId, XorBid>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_inner().into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GoodId;

    fn bundle(goods: &[u64]) -> Bundle {
        goods.iter().map(|&g| GoodId(g)).collect()
    }

    #[test]
    fn builder_rejects_duplicate_bundles() {
        let mut builder = XorBid::builder(BidderId(1));
        builder.add_value(bundle(&[1, 2]), 5.0).unwrap();
        let error = builder.add_value(bundle(&[2, 1]), 6.0).unwrap_err();
        assert!(matches!(error, BidError::DuplicateBundle { .. }));
        assert_eq!(builder.build().len(), 1);
    }

    #[test]
    fn builder_rejects_invalid_values() {
        let mut builder = XorBid::builder(BidderId(1));
        assert!(builder.add_value(bundle(&[1]), -1.0).is_err());
        assert!(builder.add_value(bundle(&[1]), f64::NAN).is_err());
        assert!(builder.is_empty());
    }

    #[test]
    fn replace_moves_entry_to_the_end() {
        let mut builder = XorBid::builder(BidderId(1));
        builder
            .add_value(bundle(&[1]), 1.0)
            .unwrap()
            .add_value(bundle(&[2]), 1.0)
            .unwrap();
        let old = builder
            .replace(BidEntry::new(bundle(&[1]), 3.0))
            .unwrap()
            .unwrap();
        assert_eq!(old.value(), 1.0);

        let bid = builder.build();
        assert_eq!(bid.len(), 2);
        assert_eq!(bid.entries()[1].bundle(), &bundle(&[1]));
        assert_eq!(bid.contains_bundle(&bundle(&[1])).unwrap().value(), 3.0);
        assert_eq!(bid.max_value(), 3.0);
    }

    #[test]
    fn remove_by_identity() {
        let mut builder = XorBid::builder(BidderId(1));
        builder.add_value(bundle(&[1]), 1.0).unwrap();
        let id = builder.contains_bundle(&bundle(&[1])).unwrap().id();
        assert!(builder.remove(id + 1_000_000).is_none());
        assert!(builder.remove(id).is_some());
        assert!(builder.is_empty());
    }

    #[test]
    fn entry_ids_follow_creation_order() {
        let a = BidEntry::new(bundle(&[1]), 1.0);
        let b = BidEntry::new(bundle(&[1]), 1.0);
        assert!(a.id() < b.id());
        assert!(a.same_bundle(&b));
    }

    #[test]
    fn bid_set_lookups() {
        let mut first = XorBid::builder(BidderId(1));
        first.add_value(bundle(&[1]), 4.0).unwrap();
        let mut second = XorBid::builder(BidderId(2));
        second.add_value(bundle(&[2]), 7.0).unwrap();

        let bids: BidSet = [first.build(), second.build()].into_iter().collect();
        assert_eq!(bids.len(), 2);
        assert_eq!(bids.max_value(), 7.0);
        assert!(bids.get(BidderId(3)).is_none());

        let without = bids.without(BidderId(2));
        assert_eq!(without.bidders().collect::<Vec<_>>(), vec![BidderId(1)]);
        assert_eq!(bids.entry_counts()[&BidderId(2)], 1);
    }
}
