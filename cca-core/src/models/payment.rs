use super::{Allocation, BidderId, Map};

/// The amount each winner pays.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Payment(Map<BidderId, f64>);

impl Payment {
    /// Collect payments from (bidder, amount) pairs
    pub fn new(payments: impl IntoIterator<Item = (BidderId, f64)>) -> Self {
        Self(payments.into_iter().collect())
    }

    /// The amount paid by a bidder; bidders without a payment pay 0
    pub fn payment_of(&self, bidder: BidderId) -> f64 {
        self.0.get(&bidder).copied().unwrap_or_default()
    }

    /// The sum of all payments
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Iterate over (bidder, amount) pairs
    pub fn iter(&self) -> impl Iterator<Item = (BidderId, f64)> + '_ {
        self.0.iter().map(|(bidder, amount)| (*bidder, *amount))
    }

    /// The number of paying bidders
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nobody pays
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Multiply every amount by `factor`
    pub fn scaled(&self, factor: f64) -> Payment {
        self.iter().map(|(bidder, amount)| (bidder, amount * factor)).collect()
    }
}

impl FromIterator<(BidderId, f64)> for Payment {
    fn from_iter<T: IntoIterator<Item = (BidderId, f64)>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// The outcome of an auction mechanism: who gets what and who pays what.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MechanismResult {
    /// The payments of the winners
    pub payment: Payment,
    /// The allocation the payments refer to
    pub allocation: Allocation,
}

impl MechanismResult {
    /// Winners whose payment exceeds their declared trade value by more than `tolerance`
    pub fn overcharged(&self, tolerance: f64) -> impl Iterator<Item = BidderId> + '_ {
        self.allocation.winners().filter(move |&bidder| {
            self.payment.payment_of(bidder) > self.allocation.trade_value(bidder) + tolerance
        })
    }
}
