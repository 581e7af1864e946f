use cca_core::models::{BidError, BidderId};
use thiserror::Error;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Invalid settings, or settings changed after the phase they affect already ran.
///
/// These are detected eagerly and are never worth retrying.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The clock phase ran already; its inputs are frozen
    #[error("the clock phase already ran, change its settings before running it")]
    ClockPhaseAlreadyRun,
    /// The supplementary round ran already; its strategies are frozen
    #[error("the supplementary round already ran")]
    SupplementaryRoundAlreadyRun,
    /// The payments were computed already; the payment rule is frozen
    #[error("the payments were computed already")]
    PaymentsAlreadyComputed,
    /// An auction needs at least one bidder
    #[error("the auction has no bidders")]
    NoBidders,
    /// A numeric setting is out of range
    #[error("invalid {name}: {reason}")]
    InvalidParameter {
        /// The name of the setting
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Everything that can stop a mechanism from producing its result.
#[derive(Debug, Error)]
pub enum MechanismError {
    /// The mechanism is misconfigured
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A bid violated the bid invariants
    #[error(transparent)]
    Bid(#[from] BidError),
    /// The demand oracle failed to answer a query
    #[error("the demand query for bidder {bidder} failed")]
    Oracle {
        /// The bidder being queried
        bidder: BidderId,
        /// The oracle's error
        #[source]
        source: BoxError,
    },
    /// The solving service failed. Winner determination is always feasible, so
    /// this points at a defect rather than at bad input.
    #[error("the solver failed on the {context}")]
    Solver {
        /// The program being solved
        context: &'static str,
        /// The solver's error
        #[source]
        source: BoxError,
    },
}

impl MechanismError {
    pub(crate) fn solver<E: std::error::Error + Send + Sync + 'static>(
        context: &'static str,
    ) -> impl FnOnce(E) -> Self {
        move |error| Self::Solver {
            context,
            source: Box::new(error),
        }
    }

    pub(crate) fn oracle<E: std::error::Error + Send + Sync + 'static>(
        bidder: BidderId,
    ) -> impl FnOnce(E) -> Self {
        move |error| Self::Oracle {
            bidder,
            source: Box::new(error),
        }
    }
}
