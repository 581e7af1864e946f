#![warn(missing_docs)]
//! Combinatorial auction mechanisms over indivisible goods.
//!
//! The pipeline of a combinatorial clock auction is
//!
//! 1. the [clock phase](ClockPhase), which raises prices on over-demanded goods
//!    and records every demanded bundle as an XOR bid,
//! 2. the [supplementary round](SupplementaryRound), which enriches those bids,
//! 3. [winner determination](WinnerDetermination) over the final bids, and
//! 4. a payment rule: [VCG](VcgMechanism) or [core-constrained](CcgMechanism).
//!
//! [`CcaMechanism`] runs the whole pipeline and caches every intermediate
//! result. The VCG and CCG mechanisms can also be used on their own, directly
//! on a set of XOR bids.

mod cca;
pub use cca::CcaMechanism;

mod ccg;
pub use ccg::CcgMechanism;

mod clock;
pub use clock::{ClockPhase, ClockPhaseOutcome, ClockState, PriceUpdater, SimpleRelativePriceUpdate};

mod error;
pub use error::{ConfigError, MechanismError};

mod mechanism;
pub use mechanism::AuctionMechanism;

mod sampling;
pub use sampling::{StartingPriceSampling, sampled_starting_prices};

mod supplementary;
pub use supplementary::{
    LastBidsTrueValue, ProfitMaximizing, SupplementaryRound, merge_supplementary_bids,
};

mod vcg;
pub use vcg::VcgMechanism;

mod wdp;
pub use wdp::WinnerDetermination;
