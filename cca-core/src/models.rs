mod allocation;
mod bid;
mod config;
mod good;
mod map;
mod payment;
mod price;
mod program;

pub use allocation::Allocation;
pub use bid::{BidEntry, BidError, BidSet, XorBid, XorBidBuilder};
pub use config::{CcaConfig, PaymentRule};
pub use good::{Bundle, World};
pub use map::{Map, Set};
pub use payment::{MechanismResult, Payment};
pub use price::PriceVector;
pub use program::{
    Comparison, Constraint, MAX_VALUE, Program, Sense, Solution, SolveStatus, VarId, VarKind,
    Variable,
};

macro_rules! id_wrapper {
    ($struct:ident) => {
        #[doc = concat!("A numeric newtype identifying a ", stringify!($struct))]
        #[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
        #[cfg_attr(
            feature = "serde",
            derive(serde::Serialize, serde::Deserialize),
            serde(transparent)
        )]
        #[repr(transparent)]
        pub struct $struct(pub u64);

        impl From<u64> for $struct {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $struct {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_wrapper!(GoodId);
id_wrapper!(BidderId);
