use crate::MechanismError;
use cca_core::models::{Allocation, MechanismResult, Payment};

/// A mechanism maps bids to an allocation and payments.
///
/// The result is computed on first access and cached; every later call
/// returns the very same value.
pub trait AuctionMechanism {
    /// The allocation and payments, computed on first access
    fn mechanism_result(&self) -> Result<&MechanismResult, MechanismError>;

    /// The payments of the winners
    fn payment(&self) -> Result<&Payment, MechanismError> {
        Ok(&self.mechanism_result()?.payment)
    }

    /// The allocation the payments refer to
    fn allocation(&self) -> Result<&Allocation, MechanismError> {
        Ok(&self.mechanism_result()?.allocation)
    }
}
