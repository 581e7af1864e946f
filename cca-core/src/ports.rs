mod demand;
mod solver;
mod valuation;

pub use demand::{DemandOracle, DemandResponse};
pub use solver::MipSolver;
pub use valuation::{PopulationSampler, Valuation};
