use crate::models::{Program, Solution};
use std::time::Duration;

/// Interface for the mathematical programming backend.
///
/// A solver takes a [`Program`] (binary, integer or continuous variables,
/// linear constraints, linear plus convex quadratic objective) and returns a
/// value for every variable.
///
/// Implementations must honor the time limit: when it is hit before
/// optimality is proven, they return the best feasible solution found so far,
/// flagged with [`crate::models::SolveStatus::TimeLimited`], instead of
/// failing. An error is reserved for programs without any solution (or
/// without one found in time) and for numerical breakdown.
///
/// Mechanisms share one solver across the threads of a round, hence the
/// `Sync` bound.
pub trait MipSolver: Sync {
    /// Error type for solver failures
    type Error: std::error::Error + Send + Sync + 'static;

    /// Solve the program, spending at most `time_limit` (if any)
    fn solve(&self, program: &Program, time_limit: Option<Duration>)
    -> Result<Solution, Self::Error>;
}

impl<T: MipSolver + ?Sized> MipSolver for &T {
    type Error = T::Error;

    fn solve(
        &self,
        program: &Program,
        time_limit: Option<Duration>,
    ) -> Result<Solution, Self::Error> {
        (**self).solve(program, time_limit)
    }
}
