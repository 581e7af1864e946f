use thiserror::Error;

/// The ways in which a solve can fail.
///
/// Reaching the time limit is only an error when no feasible solution was
/// found before it; otherwise the incumbent is returned.
#[derive(Debug, Error)]
pub enum SolverError {
    /// No assignment satisfies the constraints
    #[error("the program is infeasible")]
    Infeasible,
    /// The objective can be improved without bound
    #[error("the program is unbounded")]
    Unbounded,
    /// The time limit was reached before any feasible solution was found
    #[error("the time limit was reached before a feasible solution was found")]
    TimeLimit,
    /// The program could not be handed to the backend
    #[error("the solver rejected the program: {0}")]
    Setup(String),
    /// The backend stopped for numerical reasons
    #[error("the solver failed with status {0}")]
    Numerical(String),
}
