#![warn(missing_docs)]
//! A mixed-integer programming service for auction mechanisms.
//!
//! Continuous programs (LPs and convex QPs) are handed to an interior point
//! solver directly. Programs with binary or integer variables are solved by
//! depth-first branch-and-bound over their continuous relaxations.

/**
 * These are implementations of the MIP solving service.
 */
mod impls;
pub use impls::*;

mod branch;

mod error;
pub use error::SolverError;
