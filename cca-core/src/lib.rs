#![warn(missing_docs)]
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

/// Core domain models for combinatorial auctions.
///
/// These are data structures with minimal business logic: the bid language,
/// allocations and payments produced by the mechanisms, and the program model
/// exchanged with a MIP solver.
pub mod models;

/// Interface traits for the collaborators of an auction mechanism.
///
/// These are the "ports" in the hexagonal architecture sense. Mechanisms only
/// ever see these traits, so the valuation models and the optimization
/// backend can be swapped without touching the auction logic.
pub mod ports;
