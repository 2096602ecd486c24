//! # Context Relevance Core
//!
//! Pure, synchronous logic for deciding when a recorded business event
//! (a promotion, a product launch, a site outage, a standing strategy)
//! is relevant to a reporting window, and whether it should be surfaced
//! as a plausible explanation for a period-over-period metric swing.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or global state.
//! The [`registry::CategoryRegistry`] is an explicitly constructed value
//! passed into the [`evaluator`] and [`comparison`] functions, so callers
//! and tests can substitute alternate registries freely.

pub mod comparison;
pub mod evaluator;
pub mod models;
pub mod registry;
pub mod store;
pub mod warning;
