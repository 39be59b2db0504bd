//! Valueflow Optimizer -- a bounded stochastic hill search over integer
//! lattices.
//!
//! The search knows nothing about simulations. It asks an injected
//! [`Performance`](search::Performance) function to score lattice points and
//! walks towards higher scores, cooling a temperature that controls how far
//! it jumps and how many downhill steps it tolerates before retreating to the
//! best point seen.
//!
//! # Key Types
//!
//! - [`search::Optimizer`] -- One search trajectory; one transition per
//!   [`step`](search::Optimizer::step).
//! - [`search::SearchConfig`] -- Bounds, start point, temperature schedule.
//! - [`position::PositionCache`] -- Deduplicated visited points with running
//!   average performance.
//! - [`direction::Direction`] -- A step vector in `{-1, 0, 1}^N`.
//! - [`restarts::run_restarts`] -- Independent seeded restarts, on rayon with
//!   the `parallel` feature.

pub mod direction;
pub mod error;
pub mod position;
pub mod restarts;
pub mod search;
