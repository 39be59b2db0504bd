//! Valueflow Core -- a discrete-time simulation of work flowing through
//! value chains.
//!
//! Work items enter a value chain at its first stage, collect one unit of
//! effort per tick from whichever worker picks them, and advance stage by
//! stage until they reach the shared sink, where the chain's value (less any
//! decay for delay) is realized. Workers choose items with ranked selection
//! strategies and periodically re-weight those strategies against a success
//! measure.
//!
//! # Tick Pipeline
//!
//! Each call to [`system::System::step`] advances the simulation by one tick:
//!
//! 1. **Clock** -- advance time, reset stage exit counters.
//! 2. **Flow** -- items whose effort reached their stage threshold advance.
//! 3. **Inject** -- work orders and stochastic arrivals enter stage 0.
//! 4. **Decide** -- decision info is recomputed from every item log.
//! 5. **Work** -- workers, in shuffled order, adapt on period boundaries and
//!    work one item each.
//! 6. **Bookkeeping** -- decision info and worker utilization refresh.
//!
//! # Key Types
//!
//! - [`system::System`] -- Orchestrator, statistics and snapshots.
//! - [`network::FlowNetwork`] -- Chains, stages, the sink and every item.
//! - [`item::WorkItem`] -- An item and its append-only event log.
//! - [`worker::Worker`] -- Selection, learning and utilization.
//! - [`strategy::SelectionStrategy`] -- Ordered (metric, extremum) criteria.
//! - [`stats::SystemStatistics`] -- Cycle times, throughput and ROCE.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.

pub mod assignment;
pub mod decision;
pub mod error;
pub mod fixed;
pub mod id;
pub mod item;
pub mod network;
pub mod query;
pub mod sim;
pub mod stats;
pub mod strategy;
pub mod system;
pub mod worker;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
