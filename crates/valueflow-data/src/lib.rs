//! Valueflow Data -- scenario files for the value-chain simulation.
//!
//! A scenario is a directory of RON, JSON or TOML files describing chains,
//! workers, assignments and work orders. [`load_scenario`] resolves the
//! names they use into ids and returns a ready-to-run
//! [`System`](valueflow_core::system::System).

pub mod loader;
pub mod scenario;
pub mod schema;

pub use loader::DataLoadError;
pub use scenario::{Scenario, load_scenario};
