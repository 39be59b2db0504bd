//! Error types for building and running a simulation.
//!
//! [`ConfigError`]s are raised while the object graph is assembled and are
//! fatal: nothing ticks until the graph is valid. [`SimError`]s signal an
//! invariant violation inside a running simulation and are never retried.

use crate::id::{ChainId, ItemId, StageId, WorkerId};

/// Errors raised while assembling chains, workers and assignments.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown ranking metric '{0}'")]
    UnknownMetric(String),
    #[error("unknown extremum '{0}' (expected 'min' or 'max')")]
    UnknownExtremum(String),
    #[error("malformed selection criterion '{0}' (expected 'metric:min' or 'metric:max')")]
    MalformedCriterion(String),
    #[error("unknown success measure '{0}'")]
    UnknownSuccessMeasure(String),
    #[error("value chain not found: {0:?}")]
    ChainNotFound(ChainId),
    #[error("stage not found: {0:?}")]
    StageNotFound(StageId),
    #[error("worker not found: {0:?}")]
    WorkerNotFound(WorkerId),
    #[error("value chain '{0}' has no stages")]
    EmptyChain(String),
    #[error("stage '{0}' must require at least one unit of effort")]
    ZeroEffort(String),
    #[error("stage '{0}' has a WIP limit of zero")]
    ZeroWipLimit(String),
    #[error("discount rate {0} outside [0, 1]")]
    InvalidDiscountRate(f64),
    #[error("injection rate {0} must be finite and non-negative")]
    InvalidInjectionRate(f64),
    #[error("worker '{0}' has no selection strategies")]
    NoStrategies(String),
    #[error("worker '{0}' needs a positive observation period")]
    ZeroObservationPeriod(String),
    #[error("weight floor {floor} is infeasible for {strategies} strategies")]
    InfeasibleWeightFloor { floor: f64, strategies: usize },
    #[error("worker '{0}' has a negative or non-finite strategy weight")]
    InvalidWeight(String),
}

/// Invariant violations detected while the simulation runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("item not found: {0:?}")]
    ItemNotFound(ItemId),
    #[error("value chain not found: {0:?}")]
    ChainNotFound(ChainId),
    #[error("stage not found: {0:?}")]
    StageNotFound(StageId),
    #[error("item '{tag}' has no history in the requested scope")]
    EmptyHistory { tag: String },
    #[error("item '{tag}' is not resident in a stage")]
    NotInStage { tag: String },
    #[error("strategy weights cannot be sampled: {0}")]
    Sampling(#[from] rand::distributions::WeightedError),
}
