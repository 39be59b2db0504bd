/// Errors raised while configuring or running a search.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimizerError {
    #[error("a search needs at least one dimension")]
    NoDimensions,
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("dimension {dimension}: lower bound {lower} exceeds upper bound {upper}")]
    InvertedBounds {
        dimension: usize,
        lower: i64,
        upper: i64,
    },
    #[error("start coordinate {value} outside bounds in dimension {dimension}")]
    StartOutOfBounds { dimension: usize, value: i64 },
    #[error("direction component {0} is not -1, 0 or 1")]
    InvalidDirection(i8),
    #[error("initial temperature must be positive and finite, got {0}")]
    InvalidTemperature(f64),
    #[error("temperature gradient must be non-negative and finite, got {0}")]
    InvalidGradient(f64),
    #[error("downhill step tolerance must be positive and finite, got {0}")]
    InvalidTolerance(f64),
    #[error("initial jump distance must be at least one")]
    ZeroJump,
    #[error("performance function returned {value} at {position:?}")]
    NonFinitePerformance { position: Vec<i64>, value: f64 },
}
