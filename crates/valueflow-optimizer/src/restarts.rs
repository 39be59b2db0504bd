//! Independent restarts of the same search with different seeds.
//!
//! Each restart owns its optimizer, position cache and performance function,
//! so nothing is shared between them. With the `parallel` feature the
//! restarts run on the rayon thread pool.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::OptimizerError;
use crate::search::{Optimizer, Performance, SearchConfig};

/// Result of one restart.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartOutcome {
    pub seed: u64,
    pub best: Vec<i64>,
    pub performance: f64,
    pub positions_visited: usize,
}

/// Run one search per seed for `calls` steps each.
///
/// `make_performance` builds a fresh performance function for each seed.
/// Outcomes come back in seed order.
pub fn run_restarts<P, F>(
    config: &SearchConfig,
    seeds: &[u64],
    calls: u64,
    make_performance: F,
) -> Result<Vec<RestartOutcome>, OptimizerError>
where
    P: Performance,
    F: Fn(u64) -> P + Sync + Send,
{
    let run_one = |&seed: &u64| -> Result<Option<RestartOutcome>, OptimizerError> {
        let config = config.clone().with_seed(seed);
        let mut optimizer = Optimizer::new(config, make_performance(seed))?;
        let best = optimizer.run(calls)?;
        Ok(best.map(|(best, performance)| RestartOutcome {
            seed,
            best,
            performance,
            positions_visited: optimizer.positions().len(),
        }))
    };

    #[cfg(feature = "parallel")]
    let outcomes: Result<Vec<_>, _> = seeds.par_iter().map(run_one).collect();
    #[cfg(not(feature = "parallel"))]
    let outcomes: Result<Vec<_>, _> = seeds.iter().map(run_one).collect();

    Ok(outcomes?.into_iter().flatten().collect())
}

/// The outcome with the highest performance. Earlier seeds win ties.
pub fn best_outcome(outcomes: &[RestartOutcome]) -> Option<&RestartOutcome> {
    outcomes.iter().fold(None, |best: Option<&RestartOutcome>, o| match best {
        Some(b) if b.performance >= o.performance => Some(b),
        _ => Some(o),
    })
}
