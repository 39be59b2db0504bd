//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::decision::Metric;
use crate::fixed::{Fixed64, Ticks};
use crate::id::{ChainId, StageId, WorkerId};
use crate::network::{ChainConfig, StageConfig};
use crate::strategy::{Criterion, SelectionStrategy};
use crate::system::{System, SystemConfig, WorkOrder, WorkOrderBook};
use crate::worker::WorkerConfig;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Strategies
// ===========================================================================

pub fn fifo() -> SelectionStrategy {
    SelectionStrategy::new("fifo", vec![Criterion::min(Metric::ItemNumber)])
}

pub fn lifo() -> SelectionStrategy {
    SelectionStrategy::new("lifo", vec![Criterion::max(Metric::ItemNumber)])
}

/// Finish what is closest to done, oldest first on ties.
pub fn nearest_done() -> SelectionStrategy {
    SelectionStrategy::new(
        "nearest_done",
        vec![
            Criterion::min(Metric::RemainingEffortInChain),
            Criterion::max(Metric::ElapsedInChain),
        ],
    )
}

// ===========================================================================
// Worker configs
// ===========================================================================

/// A worker that only knows FIFO and adapts every 5 ticks.
pub fn fifo_worker(name: &str) -> WorkerConfig {
    WorkerConfig::new(name)
        .with_strategy(fifo(), 1.0)
        .with_observation_period(5)
}

/// A worker that learns between FIFO, LIFO and nearest-done.
pub fn learning_worker(name: &str, period: Ticks) -> WorkerConfig {
    WorkerConfig::new(name)
        .with_strategy(fifo(), 1.0)
        .with_strategy(lifo(), 1.0)
        .with_strategy(nearest_done(), 1.0)
        .with_observation_period(period)
}

// ===========================================================================
// Systems
// ===========================================================================

/// One chain `"work"` (value 10) with a single stage of `effort` and one
/// FIFO worker assigned to it.
pub fn single_stage_system(effort: u32) -> (System, ChainId, WorkerId) {
    let mut system = System::new(SystemConfig::default());
    let chain = system
        .add_chain(
            ChainConfig::new("work", fixed(10.0)).with_stage(StageConfig::new("do", effort)),
        )
        .unwrap();
    let worker = system.add_worker(fifo_worker("solo")).unwrap();
    system.assign(worker, StageId::new(chain, 0)).unwrap();
    (system, chain, worker)
}

/// One chain `"build"` (value 100) with stages of effort 1, 2, 1 and two
/// learning workers covering every stage.
pub fn two_worker_system(seed: u64) -> System {
    let mut system = System::new(SystemConfig {
        start_time: 0,
        seed,
    });
    let chain = system
        .add_chain(
            ChainConfig::new("build", fixed(100.0))
                .with_stage(StageConfig::new("design", 1))
                .with_stage(StageConfig::new("code", 2))
                .with_stage(StageConfig::new("ship", 1)),
        )
        .unwrap();
    for name in ["ann", "bob"] {
        let worker = system.add_worker(learning_worker(name, 4)).unwrap();
        for step in 0..3 {
            system.assign(worker, StageId::new(chain, step)).unwrap();
        }
    }
    system
}

/// `per_tick` orders for `chain` at every tick in `1..=ticks`.
pub fn steady_orders(chain: ChainId, ticks: Ticks, per_tick: usize) -> WorkOrderBook {
    (1..=ticks)
        .flat_map(|tick| std::iter::repeat_n(WorkOrder { tick, chain }, per_tick))
        .collect()
}
