//! Office floor example: one value chain, two learning workers.
//!
//! Builds a three-stage chain, assigns two workers to every stage, feeds one
//! work order per tick and prints stage contents, worker strategies and the
//! sink economics every ten ticks.
//!
//! Run with: `cargo run -p valueflow-core --example office_floor`

use valueflow_core::decision::Metric;
use valueflow_core::fixed::{f64_to_fixed64, fixed64_to_f64};
use valueflow_core::id::StageId;
use valueflow_core::network::{ChainConfig, StageConfig, discount_rate};
use valueflow_core::strategy::{Criterion, SelectionStrategy};
use valueflow_core::system::{System, SystemConfig, WorkOrder};
use valueflow_core::worker::{SuccessMeasure, WorkerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut system = System::new(SystemConfig {
        start_time: 0,
        seed: 2024,
    });

    // --- Step 1: the chain ---

    // Value 100, losing 2% for every tick an item runs late.
    let chain = system.add_chain(
        ChainConfig::new("feature", f64_to_fixed64(100.0))
            .with_decay(discount_rate(0.02))
            .with_stage(StageConfig::new("design", 1))
            .with_stage(StageConfig::new("build", 3).with_wip_limit(4))
            .with_stage(StageConfig::new("review", 1)),
    )?;

    // --- Step 2: workers and assignments ---

    let fifo = SelectionStrategy::new("fifo", vec![Criterion::min(Metric::ItemNumber)]);
    let lifo = SelectionStrategy::new("lifo", vec![Criterion::max(Metric::ItemNumber)]);
    let finish_first = SelectionStrategy::parse(
        "finish_first",
        &["remaining_stages:min", "elapsed_in_chain:max"],
    )?;

    for (name, measure) in [("ann", SuccessMeasure::ValueContributed), ("bob", SuccessMeasure::Roce)] {
        let worker = system.add_worker(
            WorkerConfig::new(name)
                .with_strategy(fifo.clone(), 1.0)
                .with_strategy(lifo.clone(), 1.0)
                .with_strategy(finish_first.clone(), 1.0)
                .with_observation_period(5)
                .with_success_measure(measure),
        )?;
        for step in 0..3 {
            system.assign(worker, StageId::new(chain, step))?;
        }
    }

    // --- Step 3: run ---

    for _ in 0..40 {
        let tick = system.time() + 1;
        system.step(&[WorkOrder { tick, chain }])?;

        if tick % 10 != 0 {
            continue;
        }
        println!("--- tick {tick} ---");
        for stage in system.snapshot_stages() {
            println!(
                "  {:>8}/{:<8} items={:<3} exited={}",
                stage.chain,
                stage.name,
                stage.items.len(),
                stage.exited_last_tick
            );
        }
        for worker in system.snapshot_workers() {
            let utilization = worker.utilization.map(fixed64_to_f64).unwrap_or(0.0);
            println!(
                "  {:>5}: strategy={:<12} utilization={utilization:.2} weights={:.2?}",
                worker.name, worker.strategy, worker.weights
            );
        }
        let sink = system.system_statistics(0, tick).sink;
        println!(
            "  sink: items={} value={:.1} roce={:?}",
            sink.items,
            fixed64_to_f64(sink.value),
            sink.roce.map(fixed64_to_f64)
        );
    }

    Ok(())
}
