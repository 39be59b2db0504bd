//! End-to-end scenarios for the valueflow core.

use valueflow_core::fixed::Fixed64;
use valueflow_core::id::{Holder, StageId};
use valueflow_core::item::Elapsed;
use valueflow_core::network::{ChainConfig, StageConfig, ValueDecay, discount_rate, discounted, expired};
use valueflow_core::system::{System, SystemConfig, WorkOrder, WorkOrderBook};
use valueflow_core::test_utils::*;
use valueflow_core::worker::{SuccessMeasure, WorkerEvent};

// ===========================================================================
// Flow
// ===========================================================================

#[test]
fn single_stage_item_reaches_sink_with_elapsed_one() {
    let (mut system, chain, _) = single_stage_system(1);

    system.step(&[WorkOrder { tick: 1, chain }]).unwrap();
    let stage = system.network().stage(StageId::new(chain, 0)).unwrap();
    assert_eq!(stage.items().len(), 1);
    let id = stage.items()[0];
    assert_eq!(
        system.network().item(id).unwrap().holder(),
        Holder::Stage(StageId::new(chain, 0))
    );

    system.step(&[]).unwrap();
    let item = system.network().item(id).unwrap();
    assert_eq!(item.holder(), Holder::Sink);
    assert_eq!(item.elapsed_time(Elapsed::Completed, None), Ok(1));
    assert_eq!(system.network().realized_value(item), fixed(10.0));
}

#[test]
fn two_items_one_worker_both_finish() {
    let (mut system, chain, worker) = single_stage_system(1);
    let orders = [WorkOrder { tick: 1, chain }, WorkOrder { tick: 1, chain }];

    assert_eq!(system.step(&orders).unwrap().worked, 1);
    assert_eq!(system.step(&[]).unwrap().worked, 1);

    // Both are finished within two ticks; the second reaches the sink on
    // the following flow phase.
    for (_, item) in system.network().items() {
        assert!(system.network().is_finished(item));
    }
    system.step(&[]).unwrap();
    assert_eq!(system.network().sink().len(), 2);
    assert_eq!(system.worker(worker).unwrap().ticks_worked(0, 3), 2);
}

#[test]
fn fifo_works_oldest_first() {
    let (mut system, chain, _) = single_stage_system(2);
    let book: WorkOrderBook = [1, 2].into_iter().map(|tick| WorkOrder { tick, chain }).collect();
    system.run(2, &book).unwrap();

    let first = system
        .network()
        .items()
        .find(|(_, item)| item.number() == 1)
        .map(|(_, item)| item.accumulated_effort(u64::MAX, None));
    assert_eq!(first, Some(2));
}

#[test]
fn multi_stage_pipeline_takes_minimal_cycle_time_when_uncontended() {
    let mut system = System::new(SystemConfig::default());
    let chain = system
        .add_chain(
            ChainConfig::new("build", fixed(90.0))
                .with_decay(discount_rate(0.5))
                .with_stage(StageConfig::new("design", 1))
                .with_stage(StageConfig::new("code", 2)),
        )
        .unwrap();
    let worker = system.add_worker(fifo_worker("dev")).unwrap();
    for step in 0..2 {
        system.assign(worker, StageId::new(chain, step)).unwrap();
    }
    system.step(&[WorkOrder { tick: 1, chain }]).unwrap();
    for _ in 0..3 {
        system.step(&[]).unwrap();
    }
    let sink = system.network().sink();
    assert_eq!(sink.len(), 1);
    let item = system.network().item(sink.items()[0]).unwrap();
    assert_eq!(item.elapsed_time(Elapsed::Completed, None), Ok(3));
    assert_eq!(system.network().realized_value(item), fixed(90.0));

    let stats = system.system_statistics(0, system.time());
    assert_eq!(stats.sink.items, 1);
    assert_eq!(stats.sink.value, fixed(90.0));
    assert_eq!(stats.chains[&chain].cycle_time.map(|c| c.min), Some(3));
}

#[test]
fn contention_delays_and_discounts() {
    // One worker, two items, effort 2: the second item waits two ticks.
    let mut system = System::new(SystemConfig::default());
    let chain = system
        .add_chain(
            ChainConfig::new("c", fixed(100.0))
                .with_decay(discount_rate(0.5))
                .with_stage(StageConfig::new("a", 2)),
        )
        .unwrap();
    let worker = system.add_worker(fifo_worker("w")).unwrap();
    system.assign(worker, StageId::new(chain, 0)).unwrap();
    system
        .step(&[WorkOrder { tick: 1, chain }, WorkOrder { tick: 1, chain }])
        .unwrap();
    for _ in 0..4 {
        system.step(&[]).unwrap();
    }

    let values: Vec<Fixed64> = system
        .network()
        .sink()
        .items()
        .iter()
        .map(|&id| system.network().realized_value(system.network().item(id).unwrap()))
        .collect();
    // First: elapsed 2, excess 0. Second: elapsed 4, excess 2.
    assert_eq!(values, vec![fixed(100.0), fixed(25.0)]);
}

#[test]
fn wip_limit_holds_finished_items_upstream() {
    let mut system = System::new(SystemConfig::default());
    let chain = system
        .add_chain(
            ChainConfig::new("c", fixed(10.0))
                .with_stage(StageConfig::new("fast", 1))
                .with_stage(StageConfig::new("slow", 10).with_wip_limit(1)),
        )
        .unwrap();
    let front = system.add_worker(fifo_worker("front")).unwrap();
    system.assign(front, StageId::new(chain, 0)).unwrap();

    let book = steady_orders(chain, 5, 1);
    system.run(6, &book).unwrap();

    let slow = system.network().stage(StageId::new(chain, 1)).unwrap();
    assert_eq!(slow.items().len(), 1);
    let fast = system.network().stage(StageId::new(chain, 0)).unwrap();
    assert_eq!(fast.items().len(), 4);
}

/// A WIP limit of one does not slow a balanced pipeline: the limited stage
/// frees its slot in the same flow phase that refills it.
#[test]
fn wip_limit_of_one_keeps_balanced_pipeline_throughput() {
    let sink_after = |limit: Option<u32>| {
        let mut system = System::new(SystemConfig::default());
        let mut second = StageConfig::new("b", 1);
        second.wip_limit = limit;
        let chain = system
            .add_chain(
                ChainConfig::new("c", fixed(10.0))
                    .with_stage(StageConfig::new("a", 1))
                    .with_stage(second),
            )
            .unwrap();
        for (name, step) in [("front", 0), ("back", 1)] {
            let worker = system.add_worker(fifo_worker(name)).unwrap();
            system.assign(worker, StageId::new(chain, step)).unwrap();
        }
        system.run(21, &steady_orders(chain, 21, 1)).unwrap();
        system.network().sink().len()
    };

    assert_eq!(sink_after(None), 19);
    assert_eq!(sink_after(Some(1)), sink_after(None));
}

// ===========================================================================
// Value decay
// ===========================================================================

#[test]
fn value_decay_reference_points() {
    assert_eq!(discounted(fixed(0.5), fixed(100.0), 2), fixed(25.0));
    assert_eq!(expired(3, fixed(100.0), 3), Fixed64::ZERO);
    assert_eq!(expired(3, fixed(100.0), 2), fixed(100.0));
    assert_eq!(ValueDecay::Net.apply(fixed(7.0), 1_000), fixed(7.0));
}

// ===========================================================================
// Learning
// ===========================================================================

#[test]
fn adaptation_log_has_seed_plus_one_entry_per_period() {
    let mut system = two_worker_system(3);
    let book = steady_orders(valueflow_core::id::ChainId(0), 20, 1);
    system.run(20, &book).unwrap();
    for worker in system.workers() {
        let adaptations: Vec<u64> = worker
            .log()
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::LearnedAndAdapted { tick, .. } => Some(*tick),
                WorkerEvent::Worked { .. } => None,
            })
            .collect();
        assert_eq!(adaptations, vec![0, 4, 8, 12, 16, 20]);
    }
}

#[test]
fn zero_measure_never_moves_weights() {
    let mut system = System::new(SystemConfig::default());
    let chain = system
        .add_chain(ChainConfig::new("c", fixed(10.0)).with_stage(StageConfig::new("a", 1)))
        .unwrap();
    let worker = system
        .add_worker(learning_worker("z", 2).with_success_measure(SuccessMeasure::Zero))
        .unwrap();
    system.assign(worker, StageId::new(chain, 0)).unwrap();
    let before = system.worker(worker).unwrap().weights().to_vec();
    system.run(10, &steady_orders(chain, 10, 1)).unwrap();
    let after = system.worker(worker).unwrap().weights();
    for (a, b) in before.iter().zip(after) {
        assert!((a - b).abs() < 1e-12);
    }
}

// ===========================================================================
// Statistics and determinism
// ===========================================================================

#[test]
fn statistics_are_idempotent_on_an_unchanged_system() {
    let mut system = two_worker_system(9);
    system
        .run(40, &steady_orders(valueflow_core::id::ChainId(0), 40, 2))
        .unwrap();
    let now = system.time();
    assert_eq!(system.system_statistics(10, now), system.system_statistics(10, now));
    assert!(system.system_statistics(10, now).sink.items > 0);
}

#[test]
fn identical_seeds_produce_identical_runs() {
    let run = |seed| {
        let mut system = two_worker_system(seed);
        system
            .run(50, &steady_orders(valueflow_core::id::ChainId(0), 50, 2))
            .unwrap();
        system.state_hash()
    };
    assert_eq!(run(5), run(5));
}

#[test]
fn subscriber_sees_tick_events() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("valueflow_core=trace"))
        .with_test_writer()
        .try_init();
    let (mut system, chain, _) = single_stage_system(1);
    system.run(3, &steady_orders(chain, 3, 1)).unwrap();
    assert_eq!(system.time(), 3);
}
