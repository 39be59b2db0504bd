//! The hill search tuning WIP limits of a running value chain against
//! system ROCE.

use valueflow_core::fixed::fixed64_to_f64;
use valueflow_core::id::StageId;
use valueflow_core::test_utils::{steady_orders, two_worker_system};
use valueflow_optimizer::restarts::{best_outcome, run_restarts};
use valueflow_optimizer::search::{Bounds, Optimizer, SearchConfig};

const TICKS: u64 = 60;

/// ROCE over a full run with WIP limits on the "code" and "ship" stages.
fn roce_with_limits(limits: &[i64]) -> f64 {
    let mut system = two_worker_system(5);
    let chain = system.network().chain_by_name("build").unwrap().id();
    for (offset, limit) in limits.iter().enumerate() {
        let stage = StageId::new(chain, offset as u32 + 1);
        system.set_wip_limit(stage, Some(*limit as u32)).unwrap();
    }
    system.run(TICKS, &steady_orders(chain, TICKS, 2)).unwrap();
    system
        .system_statistics(0, system.time())
        .sink
        .roce
        .map(fixed64_to_f64)
        .unwrap_or(0.0)
}

fn tuning_config() -> SearchConfig {
    SearchConfig::new(Bounds::uniform(2, 1, 8).unwrap(), vec![8, 8])
        .with_temperature(6.0, 0.2)
        .with_jump_distance(2)
        .with_downhill_tolerance(1.0)
}

#[test]
fn same_limits_score_the_same() {
    assert_eq!(roce_with_limits(&[3, 2]), roce_with_limits(&[3, 2]));
    assert!(roce_with_limits(&[8, 8]) > 0.0);
}

#[test]
fn search_never_ends_below_its_start() {
    let start = roce_with_limits(&[8, 8]);
    let mut optimizer = Optimizer::new(tuning_config().with_seed(7), roce_with_limits).unwrap();
    let (best, roce) = optimizer.run(40).unwrap().unwrap();

    assert!(roce >= start - 1e-9);
    assert!(optimizer.config().bounds.contains(&best));
    assert_eq!(optimizer.log().len(), 40);
    assert!((roce_with_limits(&best) - roce).abs() < 1e-9);
}

#[test]
fn restarts_agree_with_their_best() {
    let outcomes = run_restarts(&tuning_config(), &[1, 2, 3], 25, |_| roce_with_limits).unwrap();
    assert_eq!(outcomes.len(), 3);
    let best = best_outcome(&outcomes).unwrap();
    assert!(outcomes.iter().all(|o| o.performance <= best.performance));
    assert!(outcomes.iter().all(|o| o.positions_visited >= 1));
}
