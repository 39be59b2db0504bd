//! Scenario files loaded through valueflow-data drive the same simulation
//! as a system assembled in code.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use valueflow_core::test_utils::{steady_orders, two_worker_system};
use valueflow_core::worker::SuccessMeasure;
use valueflow_data::load_scenario;

fn make_test_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "valueflow_integration_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

/// The two-worker "build" scenario, spelled out as files.
fn write_build_scenario(dir: &Path, seed: u64, ticks: u64, measure: &str) {
    fs::write(dir.join("settings.toml"), format!("seed = {seed}\n")).unwrap();
    fs::write(
        dir.join("chains.ron"),
        r#"[
            (
                name: "build",
                value: 100.0,
                stages: [
                    (name: "design", effort: 1),
                    (name: "code", effort: 2),
                    (name: "ship", effort: 1),
                ],
            ),
        ]"#,
    )
    .unwrap();

    let mut workers = String::from("[");
    for name in ["ann", "bob"] {
        write!(
            workers,
            r#"{{"name": "{name}", "observation_period": 4, "success_measure": "{measure}",
               "strategies": [
                 {{"name": "fifo", "criteria": ["item_number:min"]}},
                 {{"name": "lifo", "criteria": ["item_number:max"]}},
                 {{"name": "nearest_done",
                   "criteria": ["remaining_effort_in_chain:min", "elapsed_in_chain:max"]}}
               ]}},"#
        )
        .unwrap();
    }
    workers.pop();
    workers.push(']');
    fs::write(dir.join("workers.json"), workers).unwrap();

    let mut assignments = String::new();
    for worker in ["ann", "bob"] {
        for stage in ["design", "code", "ship"] {
            writeln!(
                assignments,
                "[[assignments]]\nworker = \"{worker}\"\nchain = \"build\"\nstage = \"{stage}\"\n"
            )
            .unwrap();
        }
    }
    fs::write(dir.join("assignments.toml"), assignments).unwrap();

    let orders: Vec<String> = (1..=ticks)
        .map(|tick| format!(r#"(tick: {tick}, chain: "build")"#))
        .collect();
    fs::write(dir.join("work_orders.ron"), format!("[{}]", orders.join(", "))).unwrap();
}

#[test]
fn loaded_scenario_matches_the_coded_one() {
    let dir = make_test_dir("matches_coded");
    write_build_scenario(&dir, 42, 40, "value_contributed");

    let mut scenario = load_scenario(&dir).unwrap();
    assert_eq!(scenario.work_orders.len(), 40);
    scenario.system.run(40, &scenario.work_orders).unwrap();

    let mut coded = two_worker_system(42);
    let chain = coded.network().chain_by_name("build").unwrap().id();
    coded.run(40, &steady_orders(chain, 40, 1)).unwrap();

    assert_eq!(scenario.system.time(), 40);
    assert_eq!(scenario.system.state_hash(), coded.state_hash());

    cleanup(&dir);
}

#[test]
fn roce_learners_run_from_files() {
    let dir = make_test_dir("roce_learners");
    write_build_scenario(&dir, 3, 30, "roce");

    let mut scenario = load_scenario(&dir).unwrap();
    assert!(
        scenario
            .system
            .workers()
            .iter()
            .all(|w| w.success_measure() == SuccessMeasure::Roce)
    );
    scenario.system.run(30, &scenario.work_orders).unwrap();

    let stats = scenario.system.system_statistics(0, 30);
    assert!(stats.sink.items > 0);
    assert!(stats.sink.roce.is_some());
    for worker in scenario.system.workers() {
        let sum: f64 = worker.weights().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9, "{} weights sum to {sum}", worker.name());
    }

    cleanup(&dir);
}

#[test]
fn loading_is_logged() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("valueflow_data=info"))
        .with_test_writer()
        .try_init();
    let dir = make_test_dir("logged");
    write_build_scenario(&dir, 1, 2, "zero");

    let scenario = load_scenario(&dir).unwrap();
    assert_eq!(scenario.workers.len(), 2);
    assert_eq!(scenario.system.assignments().len(), 6);

    cleanup(&dir);
}
