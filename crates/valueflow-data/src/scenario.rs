//! Build a runnable [`System`] and its [`WorkOrderBook`] from a scenario
//! directory.
//!
//! Required files: `chains`, `workers`. Optional: `settings`, `assignments`,
//! `work_orders`. Each may be `.ron`, `.json` or `.toml`; in TOML the list
//! files keep their entries under a key named after the file.

use std::collections::HashMap;
use std::path::Path;

use valueflow_core::fixed::f64_to_fixed64;
use valueflow_core::id::{ChainId, StageId, WorkerId};
use valueflow_core::network::{ChainConfig, StageConfig, ValueDecay, discount_rate};
use valueflow_core::strategy::SelectionStrategy;
use valueflow_core::system::{System, SystemConfig, WorkOrder, WorkOrderBook};
use valueflow_core::worker::{SuccessMeasure, WorkerConfig};

use crate::loader::{
    DataLoadError, check_duplicate, deserialize_file, deserialize_list, find_data_file,
    require_data_file, require_finite, resolve_name,
};
use crate::schema::{
    AssignmentData, ChainData, DecayData, SettingsData, WorkOrderData, WorkerData,
};

/// A loaded scenario, ready to run.
#[derive(Debug)]
pub struct Scenario {
    pub system: System,
    pub work_orders: WorkOrderBook,
    /// Chain ids by name.
    pub chains: HashMap<String, ChainId>,
    /// Worker ids by name.
    pub workers: HashMap<String, WorkerId>,
}

/// Stage positions of one chain, by stage name.
struct ChainIndex {
    id: ChainId,
    stages: HashMap<String, u32>,
}

/// Load every scenario file in `dir` and assemble the simulation.
pub fn load_scenario(dir: &Path) -> Result<Scenario, DataLoadError> {
    let settings = match find_data_file(dir, "settings")? {
        Some(path) => deserialize_file::<SettingsData>(&path)?,
        None => SettingsData::default(),
    };
    let mut system = System::new(SystemConfig {
        start_time: settings.start_time,
        seed: settings.seed,
    });

    let chains_path = require_data_file(dir, "chains")?;
    let chain_data: Vec<ChainData> = deserialize_list(&chains_path, "chains")?;
    let mut chains: HashMap<String, ChainIndex> = HashMap::new();
    for data in &chain_data {
        check_duplicate(&chains, &data.name, &chains_path)?;
        let mut stages = HashMap::new();
        for (step, stage) in data.stages.iter().enumerate() {
            check_duplicate(&stages, &stage.name, &chains_path)?;
            stages.insert(stage.name.clone(), u32::try_from(step).unwrap_or(u32::MAX));
        }
        let config = chain_config(data, &chains_path)?;
        let id = system
            .add_chain(config)
            .map_err(DataLoadError::config(&chains_path))?;
        chains.insert(data.name.clone(), ChainIndex { id, stages });
    }

    let workers_path = require_data_file(dir, "workers")?;
    let worker_data: Vec<WorkerData> = deserialize_list(&workers_path, "workers")?;
    let mut workers: HashMap<String, WorkerId> = HashMap::new();
    for data in &worker_data {
        check_duplicate(&workers, &data.name, &workers_path)?;
        let config = worker_config(data, &workers_path)?;
        let id = system
            .add_worker(config)
            .map_err(DataLoadError::config(&workers_path))?;
        workers.insert(data.name.clone(), id);
    }

    let mut assignment_count = 0;
    if let Some(path) = find_data_file(dir, "assignments")? {
        let assignments: Vec<AssignmentData> = deserialize_list(&path, "assignments")?;
        for a in &assignments {
            let worker = *resolve_name(&workers, &a.worker, &path, "worker")?;
            let chain = resolve_name(&chains, &a.chain, &path, "chain")?;
            let step = *resolve_name(&chain.stages, &a.stage, &path, "stage")?;
            let added = system
                .assign(worker, StageId::new(chain.id, step))
                .map_err(DataLoadError::config(&path))?;
            if added {
                assignment_count += 1;
            } else {
                tracing::warn!(
                    worker = %a.worker,
                    chain = %a.chain,
                    stage = %a.stage,
                    "duplicate assignment ignored"
                );
            }
        }
    }

    let mut work_orders = WorkOrderBook::new();
    if let Some(path) = find_data_file(dir, "work_orders")? {
        let orders: Vec<WorkOrderData> = deserialize_list(&path, "work_orders")?;
        for order in &orders {
            let chain = resolve_name(&chains, &order.chain, &path, "chain")?;
            work_orders.push(WorkOrder {
                tick: order.tick,
                chain: chain.id,
            });
        }
    }

    tracing::info!(
        dir = %dir.display(),
        chains = chains.len(),
        workers = workers.len(),
        assignments = assignment_count,
        work_orders = work_orders.len(),
        seed = settings.seed,
        "scenario loaded"
    );

    Ok(Scenario {
        system,
        work_orders,
        chains: chains.into_iter().map(|(name, c)| (name, c.id)).collect(),
        workers,
    })
}

fn chain_config(data: &ChainData, file: &Path) -> Result<ChainConfig, DataLoadError> {
    let value = require_finite(data.value, "chain value", file)?;
    let mut config = ChainConfig::new(data.name.clone(), f64_to_fixed64(value)).with_decay(
        match data.decay {
            DecayData::Net => ValueDecay::Net,
            DecayData::Discounted { rate } => {
                discount_rate(require_finite(rate, "discount rate", file)?)
            }
            DecayData::Expired { expiry } => ValueDecay::Expired { expiry },
        },
    );
    if let Some(rate) = data.injection_rate {
        config = config.with_injection_rate(rate);
    }
    for stage in &data.stages {
        let mut stage_config = StageConfig::new(stage.name.clone(), stage.effort);
        stage_config.wip_limit = stage.wip_limit;
        config = config.with_stage(stage_config);
    }
    Ok(config)
}

fn worker_config(data: &WorkerData, file: &Path) -> Result<WorkerConfig, DataLoadError> {
    let mut config = WorkerConfig::new(data.name.clone());
    for strategy in &data.strategies {
        let parsed = SelectionStrategy::parse(strategy.name.clone(), &strategy.criteria)
            .map_err(DataLoadError::config(file))?;
        config = config.with_strategy(parsed, strategy.weight);
    }
    if let Some(period) = data.observation_period {
        config = config.with_observation_period(period);
    }
    if let Some(measure) = &data.success_measure {
        let measure: SuccessMeasure = measure.parse().map_err(DataLoadError::config(file))?;
        config = config.with_success_measure(measure);
    }
    if let Some(adjustment) = data.adjustment {
        config = config.with_adjustment(adjustment);
    }
    if let Some(floor) = data.weight_floor {
        config = config.with_weight_floor(floor);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use valueflow_core::error::ConfigError;

    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "valueflow_scenario_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const CHAINS_RON: &str = r#"[
        (
            name: "build",
            value: 100.0,
            stages: [
                (name: "design", effort: 1),
                (name: "code", effort: 2, wip_limit: Some(3)),
            ],
        ),
    ]"#;

    const WORKERS_RON: &str = r#"[
        (
            name: "ann",
            observation_period: Some(4),
            strategies: [(name: "fifo", criteria: ["item_number:min"])],
        ),
    ]"#;

    #[test]
    fn minimal_scenario_needs_only_chains_and_workers() {
        let dir = make_test_dir("minimal");
        fs::write(dir.join("chains.ron"), CHAINS_RON).unwrap();
        fs::write(dir.join("workers.ron"), WORKERS_RON).unwrap();

        let scenario = load_scenario(&dir).unwrap();
        assert_eq!(scenario.system.network().chains().len(), 1);
        assert_eq!(scenario.system.workers().len(), 1);
        assert!(scenario.work_orders.is_empty());
        assert_eq!(scenario.system.time(), 0);

        let chain = scenario.system.network().chain(scenario.chains["build"]).unwrap();
        assert_eq!(chain.stages()[1].wip_limit(), Some(3));
        assert_eq!(chain.minimal_cycle_time(), 3);

        cleanup(&dir);
    }

    #[test]
    fn missing_workers_file_fails() {
        let dir = make_test_dir("no_workers");
        fs::write(dir.join("chains.ron"), CHAINS_RON).unwrap();

        assert!(matches!(
            load_scenario(&dir),
            Err(DataLoadError::MissingRequired { ref file, .. }) if file == "workers"
        ));

        cleanup(&dir);
    }

    #[test]
    fn assignments_resolve_by_name() {
        let dir = make_test_dir("assign");
        fs::write(dir.join("chains.ron"), CHAINS_RON).unwrap();
        fs::write(dir.join("workers.ron"), WORKERS_RON).unwrap();
        fs::write(
            dir.join("assignments.json"),
            r#"[
                {"worker": "ann", "chain": "build", "stage": "code"},
                {"worker": "ann", "chain": "build", "stage": "code"}
            ]"#,
        )
        .unwrap();

        let scenario = load_scenario(&dir).unwrap();
        let ann = scenario.workers["ann"];
        let stages: Vec<_> = scenario.system.assignments().stages_for(ann).collect();
        assert_eq!(stages, vec![StageId::new(scenario.chains["build"], 1)]);

        cleanup(&dir);
    }

    #[test]
    fn stage_names_resolve_to_their_network_position() {
        let dir = make_test_dir("stage_positions");
        fs::write(dir.join("chains.ron"), CHAINS_RON).unwrap();
        fs::write(dir.join("workers.ron"), WORKERS_RON).unwrap();
        fs::write(
            dir.join("assignments.ron"),
            r#"[
                (worker: "ann", chain: "build", stage: "code"),
                (worker: "ann", chain: "build", stage: "design"),
            ]"#,
        )
        .unwrap();

        let scenario = load_scenario(&dir).unwrap();
        let network = scenario.system.network();
        let mut names: Vec<_> = scenario
            .system
            .assignments()
            .stages_for(scenario.workers["ann"])
            .map(|id| network.stage(id).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["code", "design"]);

        cleanup(&dir);
    }

    #[test]
    fn unknown_stage_in_assignment_is_unresolved() {
        let dir = make_test_dir("bad_stage");
        fs::write(dir.join("chains.ron"), CHAINS_RON).unwrap();
        fs::write(dir.join("workers.ron"), WORKERS_RON).unwrap();
        fs::write(
            dir.join("assignments.ron"),
            r#"[(worker: "ann", chain: "build", stage: "ship")]"#,
        )
        .unwrap();

        assert!(matches!(
            load_scenario(&dir),
            Err(DataLoadError::UnresolvedRef { ref name, expected_kind: "stage", .. }) if name == "ship"
        ));

        cleanup(&dir);
    }

    #[test]
    fn work_orders_from_toml() {
        let dir = make_test_dir("orders_toml");
        fs::write(dir.join("chains.ron"), CHAINS_RON).unwrap();
        fs::write(dir.join("workers.ron"), WORKERS_RON).unwrap();
        fs::write(dir.join("settings.toml"), "seed = 11\nstart_time = 5\n").unwrap();
        fs::write(
            dir.join("work_orders.toml"),
            r#"
[[work_orders]]
tick = 6
chain = "build"

[[work_orders]]
tick = 6
chain = "build"
"#,
        )
        .unwrap();

        let scenario = load_scenario(&dir).unwrap();
        assert_eq!(scenario.system.time(), 5);
        assert_eq!(scenario.work_orders.len(), 2);
        assert_eq!(scenario.work_orders.for_tick(6).len(), 2);

        cleanup(&dir);
    }

    #[test]
    fn unknown_chain_in_work_orders_is_unresolved() {
        let dir = make_test_dir("orders_bad_chain");
        fs::write(dir.join("chains.ron"), CHAINS_RON).unwrap();
        fs::write(dir.join("workers.ron"), WORKERS_RON).unwrap();
        fs::write(dir.join("work_orders.ron"), r#"[(tick: 1, chain: "sell")]"#).unwrap();

        assert!(matches!(
            load_scenario(&dir),
            Err(DataLoadError::UnresolvedRef { expected_kind: "chain", .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn duplicate_chain_names_are_rejected() {
        let dir = make_test_dir("dup_chain");
        fs::write(
            dir.join("chains.json"),
            r#"[
                {"name": "a", "value": 1.0, "stages": [{"name": "s", "effort": 1}]},
                {"name": "a", "value": 2.0, "stages": [{"name": "s", "effort": 1}]}
            ]"#,
        )
        .unwrap();
        fs::write(dir.join("workers.ron"), WORKERS_RON).unwrap();

        assert!(matches!(
            load_scenario(&dir),
            Err(DataLoadError::DuplicateName { ref name, .. }) if name == "a"
        ));

        cleanup(&dir);
    }

    #[test]
    fn unknown_metric_is_a_config_error() {
        let dir = make_test_dir("bad_metric");
        fs::write(dir.join("chains.ron"), CHAINS_RON).unwrap();
        fs::write(
            dir.join("workers.ron"),
            r#"[(name: "ann", strategies: [(name: "odd", criteria: ["shoe_size:min"])])]"#,
        )
        .unwrap();

        match load_scenario(&dir) {
            Err(DataLoadError::Config { source, .. }) => {
                assert_eq!(source, ConfigError::UnknownMetric("shoe_size".to_string()));
            }
            other => panic!("expected config error, got {other:?}"),
        }

        cleanup(&dir);
    }

    #[test]
    fn zero_effort_stage_is_a_config_error() {
        let dir = make_test_dir("zero_effort");
        fs::write(
            dir.join("chains.ron"),
            r#"[(name: "a", value: 1.0, stages: [(name: "s", effort: 0)])]"#,
        )
        .unwrap();
        fs::write(dir.join("workers.ron"), WORKERS_RON).unwrap();

        assert!(matches!(
            load_scenario(&dir),
            Err(DataLoadError::Config {
                source: ConfigError::ZeroEffort(_),
                ..
            })
        ));

        cleanup(&dir);
    }
}
