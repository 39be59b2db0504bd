//! The system orchestrator: owns the clock, the flow network, the workers and
//! their assignments, and drives one tick at a time.
//!
//! # Tick pipeline
//!
//! Each call to [`System::step`] runs:
//! 1. **Clock** -- advance by one tick.
//! 2. **Reset** -- zero stage exit counters, drop the ROCE cache.
//! 3. **Flow** -- finished items move one holder forward.
//! 4. **Inject** -- work orders for this tick, then stochastic arrivals.
//! 5. **Decide** -- recompute every resident item's [`DecisionInfo`].
//! 6. **Work** -- workers in a freshly shuffled order adapt (on period
//!    boundaries) and then work one item each.
//! 7. **Decide** -- recompute decision info for observers.
//! 8. **Utilization** -- refresh every worker's utilization.

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use slotmap::SecondaryMap;

use crate::assignment::AssignmentSet;
use crate::decision::DecisionInfo;
use crate::error::{ConfigError, SimError};
use crate::fixed::{Fixed64, Ticks, checked_div_64, count_to_fixed64};
use crate::id::{ChainId, Holder, ItemId, StageId, WorkerId};
use crate::network::{ChainConfig, FlowNetwork};
use crate::query::{ItemSnapshot, StageSnapshot, WorkerSnapshot};
use crate::sim::{Clock, StateHash};
use crate::stats::{SystemStatistics, system_statistics};
use crate::worker::{SuccessMeasure, Worker, WorkerConfig};

// ---------------------------------------------------------------------------
// Work orders
// ---------------------------------------------------------------------------

/// A request to inject one item into `chain` at `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WorkOrder {
    pub tick: Ticks,
    pub chain: ChainId,
}

/// Work orders grouped by tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkOrderBook {
    orders: BTreeMap<Ticks, Vec<WorkOrder>>,
}

impl WorkOrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, order: WorkOrder) {
        self.orders.entry(order.tick).or_default().push(order);
    }

    /// Orders due at exactly `tick`.
    pub fn for_tick(&self, tick: Ticks) -> &[WorkOrder] {
        self.orders.get(&tick).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.orders.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// The latest tick with an order, if any.
    pub fn last_tick(&self) -> Option<Ticks> {
        self.orders.keys().next_back().copied()
    }
}

impl FromIterator<WorkOrder> for WorkOrderBook {
    fn from_iter<I: IntoIterator<Item = WorkOrder>>(iter: I) -> Self {
        let mut book = Self::new();
        for order in iter {
            book.push(order);
        }
        book
    }
}

// ---------------------------------------------------------------------------
// Configuration and reports
// ---------------------------------------------------------------------------

/// Construction parameters for a [`System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemConfig {
    /// Time the clock stands at before the first tick.
    pub start_time: Ticks,
    /// Seed for every random draw the system makes.
    pub seed: u64,
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub tick: Ticks,
    /// Items that advanced one holder.
    pub moved: usize,
    /// Items created by work orders and arrivals.
    pub injected: usize,
    /// Workers that worked an item.
    pub worked: usize,
    /// Workers that ran their learning step.
    pub adapted: usize,
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// A complete simulation: network, workers, assignments and the random
/// generator that drives every stochastic choice.
#[derive(Debug, Clone)]
pub struct System {
    clock: Clock,
    network: FlowNetwork,
    workers: Vec<Worker>,
    assignments: AssignmentSet,
    rng: ChaCha8Rng,
    decision_info: SecondaryMap<ItemId, DecisionInfo>,
    /// Sink ROCE per `(from, to)` window, valid for the current tick only.
    roce_cache: HashMap<(Ticks, Ticks), Option<Fixed64>>,
}

impl System {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            clock: Clock::new(config.start_time),
            network: FlowNetwork::new(),
            workers: Vec::new(),
            assignments: AssignmentSet::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            decision_info: SecondaryMap::new(),
            roce_cache: HashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    pub fn add_chain(&mut self, config: ChainConfig) -> Result<ChainId, ConfigError> {
        self.network.add_chain(config)
    }

    /// Add a worker. Its first strategy is drawn immediately and its
    /// utilization counts from the current clock time.
    pub fn add_worker(&mut self, config: WorkerConfig) -> Result<WorkerId, ConfigError> {
        let id = WorkerId(u32::try_from(self.workers.len()).unwrap_or(u32::MAX));
        let worker = Worker::new(id, config, self.clock.time(), &mut self.rng)?;
        self.workers.push(worker);
        Ok(id)
    }

    /// Allow `worker` to work at `stage`. Returns `false` if it already could.
    pub fn assign(&mut self, worker: WorkerId, stage: StageId) -> Result<bool, ConfigError> {
        if self.worker(worker).is_none() {
            return Err(ConfigError::WorkerNotFound(worker));
        }
        if self.network.chain(stage.chain).is_none() {
            return Err(ConfigError::ChainNotFound(stage.chain));
        }
        if self.network.stage(stage).is_none() {
            return Err(ConfigError::StageNotFound(stage));
        }
        Ok(self.assignments.insert(worker, stage))
    }

    pub fn unassign(&mut self, worker: WorkerId, stage: StageId) -> bool {
        self.assignments.remove(worker, stage)
    }

    pub fn set_wip_limit(&mut self, stage: StageId, limit: Option<u32>) -> Result<(), ConfigError> {
        self.network.set_wip_limit(stage, limit)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn time(&self) -> Ticks {
        self.clock.time()
    }

    pub fn network(&self) -> &FlowNetwork {
        &self.network
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn worker(&self, id: WorkerId) -> Option<&Worker> {
        self.workers.get(id.0 as usize)
    }

    pub fn worker_by_name(&self, name: &str) -> Option<&Worker> {
        self.workers.iter().find(|w| w.name() == name)
    }

    pub fn assignments(&self) -> &AssignmentSet {
        &self.assignments
    }

    /// Decision info computed at the end of the last tick.
    pub fn decision_info(&self, item: ItemId) -> Option<&DecisionInfo> {
        self.decision_info.get(item)
    }

    /// Drop every item in the sink. Returns how many were removed.
    pub fn clear_sink(&mut self) -> usize {
        self.network.clear_sink()
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    /// Run one tick. `orders` whose tick is not the new clock time are
    /// skipped with a warning.
    pub fn step(&mut self, orders: &[WorkOrder]) -> Result<TickReport, SimError> {
        let now = self.clock.tick();
        let mut report = TickReport {
            tick: now,
            ..TickReport::default()
        };

        self.network.reset_flow_counters();
        self.roce_cache.clear();

        report.moved = self.network.let_items_flow(now);
        report.injected = self.inject(orders, now)?;

        self.refresh_decision_info(now)?;

        let mut order: Vec<usize> = (0..self.workers.len()).collect();
        order.shuffle(&mut self.rng);
        for index in order {
            if self.workers[index].is_adaptation_tick(now) {
                let measurement = self.measure(index, now);
                self.workers[index].adapt(now, measurement, &mut self.rng)?;
                report.adapted += 1;
            }
            if self.work(index, now)? {
                report.worked += 1;
            }
        }

        self.refresh_decision_info(now)?;
        for worker in &mut self.workers {
            worker.refresh_utilization(now);
        }

        tracing::trace!(
            tick = now,
            moved = report.moved,
            injected = report.injected,
            worked = report.worked,
            adapted = report.adapted,
            "tick complete"
        );
        Ok(report)
    }

    /// Run `ticks` ticks, feeding each one the orders `book` holds for it.
    pub fn run(&mut self, ticks: Ticks, book: &WorkOrderBook) -> Result<Vec<TickReport>, SimError> {
        let mut reports = Vec::new();
        for _ in 0..ticks {
            let next = self.clock.time().saturating_add(1);
            reports.push(self.step(book.for_tick(next))?);
        }
        Ok(reports)
    }

    fn inject(&mut self, orders: &[WorkOrder], now: Ticks) -> Result<usize, SimError> {
        let mut injected = 0;
        for order in orders {
            if order.tick != now {
                tracing::warn!(order_tick = order.tick, now, chain = ?order.chain, "work order skipped");
                continue;
            }
            self.network.create_and_inject_new_item(order.chain, now)?;
            injected += 1;
        }

        let arrivals: Vec<(ChainId, f64)> = self
            .network
            .chains()
            .iter()
            .filter_map(|c| c.injection_rate().map(|r| (c.id(), r)))
            .collect();
        for (chain, rate) in arrivals {
            let whole = rate.trunc() as u64;
            let fraction = rate.fract();
            let extra = u64::from(fraction > 0.0 && self.rng.gen_bool(fraction));
            for _ in 0..whole.saturating_add(extra) {
                self.network.create_and_inject_new_item(chain, now)?;
                injected += 1;
            }
        }
        Ok(injected)
    }

    fn refresh_decision_info(&mut self, now: Ticks) -> Result<(), SimError> {
        self.decision_info.clear();
        for (id, item) in self.network.items() {
            if let Some(info) = DecisionInfo::compute(item, &self.network, now)? {
                self.decision_info.insert(id, info);
            }
        }
        Ok(())
    }

    /// Score the observation period that ends at `now` for one worker.
    fn measure(&mut self, index: usize, now: Ticks) -> Fixed64 {
        let Some(worker) = self.workers.get(index) else {
            return Fixed64::ZERO;
        };
        let from = now.saturating_sub(worker.observation_period());
        match worker.success_measure() {
            SuccessMeasure::Zero => Fixed64::ZERO,
            SuccessMeasure::ValueContributed => value_contributed(&self.network, worker.id(), from, now),
            SuccessMeasure::Roce => {
                let network = &self.network;
                let roce = *self
                    .roce_cache
                    .entry((from, now))
                    .or_insert_with(|| system_statistics(network, from, now).sink.roce);
                roce.unwrap_or(Fixed64::ZERO)
            }
        }
    }

    /// Let one worker pick and work an item. Returns whether it worked.
    fn work(&mut self, index: usize, now: Ticks) -> Result<bool, SimError> {
        let Some(worker) = self.workers.get(index) else {
            return Ok(false);
        };
        if worker.has_worked_at(now) {
            return Ok(false);
        }
        let Some(strategy) = worker.current_strategy() else {
            return Ok(false);
        };

        let mut candidates: Vec<(ItemId, DecisionInfo)> = Vec::new();
        for stage_id in self.assignments.stages_for(worker.id()) {
            let Some(stage) = self.network.stage(stage_id) else {
                continue;
            };
            for &item_id in stage.items() {
                let Some(item) = self.network.item(item_id) else {
                    continue;
                };
                if self.network.is_finished(item) || item.was_worked_on_at(now) {
                    continue;
                }
                if let Some(info) = self.decision_info.get(item_id) {
                    candidates.push((item_id, *info));
                }
            }
        }

        let Some(chosen) = strategy.select(&candidates, &mut self.rng) else {
            return Ok(false);
        };
        let worker_id = worker.id();
        let item = self
            .network
            .item(chosen)
            .ok_or(SimError::ItemNotFound(chosen))?;
        let stage = item.holder().stage().ok_or_else(|| SimError::NotInStage {
            tag: item.tag().to_string(),
        })?;

        self.network.work_on(chosen, worker_id, now)?;
        self.workers[index].record_work(now, chosen, stage);
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Flow statistics and sink economics for the window `(from, to]`.
    pub fn system_statistics(&self, from: Ticks, to: Ticks) -> SystemStatistics {
        system_statistics(&self.network, from, to)
    }

    /// Read-only view of every stage, chain by chain.
    pub fn snapshot_stages(&self) -> Vec<StageSnapshot> {
        let now = self.clock.time();
        self.network
            .stages()
            .map(|stage| {
                let holder = Holder::Stage(stage.id());
                let items = stage
                    .items()
                    .iter()
                    .filter_map(|&id| self.network.item(id).map(|item| (id, item)))
                    .map(|(id, item)| ItemSnapshot {
                        id,
                        tag: item.tag().to_string(),
                        effort_in_stage: item.accumulated_effort(now, Some(holder)),
                        entered_at: item.entered_holder_at(),
                    })
                    .collect();
                StageSnapshot {
                    id: stage.id(),
                    chain: self
                        .network
                        .chain(stage.id().chain)
                        .map(|c| c.name().to_string())
                        .unwrap_or_default(),
                    name: stage.name().to_string(),
                    required_effort: stage.required_effort(),
                    wip_limit: stage.wip_limit(),
                    exited_last_tick: stage.exited_last_tick(),
                    items,
                }
            })
            .collect()
    }

    /// Read-only view of every worker.
    pub fn snapshot_workers(&self) -> Vec<WorkerSnapshot> {
        self.workers
            .iter()
            .map(|worker| WorkerSnapshot {
                id: worker.id(),
                name: worker.name().to_string(),
                utilization: worker.utilization(),
                strategy: worker
                    .current_strategy()
                    .map(|s| s.name().to_string())
                    .unwrap_or_default(),
                weights: worker.weights().to_vec(),
                last_measurement: worker.last_measurement(),
                stages: self.assignments.stages_for(worker.id()).collect(),
            })
            .collect()
    }

    /// Deterministic hash of the clock, every item log and every worker log.
    pub fn state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_tick(self.clock.time());
        for (_, item) in self.network.items() {
            hasher.write_tick(item.number());
            for event in item.log() {
                hasher.write_tick(event.tick());
                hasher.write_holder(event.holder());
            }
        }
        for worker in &self.workers {
            hasher.write_count(worker.log().len());
            hasher.write_count(worker.current_strategy_index());
            hasher.write_fixed64(worker.last_measurement());
        }
        hasher.finish()
    }
}

/// Realized value of items that reached the sink in `(from, to]`, credited
/// to `worker` in proportion to the effort it put into each.
fn value_contributed(network: &FlowNetwork, worker: WorkerId, from: Ticks, to: Ticks) -> Fixed64 {
    let mut total = Fixed64::ZERO;
    for (_, item) in network.items() {
        let Some(entered) = item.sink_entry_time() else {
            continue;
        };
        if entered <= from || entered > to {
            continue;
        }
        let share = item.effort_by(worker);
        if share == 0 {
            continue;
        }
        let effort = item.accumulated_effort(Ticks::MAX, None);
        let credited = checked_div_64(
            network.realized_value(item).saturating_mul(count_to_fixed64(share.into())),
            count_to_fixed64(effort.into()),
        )
        .unwrap_or(Fixed64::ZERO);
        total = total.saturating_add(credited);
    }
    total
}
