//! The flow network: value chains, their stages and the shared sink.
//!
//! The [`FlowNetwork`] owns every [`WorkItem`] (in a slot map keyed by
//! [`ItemId`]) and every holder. Stages only store item ids in arrival order.
//!
//! Each tick the network does two things before any worker acts:
//! 1. [`FlowNetwork::let_items_flow`] advances every item whose effort at its
//!    stage reached the threshold, using the effort state at the start of
//!    the tick.
//! 2. [`FlowNetwork::create_and_inject_new_item`] places new work at stage 0.

use slotmap::SlotMap;

use crate::error::{ConfigError, SimError};
use crate::fixed::{Fixed64, Ticks, checked_div_64, count_to_fixed64, f64_to_fixed64};
use crate::id::{ChainId, Holder, ItemId, StageId, WorkerId};
use crate::item::{Elapsed, WorkItem};

// ---------------------------------------------------------------------------
// Value decay
// ---------------------------------------------------------------------------

/// Maps (nominal value, excess time beyond the minimal cycle time) to the
/// value actually realized when an item reaches the sink.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub enum ValueDecay {
    /// Value is realized in full regardless of delay.
    #[default]
    Net,
    /// Value loses `rate` of itself per excess tick.
    Discounted { rate: Fixed64 },
    /// Value drops to zero once the excess reaches `expiry`.
    Expired { expiry: Ticks },
}

impl ValueDecay {
    pub fn apply(&self, value: Fixed64, excess: Ticks) -> Fixed64 {
        match *self {
            ValueDecay::Net => net(value, excess),
            ValueDecay::Discounted { rate } => discounted(rate, value, excess),
            ValueDecay::Expired { expiry } => expired(expiry, value, excess),
        }
    }
}

/// Multiply `value` by `1 - rate` once per excess tick.
pub fn discounted(rate: Fixed64, value: Fixed64, excess: Ticks) -> Fixed64 {
    let keep = Fixed64::ONE.saturating_sub(rate);
    let mut realized = value;
    for _ in 0..excess {
        if realized == Fixed64::ZERO {
            break;
        }
        realized = realized.saturating_mul(keep);
    }
    realized
}

/// Full value until `excess` reaches `expiry`, zero afterwards.
pub fn expired(expiry: Ticks, value: Fixed64, excess: Ticks) -> Fixed64 {
    if excess >= expiry { Fixed64::ZERO } else { value }
}

/// Value unchanged.
pub fn net(value: Fixed64, _excess: Ticks) -> Fixed64 {
    value
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Blueprint for one stage of a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct StageConfig {
    pub name: String,
    /// Units of work an item needs here before it may advance.
    pub required_effort: u32,
    /// Maximum number of resident items that may arrive from upstream.
    pub wip_limit: Option<u32>,
}

impl StageConfig {
    pub fn new(name: impl Into<String>, required_effort: u32) -> Self {
        Self {
            name: name.into(),
            required_effort,
            wip_limit: None,
        }
    }

    pub fn with_wip_limit(mut self, limit: u32) -> Self {
        self.wip_limit = Some(limit);
        self
    }
}

/// Blueprint for a value chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    pub name: String,
    pub value: Fixed64,
    /// Expected arrivals per tick. `None` means work only arrives through
    /// explicit work orders.
    pub injection_rate: Option<f64>,
    pub decay: ValueDecay,
    pub stages: Vec<StageConfig>,
}

impl ChainConfig {
    pub fn new(name: impl Into<String>, value: Fixed64) -> Self {
        Self {
            name: name.into(),
            value,
            injection_rate: None,
            decay: ValueDecay::Net,
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: StageConfig) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_decay(mut self, decay: ValueDecay) -> Self {
        self.decay = decay;
        self
    }

    pub fn with_injection_rate(mut self, rate: f64) -> Self {
        self.injection_rate = Some(rate);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::EmptyChain(self.name.clone()));
        }
        for stage in &self.stages {
            if stage.required_effort == 0 {
                return Err(ConfigError::ZeroEffort(stage.name.clone()));
            }
            if stage.wip_limit == Some(0) {
                return Err(ConfigError::ZeroWipLimit(stage.name.clone()));
            }
        }
        if let ValueDecay::Discounted { rate } = self.decay {
            if rate < Fixed64::ZERO || rate > Fixed64::ONE {
                return Err(ConfigError::InvalidDiscountRate(rate.to_num()));
            }
        }
        if let Some(rate) = self.injection_rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(ConfigError::InvalidInjectionRate(rate));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Holders
// ---------------------------------------------------------------------------

/// A process step: an ordered set of resident items and an effort threshold.
#[derive(Debug, Clone)]
pub struct Stage {
    id: StageId,
    name: String,
    required_effort: u32,
    wip_limit: Option<u32>,
    items: Vec<ItemId>,
    exited_last_tick: u32,
}

impl Stage {
    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required_effort(&self) -> u32 {
        self.required_effort
    }

    pub fn wip_limit(&self) -> Option<u32> {
        self.wip_limit
    }

    /// Resident items in arrival order.
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    /// Items that left this stage during the most recent tick.
    pub fn exited_last_tick(&self) -> u32 {
        self.exited_last_tick
    }

    fn is_full(&self) -> bool {
        self.wip_limit
            .is_some_and(|limit| self.items.len() >= limit as usize)
    }
}

/// The terminal holder. Items that reach it never leave except via
/// [`FlowNetwork::clear_sink`].
#[derive(Debug, Clone, Default)]
pub struct Sink {
    items: Vec<ItemId>,
}

impl Sink {
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// An ordered pipeline of stages that ends at the sink.
#[derive(Debug, Clone)]
pub struct ValueChain {
    id: ChainId,
    name: String,
    value: Fixed64,
    injection_rate: Option<f64>,
    decay: ValueDecay,
    stages: Vec<Stage>,
}

impl ValueChain {
    pub fn id(&self) -> ChainId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nominal value of one finished item.
    pub fn value(&self) -> Fixed64 {
        self.value
    }

    pub fn injection_rate(&self) -> Option<f64> {
        self.injection_rate
    }

    pub fn decay(&self) -> ValueDecay {
        self.decay
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, step: u32) -> Option<&Stage> {
        self.stages.get(step as usize)
    }

    /// Sum of all stage thresholds: the fastest an item can possibly pass.
    pub fn minimal_cycle_time(&self) -> Ticks {
        self.effort_from(0)
    }

    /// Sum of thresholds from `step` to the end of the chain.
    pub fn effort_from(&self, step: u32) -> Ticks {
        self.stages
            .iter()
            .skip(step as usize)
            .map(|s| Ticks::from(s.required_effort))
            .sum()
    }

    /// Nominal value per unit of effort the chain requires.
    pub fn contribution_margin(&self) -> Fixed64 {
        checked_div_64(self.value, count_to_fixed64(self.minimal_cycle_time()))
            .unwrap_or(Fixed64::ZERO)
    }

    /// Value realized for an item that spent `elapsed` ticks in the chain.
    pub fn realized_value(&self, elapsed: Ticks) -> Fixed64 {
        let excess = elapsed.saturating_sub(self.minimal_cycle_time());
        self.decay.apply(self.value, excess)
    }
}

// ---------------------------------------------------------------------------
// FlowNetwork
// ---------------------------------------------------------------------------

/// Owns chains, stages, the sink and every work item.
#[derive(Debug, Clone, Default)]
pub struct FlowNetwork {
    chains: Vec<ValueChain>,
    sink: Sink,
    items: SlotMap<ItemId, WorkItem>,
    next_number: u64,
}

impl FlowNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a chain.
    pub fn add_chain(&mut self, config: ChainConfig) -> Result<ChainId, ConfigError> {
        config.validate()?;
        let id = ChainId(u32::try_from(self.chains.len()).unwrap_or(u32::MAX));
        let stages = config
            .stages
            .into_iter()
            .enumerate()
            .map(|(step, stage)| Stage {
                id: StageId::new(id, u32::try_from(step).unwrap_or(u32::MAX)),
                name: stage.name,
                required_effort: stage.required_effort,
                wip_limit: stage.wip_limit,
                items: Vec::new(),
                exited_last_tick: 0,
            })
            .collect();
        self.chains.push(ValueChain {
            id,
            name: config.name,
            value: config.value,
            injection_rate: config.injection_rate,
            decay: config.decay,
            stages,
        });
        Ok(id)
    }

    /// Change the WIP limit of an existing stage.
    pub fn set_wip_limit(&mut self, stage: StageId, limit: Option<u32>) -> Result<(), ConfigError> {
        if limit == Some(0) {
            let name = self.stage(stage).map(|s| s.name.clone()).unwrap_or_default();
            return Err(ConfigError::ZeroWipLimit(name));
        }
        let stage = self
            .stage_mut(stage)
            .ok_or(ConfigError::StageNotFound(stage))?;
        stage.wip_limit = limit;
        Ok(())
    }

    // -- Lookup -------------------------------------------------------------

    pub fn chains(&self) -> &[ValueChain] {
        &self.chains
    }

    pub fn chain(&self, id: ChainId) -> Option<&ValueChain> {
        self.chains.get(id.0 as usize)
    }

    pub fn chain_by_name(&self, name: &str) -> Option<&ValueChain> {
        self.chains.iter().find(|c| c.name == name)
    }

    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.chain(id.chain).and_then(|c| c.stage(id.step))
    }

    fn stage_mut(&mut self, id: StageId) -> Option<&mut Stage> {
        self.chains
            .get_mut(id.chain.0 as usize)
            .and_then(|c| c.stages.get_mut(id.step as usize))
    }

    /// Every stage, chain by chain, in pipeline order.
    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.chains.iter().flat_map(|c| c.stages.iter())
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn item(&self, id: ItemId) -> Option<&WorkItem> {
        self.items.get(id)
    }

    pub fn items(&self) -> impl Iterator<Item = (ItemId, &WorkItem)> {
        self.items.iter()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Where an item leaving `stage` goes next.
    pub fn next_holder(&self, stage: StageId) -> Holder {
        let next = StageId::new(stage.chain, stage.step.saturating_add(1));
        if self.stage(next).is_some() {
            Holder::Stage(next)
        } else {
            Holder::Sink
        }
    }

    /// Whether the item's effort at its current stage reached the threshold.
    /// Items in the sink count as finished.
    pub fn is_finished(&self, item: &WorkItem) -> bool {
        match item.holder() {
            Holder::Stage(stage) => self
                .stage(stage)
                .is_some_and(|s| item.effort_at_current_holder() >= s.required_effort),
            Holder::Sink => true,
        }
    }

    /// Value the item realized. Zero unless it reached the sink.
    pub fn realized_value(&self, item: &WorkItem) -> Fixed64 {
        if !item.in_sink() {
            return Fixed64::ZERO;
        }
        let Some(chain) = self.chain(item.chain()) else {
            return Fixed64::ZERO;
        };
        let elapsed = item
            .elapsed_time(Elapsed::Completed, None)
            .unwrap_or_default();
        chain.realized_value(elapsed)
    }

    // -- Per-tick phases ----------------------------------------------------

    /// Zero every stage's exit counter.
    pub fn reset_flow_counters(&mut self) {
        for chain in &mut self.chains {
            for stage in &mut chain.stages {
                stage.exited_last_tick = 0;
            }
        }
    }

    /// Move every finished item one holder forward. Returns the number moved.
    ///
    /// Which items are due is decided from the effort state before anything
    /// moves, so an item advances at most one holder per tick. Moves are
    /// applied downstream first: a stage at its WIP limit still accepts an
    /// item when one of its own residents leaves in the same tick. A finished
    /// item stays put while the next stage remains at its limit.
    pub fn let_items_flow(&mut self, tick: Ticks) -> usize {
        let mut due: Vec<(StageId, ItemId)> = Vec::new();
        for stage in self.stages() {
            for &id in &stage.items {
                let finished = self
                    .items
                    .get(id)
                    .is_some_and(|item| item.effort_at_current_holder() >= stage.required_effort);
                if finished {
                    due.push((stage.id, id));
                }
            }
        }

        // Stable, so items of one stage keep their arrival order.
        due.sort_by_key(|(stage, _)| std::cmp::Reverse(stage.step));

        let mut moved = 0;
        for (from, item_id) in due {
            let next = self.next_holder(from);
            if let Holder::Stage(next_stage) = next {
                if self.stage(next_stage).is_some_and(Stage::is_full) {
                    continue;
                }
            }
            if let Some(stage) = self.stage_mut(from) {
                stage.items.retain(|id| *id != item_id);
                stage.exited_last_tick = stage.exited_last_tick.saturating_add(1);
            }
            match next {
                Holder::Stage(next_stage) => {
                    if let Some(stage) = self.stage_mut(next_stage) {
                        stage.items.push(item_id);
                    }
                }
                Holder::Sink => self.sink.items.push(item_id),
            }
            if let Some(item) = self.items.get_mut(item_id) {
                tracing::trace!(item = item.tag(), ?from, to = ?next, tick, "item advanced");
                item.move_to(next, tick);
            }
            moved += 1;
        }
        moved
    }

    /// Create a work item at stage 0 of `chain`.
    pub fn create_and_inject_new_item(
        &mut self,
        chain: ChainId,
        tick: Ticks,
    ) -> Result<ItemId, SimError> {
        let name = self
            .chain(chain)
            .map(|c| c.name.clone())
            .ok_or(SimError::ChainNotFound(chain))?;
        self.next_number = self.next_number.saturating_add(1);
        let number = self.next_number;
        let tag = format!("{name}-{number}");
        tracing::trace!(tag = %tag, tick, "item injected");
        let id = self.items.insert(WorkItem::inject(number, tag, chain, tick));
        let first = StageId::new(chain, 0);
        self.stage_mut(first)
            .ok_or(SimError::StageNotFound(first))?
            .items
            .push(id);
        Ok(id)
    }

    /// Record one unit of work by `worker` on `item` at `tick`.
    pub(crate) fn work_on(
        &mut self,
        item: ItemId,
        worker: WorkerId,
        tick: Ticks,
    ) -> Result<(), SimError> {
        let entry = self.items.get_mut(item).ok_or(SimError::ItemNotFound(item))?;
        entry.work_on(worker, tick);
        Ok(())
    }

    /// Drop every item in the sink. Returns how many were removed.
    pub fn clear_sink(&mut self) -> usize {
        let cleared = std::mem::take(&mut self.sink.items);
        for id in &cleared {
            self.items.remove(*id);
        }
        cleared.len()
    }
}

/// Convert an f64 discount rate from configuration into a [`ValueDecay`].
pub fn discount_rate(rate: f64) -> ValueDecay {
    ValueDecay::Discounted {
        rate: f64_to_fixed64(rate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;

    fn two_stage_network() -> (FlowNetwork, ChainId) {
        let mut net = FlowNetwork::new();
        let chain = net
            .add_chain(
                ChainConfig::new("build", f64_to_fixed64(100.0))
                    .with_stage(StageConfig::new("design", 1))
                    .with_stage(StageConfig::new("ship", 2)),
            )
            .unwrap();
        (net, chain)
    }

    #[test]
    fn discounted_halves_twice() {
        let v = discounted(f64_to_fixed64(0.5), f64_to_fixed64(100.0), 2);
        assert_eq!(v, f64_to_fixed64(25.0));
    }

    #[test]
    fn discounted_without_excess_is_unchanged() {
        let v = discounted(f64_to_fixed64(0.5), f64_to_fixed64(100.0), 0);
        assert_eq!(v, f64_to_fixed64(100.0));
    }

    #[test]
    fn discounted_survives_huge_excess() {
        let v = discounted(f64_to_fixed64(0.5), f64_to_fixed64(100.0), 1_000_000);
        assert_eq!(v, Fixed64::ZERO);
    }

    #[test]
    fn expired_at_and_before_expiry() {
        let hundred = f64_to_fixed64(100.0);
        assert_eq!(expired(3, hundred, 3), Fixed64::ZERO);
        assert_eq!(expired(3, hundred, 2), hundred);
    }

    #[test]
    fn net_ignores_excess() {
        assert_eq!(net(f64_to_fixed64(8.0), 99), f64_to_fixed64(8.0));
    }

    #[test]
    fn minimal_cycle_time_and_margin() {
        let (net, chain) = two_stage_network();
        let chain = net.chain(chain).unwrap();
        assert_eq!(chain.minimal_cycle_time(), 3);
        assert_eq!(chain.effort_from(1), 2);
        assert_eq!(
            chain.contribution_margin(),
            f64_to_fixed64(100.0) / f64_to_fixed64(3.0)
        );
    }

    #[test]
    fn empty_chain_is_rejected() {
        let mut net = FlowNetwork::new();
        let err = net.add_chain(ChainConfig::new("none", Fixed64::ONE));
        assert_eq!(err, Err(ConfigError::EmptyChain("none".into())));
    }

    #[test]
    fn zero_effort_stage_is_rejected() {
        let mut net = FlowNetwork::new();
        let err = net.add_chain(
            ChainConfig::new("c", Fixed64::ONE).with_stage(StageConfig::new("free", 0)),
        );
        assert_eq!(err, Err(ConfigError::ZeroEffort("free".into())));
    }

    #[test]
    fn injection_places_item_in_first_stage() {
        let (mut net, chain) = two_stage_network();
        let id = net.create_and_inject_new_item(chain, 1).unwrap();
        let first = net.stage(StageId::new(chain, 0)).unwrap();
        assert_eq!(first.items(), &[id]);
        assert_eq!(net.item(id).unwrap().tag(), "build-1");
    }

    #[test]
    fn injection_into_unknown_chain_fails() {
        let (mut net, _) = two_stage_network();
        let err = net.create_and_inject_new_item(ChainId(9), 1);
        assert_eq!(err, Err(SimError::ChainNotFound(ChainId(9))));
    }

    #[test]
    fn finished_items_advance_one_holder_per_tick() {
        let (mut net, chain) = two_stage_network();
        let id = net.create_and_inject_new_item(chain, 1).unwrap();
        net.work_on(id, WorkerId(0), 1).unwrap();

        assert_eq!(net.let_items_flow(2), 1);
        assert_eq!(net.item(id).unwrap().holder(), Holder::Stage(StageId::new(chain, 1)));
        assert_eq!(net.stage(StageId::new(chain, 0)).unwrap().exited_last_tick(), 1);

        // Not finished in stage 1 yet: stays.
        assert_eq!(net.let_items_flow(3), 0);

        net.work_on(id, WorkerId(0), 3).unwrap();
        net.work_on(id, WorkerId(0), 4).unwrap();
        assert_eq!(net.let_items_flow(5), 1);
        assert!(net.item(id).unwrap().in_sink());
        assert_eq!(net.sink().items(), &[id]);
    }

    #[test]
    fn unfinished_items_stay() {
        let (mut net, chain) = two_stage_network();
        net.create_and_inject_new_item(chain, 1).unwrap();
        assert_eq!(net.let_items_flow(2), 0);
    }

    #[test]
    fn wip_limit_blocks_upstream() {
        let mut net = FlowNetwork::new();
        let chain = net
            .add_chain(
                ChainConfig::new("c", Fixed64::ONE)
                    .with_stage(StageConfig::new("a", 1))
                    .with_stage(StageConfig::new("b", 5).with_wip_limit(1)),
            )
            .unwrap();
        let first = net.create_and_inject_new_item(chain, 1).unwrap();
        let second = net.create_and_inject_new_item(chain, 1).unwrap();
        net.work_on(first, WorkerId(0), 1).unwrap();
        net.work_on(second, WorkerId(1), 1).unwrap();

        assert_eq!(net.let_items_flow(2), 1);
        let b = net.stage(StageId::new(chain, 1)).unwrap();
        assert_eq!(b.items(), &[first]);
        assert_eq!(
            net.item(second).unwrap().holder(),
            Holder::Stage(StageId::new(chain, 0))
        );
    }

    #[test]
    fn full_stage_releasing_an_item_accepts_one_in_the_same_tick() {
        let mut net = FlowNetwork::new();
        let chain = net
            .add_chain(
                ChainConfig::new("c", Fixed64::ONE)
                    .with_stage(StageConfig::new("a", 1))
                    .with_stage(StageConfig::new("b", 1).with_wip_limit(1)),
            )
            .unwrap();
        let first = net.create_and_inject_new_item(chain, 1).unwrap();
        net.work_on(first, WorkerId(0), 1).unwrap();
        assert_eq!(net.let_items_flow(2), 1);

        let second = net.create_and_inject_new_item(chain, 2).unwrap();
        net.work_on(first, WorkerId(1), 2).unwrap();
        net.work_on(second, WorkerId(0), 2).unwrap();

        assert_eq!(net.let_items_flow(3), 2);
        assert_eq!(net.sink().items(), &[first]);
        assert_eq!(net.stage(StageId::new(chain, 1)).unwrap().items(), &[second]);
        assert_eq!(net.stage(StageId::new(chain, 0)).unwrap().exited_last_tick(), 1);
        assert_eq!(net.stage(StageId::new(chain, 1)).unwrap().exited_last_tick(), 1);
    }

    #[test]
    fn reset_counters_zeroes_exits() {
        let (mut net, chain) = two_stage_network();
        let id = net.create_and_inject_new_item(chain, 1).unwrap();
        net.work_on(id, WorkerId(0), 1).unwrap();
        net.let_items_flow(2);
        net.reset_flow_counters();
        assert!(net.stages().all(|s| s.exited_last_tick() == 0));
    }

    #[test]
    fn realized_value_only_in_sink() {
        let mut net = FlowNetwork::new();
        let chain = net
            .add_chain(
                ChainConfig::new("c", f64_to_fixed64(100.0))
                    .with_decay(discount_rate(0.5))
                    .with_stage(StageConfig::new("a", 1)),
            )
            .unwrap();
        let id = net.create_and_inject_new_item(chain, 1).unwrap();
        assert_eq!(net.realized_value(net.item(id).unwrap()), Fixed64::ZERO);

        net.work_on(id, WorkerId(0), 1).unwrap();
        // Reaches the sink at 4: elapsed 3, minimal cycle time 1, excess 2.
        net.let_items_flow(4);
        assert_eq!(net.realized_value(net.item(id).unwrap()), f64_to_fixed64(25.0));
    }

    #[test]
    fn clear_sink_drops_items() {
        let (mut net, chain) = two_stage_network();
        let id = net.create_and_inject_new_item(chain, 1).unwrap();
        net.work_on(id, WorkerId(0), 1).unwrap();
        net.let_items_flow(2);
        net.work_on(id, WorkerId(0), 2).unwrap();
        net.work_on(id, WorkerId(0), 3).unwrap();
        net.let_items_flow(4);
        assert_eq!(net.clear_sink(), 1);
        assert!(net.sink().is_empty());
        assert!(net.item(id).is_none());
    }
}
