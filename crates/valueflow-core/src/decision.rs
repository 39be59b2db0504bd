//! Per-item decision information used to rank work candidates.
//!
//! [`DecisionInfo`] is a pure function of an item's log, the network layout
//! and the current time. The system recomputes it for every item before and
//! after the work phase of each tick.

use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, SimError};
use crate::fixed::{Fixed64, Ticks, count_to_fixed64};
use crate::id::Holder;
use crate::item::{Elapsed, WorkItem};
use crate::network::FlowNetwork;

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

/// A quantity a selection strategy can rank candidate items by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Metric {
    /// Creation order; `min` gives FIFO, `max` gives LIFO.
    ItemNumber,
    EffortInStage,
    RemainingEffortInStage,
    EffortInChain,
    RemainingEffortInChain,
    VisitedStages,
    RemainingStages,
    ChainValue,
    ContributionMargin,
    StageInventory,
    ElapsedInStage,
    ElapsedInChain,
}

impl Metric {
    pub const ALL: [Metric; 12] = [
        Metric::ItemNumber,
        Metric::EffortInStage,
        Metric::RemainingEffortInStage,
        Metric::EffortInChain,
        Metric::RemainingEffortInChain,
        Metric::VisitedStages,
        Metric::RemainingStages,
        Metric::ChainValue,
        Metric::ContributionMargin,
        Metric::StageInventory,
        Metric::ElapsedInStage,
        Metric::ElapsedInChain,
    ];

    /// The configuration name of this metric.
    pub fn name(self) -> &'static str {
        match self {
            Metric::ItemNumber => "item_number",
            Metric::EffortInStage => "effort_in_stage",
            Metric::RemainingEffortInStage => "remaining_effort_in_stage",
            Metric::EffortInChain => "effort_in_chain",
            Metric::RemainingEffortInChain => "remaining_effort_in_chain",
            Metric::VisitedStages => "visited_stages",
            Metric::RemainingStages => "remaining_stages",
            Metric::ChainValue => "chain_value",
            Metric::ContributionMargin => "contribution_margin",
            Metric::StageInventory => "stage_inventory",
            Metric::ElapsedInStage => "elapsed_in_stage",
            Metric::ElapsedInChain => "elapsed_in_chain",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownMetric(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// DecisionInfo
// ---------------------------------------------------------------------------

/// Snapshot of every ranking metric for one item resident in a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionInfo {
    pub item_number: u64,
    pub effort_in_stage: u32,
    pub remaining_effort_in_stage: u32,
    pub effort_in_chain: u32,
    pub remaining_effort_in_chain: Ticks,
    pub visited_stages: u32,
    pub remaining_stages: u32,
    pub chain_value: Fixed64,
    pub contribution_margin: Fixed64,
    pub stage_inventory: usize,
    pub elapsed_in_stage: Ticks,
    pub elapsed_in_chain: Ticks,
}

impl DecisionInfo {
    /// Compute the snapshot for `item` at time `now`.
    ///
    /// Returns `Ok(None)` for items already in the sink; they are never
    /// candidates for work.
    pub fn compute(
        item: &WorkItem,
        network: &FlowNetwork,
        now: Ticks,
    ) -> Result<Option<Self>, SimError> {
        let holder = item.holder();
        let Holder::Stage(stage_id) = holder else {
            return Ok(None);
        };
        let chain = network
            .chain(stage_id.chain)
            .ok_or(SimError::ChainNotFound(stage_id.chain))?;
        let stage = chain
            .stage(stage_id.step)
            .ok_or(SimError::StageNotFound(stage_id))?;

        let effort_in_stage = item.accumulated_effort(now, Some(holder));
        let remaining_effort_in_stage = stage.required_effort().saturating_sub(effort_in_stage);
        let later_stages = chain.effort_from(stage_id.step.saturating_add(1));
        let stage_count = u32::try_from(chain.stages().len()).unwrap_or(u32::MAX);

        Ok(Some(Self {
            item_number: item.number(),
            effort_in_stage,
            remaining_effort_in_stage,
            effort_in_chain: item.accumulated_effort(now, None),
            remaining_effort_in_chain: later_stages
                .saturating_add(Ticks::from(remaining_effort_in_stage)),
            visited_stages: stage_id.step.saturating_add(1),
            remaining_stages: stage_count
                .saturating_sub(stage_id.step)
                .saturating_sub(1),
            chain_value: chain.value(),
            contribution_margin: chain.contribution_margin(),
            stage_inventory: stage.items().len(),
            elapsed_in_stage: item.elapsed_time(Elapsed::InProgress(now), Some(holder))?,
            elapsed_in_chain: item.elapsed_time(Elapsed::InProgress(now), None)?,
        }))
    }

    /// The value of `metric` for this item.
    pub fn metric(&self, metric: Metric) -> Fixed64 {
        match metric {
            Metric::ItemNumber => count_to_fixed64(self.item_number),
            Metric::EffortInStage => count_to_fixed64(self.effort_in_stage.into()),
            Metric::RemainingEffortInStage => count_to_fixed64(self.remaining_effort_in_stage.into()),
            Metric::EffortInChain => count_to_fixed64(self.effort_in_chain.into()),
            Metric::RemainingEffortInChain => count_to_fixed64(self.remaining_effort_in_chain),
            Metric::VisitedStages => count_to_fixed64(self.visited_stages.into()),
            Metric::RemainingStages => count_to_fixed64(self.remaining_stages.into()),
            Metric::ChainValue => self.chain_value,
            Metric::ContributionMargin => self.contribution_margin,
            Metric::StageInventory => count_to_fixed64(self.stage_inventory as u64),
            Metric::ElapsedInStage => count_to_fixed64(self.elapsed_in_stage),
            Metric::ElapsedInChain => count_to_fixed64(self.elapsed_in_chain),
        }
    }
}
