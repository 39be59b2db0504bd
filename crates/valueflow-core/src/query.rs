//! Read-only query API for inspecting simulation state.
//!
//! Snapshot types aggregate system state into convenient views for
//! rendering and reporting. All types are owned copies -- no references into
//! internal system storage.

use crate::fixed::{Fixed64, Ticks};
use crate::id::{ItemId, StageId, WorkerId};

// ---------------------------------------------------------------------------
// Stage snapshot
// ---------------------------------------------------------------------------

/// One resident item as seen from its stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSnapshot {
    pub id: ItemId,
    /// Display tag, e.g. `"checkout-17"`.
    pub tag: String,
    /// Units of work done on the item at this stage.
    pub effort_in_stage: u32,
    /// When the item arrived at this stage.
    pub entered_at: Ticks,
}

/// An aggregated, read-only view of a single stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSnapshot {
    /// The stage's position in the network.
    pub id: StageId,
    /// Name of the owning value chain.
    pub chain: String,
    pub name: String,
    /// Effort threshold an item must reach before it may advance.
    pub required_effort: u32,
    pub wip_limit: Option<u32>,
    /// Items that left during the most recent tick.
    pub exited_last_tick: u32,
    /// Resident items in arrival order.
    pub items: Vec<ItemSnapshot>,
}

// ---------------------------------------------------------------------------
// Worker snapshot
// ---------------------------------------------------------------------------

/// An aggregated, read-only view of a single worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub name: String,
    /// Fraction of eligible ticks worked. `None` before the first tick.
    pub utilization: Option<Fixed64>,
    /// Name of the strategy currently in use.
    pub strategy: String,
    /// Strategy weights, parallel to the worker's strategy roster.
    pub weights: Vec<f64>,
    /// Success measurement recorded at the last adaptation.
    pub last_measurement: Fixed64,
    /// Stages the worker is assigned to.
    pub stages: Vec<StageId>,
}
