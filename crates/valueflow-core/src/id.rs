use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a work item in the flow network's item store.
    pub struct ItemId;
}

/// Identifies a value chain. Index into the network's chain list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u32);

/// Identifies a stage (process step) by its chain and pipeline position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StageId {
    pub chain: ChainId,
    pub step: u32,
}

impl StageId {
    pub fn new(chain: ChainId, step: u32) -> Self {
        Self { chain, step }
    }
}

/// Identifies a worker. Index into the system's worker list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub u32);

/// Where a work item currently resides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Holder {
    Stage(StageId),
    /// The single output basket shared by every chain.
    Sink,
}

impl Holder {
    pub fn stage(self) -> Option<StageId> {
        match self {
            Holder::Stage(stage) => Some(stage),
            Holder::Sink => None,
        }
    }
}
