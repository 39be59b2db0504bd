use crate::id::{ChainId, StageId, WorkerId};

/// One (worker, chain, stage) triple. The chain is carried by the stage id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Assignment {
    pub worker: WorkerId,
    pub stage: StageId,
}

impl Assignment {
    pub fn chain(&self) -> ChainId {
        self.stage.chain
    }
}

/// Many-to-many mapping of workers to stages, in insertion order.
///
/// Existence of the referenced worker and stage is checked by the system
/// before an assignment is inserted.
#[derive(Debug, Clone, Default)]
pub struct AssignmentSet {
    entries: Vec<Assignment>,
}

impl AssignmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an assignment. Returns `false` if it already existed.
    pub fn insert(&mut self, worker: WorkerId, stage: StageId) -> bool {
        let entry = Assignment { worker, stage };
        if self.entries.contains(&entry) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Remove an assignment. Returns `false` if it was not present.
    pub fn remove(&mut self, worker: WorkerId, stage: StageId) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|a| !(a.worker == worker && a.stage == stage));
        self.entries.len() != before
    }

    pub fn contains(&self, worker: WorkerId, stage: StageId) -> bool {
        self.entries.contains(&Assignment { worker, stage })
    }

    /// Stages `worker` may work at.
    pub fn stages_for(&self, worker: WorkerId) -> impl Iterator<Item = StageId> + '_ {
        self.entries
            .iter()
            .filter(move |a| a.worker == worker)
            .map(|a| a.stage)
    }

    /// Workers assigned to `stage`.
    pub fn workers_at(&self, stage: StageId) -> impl Iterator<Item = WorkerId> + '_ {
        self.entries
            .iter()
            .filter(move |a| a.stage == stage)
            .map(|a| a.worker)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Assignment> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
