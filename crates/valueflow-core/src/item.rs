//! Work items and their event history.
//!
//! A [`WorkItem`] never carries mutable counters. Everything that happened to
//! it is an [`ItemEvent`] appended to its log, and every derived quantity
//! (effort, dwell time, current holder, stage exits) is computed by filtering
//! that log. Replaying the log therefore always reproduces what the
//! simulation observed live.

use crate::error::SimError;
use crate::fixed::Ticks;
use crate::id::{ChainId, Holder, StageId, WorkerId};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A single immutable fact about a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ItemEvent {
    /// The item entered `holder` at `tick`.
    MovedTo { tick: Ticks, holder: Holder },
    /// `worker` spent one unit of effort on the item while it sat in `holder`.
    WorkedOn {
        tick: Ticks,
        holder: Holder,
        worker: WorkerId,
    },
}

impl ItemEvent {
    pub fn tick(&self) -> Ticks {
        match self {
            ItemEvent::MovedTo { tick, .. } | ItemEvent::WorkedOn { tick, .. } => *tick,
        }
    }

    pub fn holder(&self) -> Holder {
        match self {
            ItemEvent::MovedTo { holder, .. } | ItemEvent::WorkedOn { holder, .. } => *holder,
        }
    }

    fn is_work(&self) -> bool {
        matches!(self, ItemEvent::WorkedOn { .. })
    }
}

/// How [`WorkItem::elapsed_time`] measures a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elapsed {
    /// Last entry minus first entry within scope (completed dwell time).
    Completed,
    /// `now` minus first entry within scope (still in progress).
    InProgress(Ticks),
}

/// A stage exit reconstructed from two consecutive `MovedTo` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageExit {
    /// The stage that was left.
    pub stage: StageId,
    /// Where the item went next.
    pub entered: Holder,
    /// When the exit happened.
    pub tick: Ticks,
    /// How long the item sat in `stage`.
    pub dwell: Ticks,
    /// When the item was injected into its chain.
    pub injected_at: Ticks,
}

// ---------------------------------------------------------------------------
// WorkItem
// ---------------------------------------------------------------------------

/// A unit of work flowing through one value chain.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WorkItem {
    number: u64,
    tag: String,
    chain: ChainId,
    log: Vec<ItemEvent>,
}

impl WorkItem {
    /// Create an item that enters stage 0 of `chain` at `tick`.
    pub(crate) fn inject(number: u64, tag: String, chain: ChainId, tick: Ticks) -> Self {
        Self {
            number,
            tag,
            chain,
            log: vec![ItemEvent::MovedTo {
                tick,
                holder: Holder::Stage(StageId::new(chain, 0)),
            }],
        }
    }

    /// Sequential creation number, unique within a network.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Display tag, e.g. `"checkout-17"`.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }

    /// The full event log, oldest first.
    pub fn log(&self) -> &[ItemEvent] {
        &self.log
    }

    fn moves(&self) -> impl Iterator<Item = (Ticks, Holder)> + '_ {
        self.log.iter().filter_map(|e| match e {
            ItemEvent::MovedTo { tick, holder } => Some((*tick, *holder)),
            ItemEvent::WorkedOn { .. } => None,
        })
    }

    fn last_move(&self) -> (Ticks, Holder) {
        // The injection entry is always a move, so a fallback is only reached
        // by a hand-built empty log.
        self.moves()
            .last()
            .unwrap_or((0, Holder::Stage(StageId::new(self.chain, 0))))
    }

    /// The holder the item currently sits in.
    pub fn holder(&self) -> Holder {
        self.last_move().1
    }

    /// When the item entered its current holder.
    pub fn entered_holder_at(&self) -> Ticks {
        self.last_move().0
    }

    /// When the item was injected into its chain.
    pub fn injected_at(&self) -> Ticks {
        self.log.first().map(ItemEvent::tick).unwrap_or(0)
    }

    pub fn in_sink(&self) -> bool {
        self.holder() == Holder::Sink
    }

    /// When the item reached the sink, if it has.
    pub fn sink_entry_time(&self) -> Option<Ticks> {
        self.moves()
            .find(|(_, holder)| *holder == Holder::Sink)
            .map(|(tick, _)| tick)
    }

    pub(crate) fn move_to(&mut self, holder: Holder, tick: Ticks) {
        self.log.push(ItemEvent::MovedTo { tick, holder });
    }

    pub(crate) fn work_on(&mut self, worker: WorkerId, tick: Ticks) {
        let holder = self.holder();
        self.log.push(ItemEvent::WorkedOn {
            tick,
            holder,
            worker,
        });
    }

    // -- Derived queries ----------------------------------------------------

    /// Number of `WorkedOn` entries at or before `until`, optionally only
    /// those attributed to `scope`.
    pub fn accumulated_effort(&self, until: Ticks, scope: Option<Holder>) -> u32 {
        let count = self
            .log
            .iter()
            .filter(|e| e.is_work() && e.tick() <= until)
            .filter(|e| scope.is_none_or(|h| e.holder() == h))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Effort accumulated in the current holder so far.
    pub fn effort_at_current_holder(&self) -> u32 {
        self.accumulated_effort(Ticks::MAX, Some(self.holder()))
    }

    /// Whether anybody worked on the item at exactly `tick`.
    pub fn was_worked_on_at(&self, tick: Ticks) -> bool {
        self.log.iter().any(|e| e.is_work() && e.tick() == tick)
    }

    /// Units of effort `worker` contributed over the item's whole life.
    pub fn effort_by(&self, worker: WorkerId) -> u32 {
        let count = self
            .log
            .iter()
            .filter(|e| matches!(e, ItemEvent::WorkedOn { worker: w, .. } if *w == worker))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Elapsed time within `scope` (or the whole log when `None`).
    ///
    /// Fails with [`SimError::EmptyHistory`] if nothing in the log is
    /// attributed to `scope`.
    pub fn elapsed_time(&self, mode: Elapsed, scope: Option<Holder>) -> Result<Ticks, SimError> {
        let mut in_scope = self
            .log
            .iter()
            .filter(|e| scope.is_none_or(|h| e.holder() == h))
            .map(ItemEvent::tick);
        let first = in_scope.next().ok_or_else(|| SimError::EmptyHistory {
            tag: self.tag.clone(),
        })?;
        let end = match mode {
            Elapsed::Completed => in_scope.last().unwrap_or(first),
            Elapsed::InProgress(now) => now,
        };
        Ok(end.saturating_sub(first))
    }

    /// Stage exits with `from < exit tick <= to`, reconstructed from
    /// consecutive `MovedTo` entries.
    pub fn statistics_events_history(&self, from: Ticks, to: Ticks) -> Vec<StageExit> {
        let injected_at = self.injected_at();
        let moves: Vec<(Ticks, Holder)> = self.moves().collect();
        moves
            .windows(2)
            .filter_map(|pair| match pair {
                [(entered_at, Holder::Stage(stage)), (tick, entered)] => Some(StageExit {
                    stage: *stage,
                    entered: *entered,
                    tick: *tick,
                    dwell: tick.saturating_sub(*entered_at),
                    injected_at,
                }),
                _ => None,
            })
            .filter(|exit| exit.tick > from && exit.tick <= to)
            .collect()
    }
}
