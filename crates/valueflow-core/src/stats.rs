//! Flow statistics and sink economics over a time window.
//!
//! Everything here is derived from item logs on demand: stage exits come from
//! [`WorkItem::statistics_events_history`], working capital from
//! [`WorkItem::accumulated_effort`]. Nothing is cached, so asking for the
//! same window twice on an unchanged network gives the same answer.
//!
//! # Window semantics
//!
//! - Exits count when `from < exit tick <= to`.
//! - Rates divide by the window length `to - from`.
//! - Working capital averages over every integer timestamp in `[from, to]`.
//!
//! Any statistic whose denominator is zero is `None`.

use std::collections::BTreeMap;

use crate::fixed::{Fixed64, Ticks, checked_div_64, count_to_fixed64};
use crate::id::{ChainId, Holder, StageId};
use crate::item::WorkItem;
use crate::network::FlowNetwork;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Minimum, average and maximum of a set of durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTime {
    pub min: Ticks,
    pub avg: Fixed64,
    pub max: Ticks,
}

/// Throughput and cycle time for a stage or a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowStatistics {
    /// Items that exited during the window.
    pub items: u64,
    /// Value carried by those items.
    pub value: Fixed64,
    /// `None` when no item exited.
    pub cycle_time: Option<CycleTime>,
    /// Items per tick. `None` for an empty window.
    pub item_throughput: Option<Fixed64>,
    /// Value per tick. `None` for an empty window.
    pub value_throughput: Option<Fixed64>,
}

/// Economics of everything that reached the sink during the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkEconomics {
    pub items: u64,
    /// Total effort spent on those items.
    pub effort: u64,
    /// Total time those items spent in their chains.
    pub elapsed_time: Ticks,
    /// Total realized value.
    pub value: Fixed64,
    /// Time-average of effort tied up in unfinished items.
    pub average_working_capital: Option<Fixed64>,
    /// Realized value per tick.
    pub value_added_rate: Option<Fixed64>,
    /// `value_added_rate / average_working_capital`.
    pub roce: Option<Fixed64>,
}

/// Snapshot returned by [`system_statistics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStatistics {
    pub from: Ticks,
    pub to: Ticks,
    pub stages: BTreeMap<StageId, FlowStatistics>,
    pub chains: BTreeMap<ChainId, FlowStatistics>,
    pub sink: SinkEconomics,
}

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

/// Running totals for one stage or chain while events are gathered.
#[derive(Debug, Clone, Copy, Default)]
struct FlowAccumulator {
    items: u64,
    value: Fixed64,
    total_time: Ticks,
    min: Option<Ticks>,
    max: Ticks,
}

impl FlowAccumulator {
    fn record(&mut self, duration: Ticks, value: Fixed64) {
        self.items += 1;
        self.value = self.value.saturating_add(value);
        self.total_time = self.total_time.saturating_add(duration);
        self.min = Some(self.min.map_or(duration, |m| m.min(duration)));
        self.max = self.max.max(duration);
    }

    fn finish(self, window: Ticks) -> FlowStatistics {
        let cycle_time = self.min.map(|min| CycleTime {
            min,
            avg: checked_div_64(
                count_to_fixed64(self.total_time),
                count_to_fixed64(self.items),
            )
            .unwrap_or(Fixed64::ZERO),
            max: self.max,
        });
        let window = count_to_fixed64(window);
        FlowStatistics {
            items: self.items,
            value: self.value,
            cycle_time,
            item_throughput: checked_div_64(count_to_fixed64(self.items), window),
            value_throughput: checked_div_64(self.value, window),
        }
    }
}

// ---------------------------------------------------------------------------
// Working capital
// ---------------------------------------------------------------------------

/// Sum over `t` in `[from, to]` of the effort tied up in `item` at `t`.
///
/// An item counts from its injection until the tick before it reached the
/// sink, even if it sits in the sink today.
fn working_capital_contribution(item: &WorkItem, from: Ticks, to: Ticks) -> u64 {
    let start = from.max(item.injected_at());
    let end = match item.sink_entry_time() {
        Some(entered) if entered == 0 => return 0,
        Some(entered) => to.min(entered - 1),
        None => to,
    };
    if start > end {
        return 0;
    }
    (start..=end)
        .map(|t| u64::from(item.accumulated_effort(t, None)))
        .sum()
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Gather statistics for the window `(from, to]`.
pub fn system_statistics(network: &FlowNetwork, from: Ticks, to: Ticks) -> SystemStatistics {
    let window = to.saturating_sub(from);
    let mut stages: BTreeMap<StageId, FlowAccumulator> = network
        .stages()
        .map(|s| (s.id(), FlowAccumulator::default()))
        .collect();
    let mut chains: BTreeMap<ChainId, FlowAccumulator> = network
        .chains()
        .iter()
        .map(|c| (c.id(), FlowAccumulator::default()))
        .collect();

    let mut sink = SinkEconomics::default();
    let mut working_capital: u64 = 0;

    for (_, item) in network.items() {
        working_capital =
            working_capital.saturating_add(working_capital_contribution(item, from, to));

        let Some(chain) = network.chain(item.chain()) else {
            continue;
        };
        for exit in item.statistics_events_history(from, to) {
            if let Some(acc) = stages.get_mut(&exit.stage) {
                acc.record(exit.dwell, chain.value());
            }
            if exit.entered == Holder::Sink {
                let cycle = exit.tick.saturating_sub(exit.injected_at);
                let realized = chain.realized_value(cycle);
                if let Some(acc) = chains.get_mut(&chain.id()) {
                    acc.record(cycle, realized);
                }
                sink.items += 1;
                sink.effort = sink
                    .effort
                    .saturating_add(u64::from(item.accumulated_effort(Ticks::MAX, None)));
                sink.elapsed_time = sink.elapsed_time.saturating_add(cycle);
                sink.value = sink.value.saturating_add(realized);
            }
        }
    }

    let timestamps = to.saturating_sub(from).saturating_add(1);
    sink.average_working_capital = if to >= from {
        checked_div_64(count_to_fixed64(working_capital), count_to_fixed64(timestamps))
    } else {
        None
    };
    sink.value_added_rate = checked_div_64(sink.value, count_to_fixed64(window));
    sink.roce = match (sink.value_added_rate, sink.average_working_capital) {
        (Some(rate), Some(capital)) => checked_div_64(rate, capital),
        _ => None,
    };

    SystemStatistics {
        from,
        to,
        stages: stages
            .into_iter()
            .map(|(id, acc)| (id, acc.finish(window)))
            .collect(),
        chains: chains
            .into_iter()
            .map(|(id, acc)| (id, acc.finish(window)))
            .collect(),
        sink,
    }
}
