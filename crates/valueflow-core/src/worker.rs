//! Workers: agents that pick and work one item per tick and periodically
//! re-weight their selection strategies.
//!
//! A [`Worker`] owns only its event log. Its current strategy and strategy
//! weights are read from the latest [`WorkerEvent::LearnedAndAdapted`] entry.
//! The very first such entry is written at construction, so a worker always
//! has a current strategy before the first tick runs.

use std::str::FromStr;

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use crate::error::{ConfigError, SimError};
use crate::fixed::{Fixed64, Ticks, checked_div_64, count_to_fixed64};
use crate::id::{ItemId, StageId, WorkerId};
use crate::strategy::SelectionStrategy;

/// Default lower bound for any strategy weight.
pub const DEFAULT_WEIGHT_FLOOR: f64 = 0.01;

/// Default weight change applied after an observation period.
pub const DEFAULT_ADJUSTMENT: f64 = 0.1;

// ---------------------------------------------------------------------------
// Success measure
// ---------------------------------------------------------------------------

/// How a worker scores the observation period that just ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum SuccessMeasure {
    /// Value of items that reached the sink during the period, weighted by
    /// the worker's share of the effort spent on each.
    #[default]
    ValueContributed,
    /// System-wide return on capital employed over the period.
    Roce,
    /// Always zero; the worker never changes weights.
    Zero,
}

impl FromStr for SuccessMeasure {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "value_contributed" => Ok(SuccessMeasure::ValueContributed),
            "roce" => Ok(SuccessMeasure::Roce),
            "zero" | "none" => Ok(SuccessMeasure::Zero),
            other => Err(ConfigError::UnknownSuccessMeasure(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Blueprint for a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub name: String,
    /// Ticks between adaptation steps.
    pub observation_period: Ticks,
    pub success_measure: SuccessMeasure,
    /// Amount added to or removed from the active strategy's weight.
    pub adjustment: f64,
    pub weight_floor: f64,
    /// Strategies with their initial (unnormalized) weights.
    pub strategies: Vec<(SelectionStrategy, f64)>,
}

impl WorkerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            observation_period: 10,
            success_measure: SuccessMeasure::default(),
            adjustment: DEFAULT_ADJUSTMENT,
            weight_floor: DEFAULT_WEIGHT_FLOOR,
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: SelectionStrategy, weight: f64) -> Self {
        self.strategies.push((strategy, weight));
        self
    }

    pub fn with_observation_period(mut self, period: Ticks) -> Self {
        self.observation_period = period;
        self
    }

    pub fn with_success_measure(mut self, measure: SuccessMeasure) -> Self {
        self.success_measure = measure;
        self
    }

    pub fn with_adjustment(mut self, adjustment: f64) -> Self {
        self.adjustment = adjustment;
        self
    }

    pub fn with_weight_floor(mut self, floor: f64) -> Self {
        self.weight_floor = floor;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.strategies.is_empty() {
            return Err(ConfigError::NoStrategies(self.name.clone()));
        }
        if self.observation_period == 0 {
            return Err(ConfigError::ZeroObservationPeriod(self.name.clone()));
        }
        let n = self.strategies.len();
        if self.weight_floor.is_nan()
            || self.weight_floor <= 0.0
            || self.weight_floor * n as f64 > 1.0
        {
            return Err(ConfigError::InfeasibleWeightFloor {
                floor: self.weight_floor,
                strategies: n,
            });
        }
        let bad_weight = self
            .strategies
            .iter()
            .any(|(_, w)| !w.is_finite() || *w < 0.0);
        if bad_weight || !self.adjustment.is_finite() {
            return Err(ConfigError::InvalidWeight(self.name.clone()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One entry in a worker's log.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum WorkerEvent {
    /// The worker spent this tick's effort on `item` in `stage`.
    Worked {
        tick: Ticks,
        item: ItemId,
        stage: StageId,
    },
    /// The worker scored the last period and drew a (possibly new) strategy.
    LearnedAndAdapted {
        tick: Ticks,
        measurement: Fixed64,
        strategy: usize,
        weights: Vec<f64>,
    },
}

impl WorkerEvent {
    pub fn tick(&self) -> Ticks {
        match self {
            WorkerEvent::Worked { tick, .. } | WorkerEvent::LearnedAndAdapted { tick, .. } => *tick,
        }
    }
}

// ---------------------------------------------------------------------------
// Weight arithmetic
// ---------------------------------------------------------------------------

/// Signed weight change for a period: `+factor` when the measurement went
/// up, `-factor` when it went down, zero when unchanged.
pub fn weight_adjustment(previous: Fixed64, current: Fixed64, factor: f64) -> f64 {
    match current.cmp(&previous) {
        std::cmp::Ordering::Greater => factor,
        std::cmp::Ordering::Less => -factor,
        std::cmp::Ordering::Equal => 0.0,
    }
}

/// Rescale weights so they sum to one with none below `floor`.
///
/// Each weight becomes `floor + spare * e / sum(e)`, where `e` is the
/// weight's excess over the floor (zero if below) and
/// `spare = 1 - n * floor`. Already normalized weights come back unchanged.
/// If no weight exceeds the floor the spare mass is split evenly.
pub fn renormalize(weights: &[f64], floor: f64) -> Vec<f64> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let spare = (1.0 - floor * n as f64).max(0.0);
    let excess: Vec<f64> = weights.iter().map(|w| (w - floor).max(0.0)).collect();
    let sum: f64 = excess.iter().sum();
    excess
        .iter()
        .map(|w| {
            let share = if sum > 0.0 { w / sum } else { 1.0 / n as f64 };
            floor + spare * share
        })
        .collect()
}

fn draw_weighted<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Result<usize, SimError> {
    let dist = WeightedIndex::new(weights)?;
    Ok(dist.sample(rng))
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// An agent that works one item per tick at its assigned stages.
#[derive(Debug, Clone)]
pub struct Worker {
    id: WorkerId,
    name: String,
    observation_period: Ticks,
    success_measure: SuccessMeasure,
    adjustment: f64,
    weight_floor: f64,
    strategies: Vec<SelectionStrategy>,
    log: Vec<WorkerEvent>,
    joined_at: Ticks,
    utilization: Option<Fixed64>,
}

impl Worker {
    /// Validate `config` and seed the first strategy draw at `tick`.
    pub fn new<R: Rng + ?Sized>(
        id: WorkerId,
        config: WorkerConfig,
        tick: Ticks,
        rng: &mut R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (strategies, initial): (Vec<SelectionStrategy>, Vec<f64>) =
            config.strategies.into_iter().unzip();
        let weights = renormalize(&initial, config.weight_floor);
        // Renormalized weights are all at least the (positive) floor, so the
        // draw cannot fail; fall back to the first strategy regardless.
        let strategy = draw_weighted(&weights, rng).unwrap_or(0);
        Ok(Self {
            id,
            name: config.name,
            observation_period: config.observation_period,
            success_measure: config.success_measure,
            adjustment: config.adjustment,
            weight_floor: config.weight_floor,
            strategies,
            log: vec![WorkerEvent::LearnedAndAdapted {
                tick,
                measurement: Fixed64::ZERO,
                strategy,
                weights,
            }],
            joined_at: tick,
            utilization: None,
        })
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn observation_period(&self) -> Ticks {
        self.observation_period
    }

    pub fn success_measure(&self) -> SuccessMeasure {
        self.success_measure
    }

    pub fn weight_floor(&self) -> f64 {
        self.weight_floor
    }

    pub fn strategies(&self) -> &[SelectionStrategy] {
        &self.strategies
    }

    pub fn log(&self) -> &[WorkerEvent] {
        &self.log
    }

    fn latest_adaptation(&self) -> (Fixed64, usize, &[f64]) {
        self.log
            .iter()
            .rev()
            .find_map(|e| match e {
                WorkerEvent::LearnedAndAdapted {
                    measurement,
                    strategy,
                    weights,
                    ..
                } => Some((*measurement, *strategy, weights.as_slice())),
                WorkerEvent::Worked { .. } => None,
            })
            .unwrap_or((Fixed64::ZERO, 0, &[] as &[f64]))
    }

    /// Index of the strategy currently in use.
    pub fn current_strategy_index(&self) -> usize {
        self.latest_adaptation().1
    }

    pub fn current_strategy(&self) -> Option<&SelectionStrategy> {
        self.strategies.get(self.current_strategy_index())
    }

    /// Current strategy weights, parallel to [`strategies`](Self::strategies).
    pub fn weights(&self) -> &[f64] {
        self.latest_adaptation().2
    }

    /// Measurement recorded by the latest adaptation.
    pub fn last_measurement(&self) -> Fixed64 {
        self.latest_adaptation().0
    }

    /// Whether `now` closes an observation period.
    pub fn is_adaptation_tick(&self, now: Ticks) -> bool {
        now > 0 && now % self.observation_period == 0
    }

    /// Score the period, shift the active strategy's weight, renormalize and
    /// draw the next strategy.
    pub fn adapt<R: Rng + ?Sized>(
        &mut self,
        now: Ticks,
        measurement: Fixed64,
        rng: &mut R,
    ) -> Result<usize, SimError> {
        let (previous, active, weights) = self.latest_adaptation();
        let mut weights = weights.to_vec();
        let delta = weight_adjustment(previous, measurement, self.adjustment);
        if let Some(w) = weights.get_mut(active) {
            *w += delta;
        }
        let weights = renormalize(&weights, self.weight_floor);
        let strategy = draw_weighted(&weights, rng)?;
        tracing::debug!(
            worker = %self.name,
            tick = now,
            measurement = %measurement,
            delta,
            strategy = ?self.strategies.get(strategy).map(SelectionStrategy::name),
            "worker adapted"
        );
        self.log.push(WorkerEvent::LearnedAndAdapted {
            tick: now,
            measurement,
            strategy,
            weights,
        });
        Ok(strategy)
    }

    /// Whether a `Worked` entry exists at `tick`.
    pub fn has_worked_at(&self, tick: Ticks) -> bool {
        self.log
            .iter()
            .rev()
            .take_while(|e| e.tick() >= tick)
            .any(|e| matches!(e, WorkerEvent::Worked { tick: t, .. } if *t == tick))
    }

    pub(crate) fn record_work(&mut self, tick: Ticks, item: ItemId, stage: StageId) {
        self.log.push(WorkerEvent::Worked { tick, item, stage });
    }

    /// Number of ticks worked in `from < tick <= to`.
    pub fn ticks_worked(&self, from: Ticks, to: Ticks) -> u64 {
        self.log
            .iter()
            .filter(|e| matches!(e, WorkerEvent::Worked { tick, .. } if *tick > from && *tick <= to))
            .count() as u64
    }

    /// Fraction of ticks since the worker joined in which it worked, or
    /// `None` before its first eligible tick has run.
    pub fn utilization(&self) -> Option<Fixed64> {
        self.utilization
    }

    pub(crate) fn refresh_utilization(&mut self, now: Ticks) {
        let eligible = now.saturating_sub(self.joined_at);
        let worked = self.ticks_worked(self.joined_at, now);
        self.utilization = checked_div_64(count_to_fixed64(worked), count_to_fixed64(eligible));
    }
}
