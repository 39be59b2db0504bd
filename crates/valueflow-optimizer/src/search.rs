//! The bounded stochastic hill search.
//!
//! [`Optimizer::step`] performs exactly one transition:
//!
//! 1. evaluate the performance function at the current position;
//! 2. log the state and fold the sample into the position's average;
//! 3. cool the temperature by the gradient, floored at zero;
//! 4. if the sample is worse than the best average seen, either tolerate
//!    another downhill step or, once the tolerance
//!    `floor(temperature / degrees_per_downhill_step_tolerance)` is
//!    exceeded, retreat to the best position with a new direction;
//! 5. otherwise move by `direction * jump distance`, reflecting off bounds.
//!
//! The jump distance shrinks with the temperature but never drops below one.
//! Deciding when to stop is up to the caller.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::direction::Direction;
use crate::error::OptimizerError;
use crate::position::{PositionCache, PositionId};

// ---------------------------------------------------------------------------
// Performance
// ---------------------------------------------------------------------------

/// Something the optimizer can score a lattice point with. Higher is better.
pub trait Performance {
    fn evaluate(&mut self, position: &[i64]) -> f64;
}

impl<F: FnMut(&[i64]) -> f64> Performance for F {
    fn evaluate(&mut self, position: &[i64]) -> f64 {
        self(position)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Inclusive per-dimension bounds.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Bounds {
    lower: Vec<i64>,
    upper: Vec<i64>,
}

impl Bounds {
    pub fn new(lower: Vec<i64>, upper: Vec<i64>) -> Result<Self, OptimizerError> {
        if lower.is_empty() {
            return Err(OptimizerError::NoDimensions);
        }
        if lower.len() != upper.len() {
            return Err(OptimizerError::DimensionMismatch {
                expected: lower.len(),
                found: upper.len(),
            });
        }
        for (dimension, (&lo, &hi)) in lower.iter().zip(&upper).enumerate() {
            if lo > hi {
                return Err(OptimizerError::InvertedBounds {
                    dimension,
                    lower: lo,
                    upper: hi,
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// The same `[lower, upper]` range in every one of `dimensions`.
    pub fn uniform(dimensions: usize, lower: i64, upper: i64) -> Result<Self, OptimizerError> {
        Self::new(vec![lower; dimensions], vec![upper; dimensions])
    }

    pub fn dimensions(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[i64] {
        &self.lower
    }

    pub fn upper(&self) -> &[i64] {
        &self.upper
    }

    pub fn contains(&self, point: &[i64]) -> bool {
        point.len() == self.dimensions()
            && point
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(v, (lo, hi))| lo <= v && v <= hi)
    }

    /// Reflect each out-of-range coordinate off the bound it crossed
    /// (`2 * bound - value`), then clamp. Returns whether anything reflected.
    pub fn reflect(&self, point: &mut [i64]) -> bool {
        let mut reflected = false;
        for (v, (&lo, &hi)) in point.iter_mut().zip(self.lower.iter().zip(&self.upper)) {
            if *v > hi {
                *v = hi.saturating_mul(2).saturating_sub(*v);
                reflected = true;
            } else if *v < lo {
                *v = lo.saturating_mul(2).saturating_sub(*v);
                reflected = true;
            }
            *v = (*v).clamp(lo, hi);
        }
        reflected
    }
}

/// Parameters of one search.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchConfig {
    pub bounds: Bounds,
    pub start: Vec<i64>,
    pub initial_temperature: f64,
    /// Temperature lost per step.
    pub temperature_gradient: f64,
    /// Jump distance at the initial temperature.
    pub initial_jump_distance: u32,
    /// Temperature that buys one tolerated downhill step.
    pub degrees_per_downhill_step_tolerance: f64,
    pub seed: u64,
}

impl SearchConfig {
    pub fn new(bounds: Bounds, start: Vec<i64>) -> Self {
        Self {
            bounds,
            start,
            initial_temperature: 10.0,
            temperature_gradient: 0.1,
            initial_jump_distance: 1,
            degrees_per_downhill_step_tolerance: 1.0,
            seed: 0,
        }
    }

    pub fn with_temperature(mut self, initial: f64, gradient: f64) -> Self {
        self.initial_temperature = initial;
        self.temperature_gradient = gradient;
        self
    }

    pub fn with_jump_distance(mut self, distance: u32) -> Self {
        self.initial_jump_distance = distance;
        self
    }

    pub fn with_downhill_tolerance(mut self, degrees_per_step: f64) -> Self {
        self.degrees_per_downhill_step_tolerance = degrees_per_step;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), OptimizerError> {
        Bounds::new(self.bounds.lower.clone(), self.bounds.upper.clone())?;
        if self.start.len() != self.bounds.dimensions() {
            return Err(OptimizerError::DimensionMismatch {
                expected: self.bounds.dimensions(),
                found: self.start.len(),
            });
        }
        if let Some((dimension, &value)) = self.start.iter().enumerate().find(|(d, v)| {
            **v < self.bounds.lower[*d] || **v > self.bounds.upper[*d]
        }) {
            return Err(OptimizerError::StartOutOfBounds { dimension, value });
        }
        if !self.initial_temperature.is_finite() || self.initial_temperature <= 0.0 {
            return Err(OptimizerError::InvalidTemperature(self.initial_temperature));
        }
        if !self.temperature_gradient.is_finite() || self.temperature_gradient < 0.0 {
            return Err(OptimizerError::InvalidGradient(self.temperature_gradient));
        }
        if !self.degrees_per_downhill_step_tolerance.is_finite()
            || self.degrees_per_downhill_step_tolerance <= 0.0
        {
            return Err(OptimizerError::InvalidTolerance(
                self.degrees_per_downhill_step_tolerance,
            ));
        }
        if self.initial_jump_distance == 0 {
            return Err(OptimizerError::ZeroJump);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// State and log
// ---------------------------------------------------------------------------

/// The mutable part of a search between two steps.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    pub position: PositionId,
    pub direction: Direction,
    pub temperature: f64,
    pub downhill_steps: u32,
}

/// One evaluated step, as seen before the transition it triggered.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchLogEntry {
    pub timestamp: u64,
    pub position: Vec<i64>,
    pub direction: Vec<i8>,
    pub jump_distance: u32,
    pub performance: f64,
    pub temperature: f64,
    pub downhill_steps: u32,
}

/// What a step decided after evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Moved without touching a bound.
    Moved,
    /// Moved and reflected off at least one bound.
    Reflected,
    /// Went back to the best position with a new direction.
    Retreated,
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// A single-trajectory search over a bounded integer lattice.
#[derive(Debug)]
pub struct Optimizer<P> {
    config: SearchConfig,
    performance: P,
    cache: PositionCache,
    state: SearchState,
    log: Vec<SearchLogEntry>,
    rng: ChaCha8Rng,
}

impl<P: Performance> Optimizer<P> {
    /// Validate `config` and position the search at its start point with a
    /// random direction and the initial temperature.
    pub fn new(config: SearchConfig, performance: P) -> Result<Self, OptimizerError> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut cache = PositionCache::new(config.bounds.dimensions());
        let position = cache.intern(&config.start)?;
        let state = SearchState {
            position,
            direction: Direction::random(config.bounds.dimensions(), &mut rng),
            temperature: config.initial_temperature,
            downhill_steps: 0,
        };
        Ok(Self {
            config,
            performance,
            cache,
            state,
            log: Vec::new(),
            rng,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn log(&self) -> &[SearchLogEntry] {
        &self.log
    }

    pub fn positions(&self) -> &PositionCache {
        &self.cache
    }

    pub fn performance(&self) -> &P {
        &self.performance
    }

    /// Coordinates of the current position.
    pub fn current(&self) -> &[i64] {
        self.cache
            .get(self.state.position)
            .map(|p| p.coordinates())
            .unwrap_or(&[])
    }

    /// The best position so far and its average performance.
    pub fn best(&self) -> Option<(&[i64], f64)> {
        let position = self.cache.get(self.cache.best()?)?;
        Some((position.coordinates(), position.average()?))
    }

    /// `max(1, round(initial_jump * temperature / initial_temperature))`.
    pub fn jump_distance(&self, temperature: f64) -> u32 {
        let scaled = f64::from(self.config.initial_jump_distance) * temperature
            / self.config.initial_temperature;
        let rounded = scaled.round();
        if rounded >= f64::from(u32::MAX) {
            u32::MAX
        } else if rounded >= 1.0 {
            rounded as u32
        } else {
            1
        }
    }

    fn downhill_tolerance(&self) -> u32 {
        let steps = (self.state.temperature / self.config.degrees_per_downhill_step_tolerance).floor();
        if steps >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            steps.max(0.0) as u32
        }
    }

    /// Run one transition.
    pub fn step(&mut self) -> Result<Transition, OptimizerError> {
        let coordinates = self.current().to_vec();
        let performance = self.performance.evaluate(&coordinates);
        if !performance.is_finite() {
            return Err(OptimizerError::NonFinitePerformance {
                position: coordinates,
                value: performance,
            });
        }

        self.log.push(SearchLogEntry {
            timestamp: self.log.len() as u64,
            position: coordinates.clone(),
            direction: self.state.direction.components().to_vec(),
            jump_distance: self.jump_distance(self.state.temperature),
            performance,
            temperature: self.state.temperature,
            downhill_steps: self.state.downhill_steps,
        });
        self.cache.record(self.state.position, performance);

        self.state.temperature =
            (self.state.temperature - self.config.temperature_gradient).max(0.0);

        let best = self.cache.best();
        let best_average = best
            .and_then(|id| self.cache.get(id))
            .and_then(|p| p.average())
            .unwrap_or(performance);
        if performance < best_average {
            if self.state.downhill_steps > self.downhill_tolerance() {
                if let Some(best) = best {
                    self.state.position = best;
                }
                self.state.direction = self.state.direction.change(&mut self.rng);
                self.state.downhill_steps = 0;
                tracing::debug!(
                    step = self.log.len(),
                    best = ?self.current(),
                    best_average,
                    "retreated to best position"
                );
                return Ok(Transition::Retreated);
            }
            self.state.downhill_steps += 1;
        } else {
            self.state.downhill_steps = 0;
        }

        let jump = i64::from(self.jump_distance(self.state.temperature));
        let mut next: Vec<i64> = coordinates
            .iter()
            .zip(self.state.direction.components())
            .map(|(&v, &d)| v.saturating_add(i64::from(d).saturating_mul(jump)))
            .collect();
        let reflected = self.config.bounds.reflect(&mut next);
        if reflected {
            self.state.direction = self.state.direction.change(&mut self.rng);
            tracing::debug!(step = self.log.len(), position = ?next, "reflected off bound");
        }
        self.state.position = self.cache.intern(&next)?;
        Ok(if reflected {
            Transition::Reflected
        } else {
            Transition::Moved
        })
    }

    /// Run `calls` transitions and return the best position found.
    pub fn run(&mut self, calls: u64) -> Result<Option<(Vec<i64>, f64)>, OptimizerError> {
        for _ in 0..calls {
            self.step()?;
        }
        Ok(self.best().map(|(p, avg)| (p.to_vec(), avg)))
    }
}
