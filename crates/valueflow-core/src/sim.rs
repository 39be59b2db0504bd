//! Simulation clock and state hashing.
//!
//! The [`Clock`] owns the discrete timeline. It only ever moves forward by
//! one tick at a time, except for [`Clock::reset_to`], which exists for
//! initialization before the first tick runs.

use crate::fixed::{Fixed64, Ticks};
use crate::id::Holder;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Discrete simulation time.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Clock {
    time: Ticks,
    start_time: Ticks,
}

impl Clock {
    /// Create a clock standing at `start_time`. No tick has run yet.
    pub fn new(start_time: Ticks) -> Self {
        Self {
            time: start_time,
            start_time,
        }
    }

    /// Current time.
    pub fn time(&self) -> Ticks {
        self.time
    }

    /// The time the clock was started (or last reset) at.
    pub fn start_time(&self) -> Ticks {
        self.start_time
    }

    /// The first tick that actually runs: `start_time + 1`.
    pub fn first_iteration(&self) -> Ticks {
        self.start_time.saturating_add(1)
    }

    /// Advance by one unit and return the new time.
    pub fn tick(&mut self) -> Ticks {
        self.time = self.time.saturating_add(1);
        self.time
    }

    /// Move the clock to `time` and treat it as the new start. Only meant to
    /// be used while setting a system up.
    pub fn reset_to(&mut self, time: Ticks) {
        self.time = time;
        self.start_time = time;
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(0)
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// FNV-1a (64-bit) fingerprint of a run, fed with ticks, holders and
/// fixed-point values. Two runs with the same seed and work orders must end
/// with the same fingerprint. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(u64);

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Holder tag for the sink; stage steps never reach it.
const SINK_TAG: u32 = u32::MAX;

impl StateHash {
    pub fn new() -> Self {
        Self(FNV_OFFSET)
    }

    fn absorb(&mut self, bytes: &[u8]) {
        self.0 = bytes
            .iter()
            .fold(self.0, |h, &b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME));
    }

    pub fn write_tick(&mut self, tick: Ticks) {
        self.absorb(&tick.to_le_bytes());
    }

    pub fn write_count(&mut self, count: usize) {
        self.absorb(&(count as u64).to_le_bytes());
    }

    /// Chain and step for a stage, a fixed tag for the sink.
    pub fn write_holder(&mut self, holder: Holder) {
        let (chain, step) = match holder {
            Holder::Stage(stage) => (stage.chain.0, stage.step),
            Holder::Sink => (SINK_TAG, SINK_TAG),
        };
        self.absorb(&chain.to_le_bytes());
        self.absorb(&step.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.absorb(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
