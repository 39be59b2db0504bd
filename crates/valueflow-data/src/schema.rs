//! Serde data file structs for scenario definitions.
//!
//! A scenario directory holds up to five files, each in RON, JSON or TOML:
//! `settings`, `chains`, `workers`, `assignments` and `work_orders`. These
//! structs define their on-disk shape; the loader resolves names and turns
//! them into simulation types.

use serde::Deserialize;

// ===========================================================================
// Settings
// ===========================================================================

/// Global run settings. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsData {
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub start_time: u64,
}

// ===========================================================================
// Chains
// ===========================================================================

/// A value chain definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainData {
    pub name: String,
    pub value: f64,
    /// Expected arrivals per tick; absent means work orders only.
    #[serde(default)]
    pub injection_rate: Option<f64>,
    #[serde(default)]
    pub decay: DecayData,
    pub stages: Vec<StageData>,
}

/// How a chain's value decays with delay.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayData {
    #[default]
    Net,
    Discounted {
        rate: f64,
    },
    Expired {
        expiry: u64,
    },
}

/// A stage within a chain, listed in pipeline order.
#[derive(Debug, Clone, Deserialize)]
pub struct StageData {
    pub name: String,
    pub effort: u32,
    #[serde(default)]
    pub wip_limit: Option<u32>,
}

// ===========================================================================
// Workers
// ===========================================================================

/// A worker definition. Omitted tuning fields take the simulation defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerData {
    pub name: String,
    #[serde(default)]
    pub observation_period: Option<u64>,
    /// `"value_contributed"`, `"roce"` or `"zero"`.
    #[serde(default)]
    pub success_measure: Option<String>,
    #[serde(default)]
    pub adjustment: Option<f64>,
    #[serde(default)]
    pub weight_floor: Option<f64>,
    pub strategies: Vec<StrategyData>,
}

/// A selection strategy as a list of `"metric:min"` / `"metric:max"` strings.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyData {
    pub name: String,
    pub criteria: Vec<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

// ===========================================================================
// Assignments and work orders
// ===========================================================================

/// Lets a worker pull from one stage, all by name.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentData {
    pub worker: String,
    pub chain: String,
    pub stage: String,
}

/// One item to inject into the named chain at `tick`.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkOrderData {
    pub tick: u64,
    pub chain: String,
}
