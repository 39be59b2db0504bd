//! Selection strategies: ordered tie-break rules for choosing the next item.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::decision::{DecisionInfo, Metric};
use crate::error::ConfigError;
use crate::id::ItemId;

/// Which end of a metric a criterion prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Extremum {
    Min,
    Max,
}

impl FromStr for Extremum {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "min" => Ok(Extremum::Min),
            "max" => Ok(Extremum::Max),
            other => Err(ConfigError::UnknownExtremum(other.to_string())),
        }
    }
}

/// One ranking level: keep the candidates at the `extremum` of `metric`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Criterion {
    pub metric: Metric,
    pub extremum: Extremum,
}

impl Criterion {
    pub fn min(metric: Metric) -> Self {
        Self {
            metric,
            extremum: Extremum::Min,
        }
    }

    pub fn max(metric: Metric) -> Self {
        Self {
            metric,
            extremum: Extremum::Max,
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = match self.extremum {
            Extremum::Min => "min",
            Extremum::Max => "max",
        };
        write!(f, "{}:{end}", self.metric)
    }
}

/// Parses `"metric:min"` / `"metric:max"`.
impl FromStr for Criterion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (metric, extremum) = s
            .split_once(':')
            .ok_or_else(|| ConfigError::MalformedCriterion(s.to_string()))?;
        Ok(Self {
            metric: metric.parse()?,
            extremum: extremum.parse()?,
        })
    }
}

/// A named, ordered list of criteria applied left to right.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SelectionStrategy {
    name: String,
    criteria: Vec<Criterion>,
}

impl SelectionStrategy {
    pub fn new(name: impl Into<String>, criteria: Vec<Criterion>) -> Self {
        Self {
            name: name.into(),
            criteria,
        }
    }

    /// Build a strategy from criterion strings, failing on the first unknown
    /// metric or extremum.
    pub fn parse<S: AsRef<str>>(name: impl Into<String>, criteria: &[S]) -> Result<Self, ConfigError> {
        let criteria = criteria
            .iter()
            .map(|c| c.as_ref().parse())
            .collect::<Result<Vec<Criterion>, _>>()?;
        Ok(Self::new(name, criteria))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    /// Pick one candidate.
    ///
    /// Each criterion narrows the pool to the candidates attaining its
    /// extreme value. Narrowing stops once a single candidate is left; any
    /// tie remaining after the last criterion is broken uniformly at random.
    pub fn select<R: Rng + ?Sized>(
        &self,
        candidates: &[(ItemId, DecisionInfo)],
        rng: &mut R,
    ) -> Option<ItemId> {
        let mut pool: Vec<&(ItemId, DecisionInfo)> = candidates.iter().collect();
        for criterion in &self.criteria {
            if pool.len() <= 1 {
                break;
            }
            let values = pool.iter().map(|(_, info)| info.metric(criterion.metric));
            let extreme = match criterion.extremum {
                Extremum::Min => values.min(),
                Extremum::Max => values.max(),
            };
            if let Some(extreme) = extreme {
                pool.retain(|(_, info)| info.metric(criterion.metric) == extreme);
            }
        }
        pool.choose(rng).map(|(id, _)| *id)
    }
}
