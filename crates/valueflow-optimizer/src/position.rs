//! Lattice positions and the cache that deduplicates them.

use std::collections::HashMap;

use crate::error::OptimizerError;

/// Index of an interned [`Position`] inside its [`PositionCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionId(pub usize);

/// A point in the integer lattice and the performance observed there.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    coordinates: Vec<i64>,
    visits: u64,
    total: f64,
}

impl Position {
    fn new(coordinates: Vec<i64>) -> Self {
        Self {
            coordinates,
            visits: 0,
            total: 0.0,
        }
    }

    pub fn coordinates(&self) -> &[i64] {
        &self.coordinates
    }

    pub fn visits(&self) -> u64 {
        self.visits
    }

    /// Running average performance, `None` until the first visit.
    pub fn average(&self) -> Option<f64> {
        if self.visits == 0 {
            None
        } else {
            Some(self.total / self.visits as f64)
        }
    }
}

/// Owns every position a search has touched. Equal coordinates always map to
/// the same [`PositionId`].
#[derive(Debug, Clone)]
pub struct PositionCache {
    dimensions: usize,
    positions: Vec<Position>,
    index: HashMap<Vec<i64>, PositionId>,
}

impl PositionCache {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            positions: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Look up or create the position at `coordinates`.
    pub fn intern(&mut self, coordinates: &[i64]) -> Result<PositionId, OptimizerError> {
        if coordinates.len() != self.dimensions {
            return Err(OptimizerError::DimensionMismatch {
                expected: self.dimensions,
                found: coordinates.len(),
            });
        }
        if let Some(&id) = self.index.get(coordinates) {
            return Ok(id);
        }
        let id = PositionId(self.positions.len());
        self.positions.push(Position::new(coordinates.to_vec()));
        self.index.insert(coordinates.to_vec(), id);
        Ok(id)
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(id.0)
    }

    /// Fold one performance sample into the position's running average.
    pub fn record(&mut self, id: PositionId, performance: f64) {
        if let Some(position) = self.positions.get_mut(id.0) {
            position.visits += 1;
            position.total += performance;
        }
    }

    /// The visited position with the highest average. The earliest interned
    /// position wins ties.
    pub fn best(&self) -> Option<PositionId> {
        let mut best: Option<(PositionId, f64)> = None;
        for (i, position) in self.positions.iter().enumerate() {
            let Some(avg) = position.average() else {
                continue;
            };
            if best.is_none_or(|(_, b)| avg > b) {
                best = Some((PositionId(i), avg));
            }
        }
        best.map(|(id, _)| id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PositionId, &Position)> {
        self.positions
            .iter()
            .enumerate()
            .map(|(i, p)| (PositionId(i), p))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
