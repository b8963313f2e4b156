//! Append-only set of evaluated points.

use serde::{Deserialize, Serialize};

use crate::errors::{GboError, GboResult, ObjectiveError};

/// One evaluated point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub point: Vec<f64>,
    pub value: f64,
}

/// Ordered observations sharing one dimensionality. Grows, never shrinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSet {
    dimension: usize,
    observations: Vec<Observation>,
}

impl ObservationSet {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            observations: Vec::new(),
        }
    }

    /// Build a set from parallel point/value slices.
    pub fn from_pairs(dimension: usize, points: &[Vec<f64>], values: &[f64]) -> GboResult<Self> {
        if points.len() != values.len() {
            return Err(GboError::DimensionMismatch {
                expected: points.len(),
                actual: values.len(),
            });
        }
        let mut set = Self::new(dimension);
        for (point, &value) in points.iter().zip(values) {
            set.push(point.clone(), value)?;
        }
        Ok(set)
    }

    /// Append an observation. Rejects wrong dimensionality and non-finite
    /// values.
    pub fn push(&mut self, point: Vec<f64>, value: f64) -> GboResult<()> {
        if point.len() != self.dimension {
            return Err(GboError::DimensionMismatch {
                expected: self.dimension,
                actual: point.len(),
            });
        }
        if !value.is_finite() {
            return Err(ObjectiveError::NonFinite { value }.into());
        }
        self.observations.push(Observation { point, value });
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }
}
