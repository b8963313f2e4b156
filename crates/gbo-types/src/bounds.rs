//! Search bounds: an ordered list of named, closed dimension ranges.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{GboError, GboResult};

/// How values along a dimension are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    /// Any real value in `[lower, upper]`.
    #[default]
    Continuous,
    /// Whole numbers in `[lower, upper]`; proposals are rounded.
    Integer,
}

/// A single named dimension of the search box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Human-readable dimension name (e.g. "learning_rate").
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    #[serde(default)]
    pub kind: DimensionKind,
}

impl Dimension {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    fn snap(&self, value: f64) -> f64 {
        match self.kind {
            DimensionKind::Continuous => value.clamp(self.lower, self.upper),
            DimensionKind::Integer => value
                .round()
                .clamp(self.lower.ceil(), self.upper.floor()),
        }
    }
}

/// The full search box. Immutable for the lifetime of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Bounds {
    dimensions: Vec<Dimension>,
}

impl Bounds {
    pub fn new() -> Self {
        Self {
            dimensions: Vec::new(),
        }
    }

    pub fn add_continuous(mut self, name: impl Into<String>, lower: f64, upper: f64) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            lower,
            upper,
            kind: DimensionKind::Continuous,
        });
        self
    }

    pub fn add_integer(mut self, name: impl Into<String>, lower: i64, upper: i64) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            lower: lower as f64,
            upper: upper as f64,
            kind: DimensionKind::Integer,
        });
        self
    }

    /// Number of dimensions `D`.
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dimensions.iter().map(|d| d.name.as_str())
    }

    /// Check that the box is well formed: at least one dimension, unique
    /// names, finite `lower <= upper` with a finite width, and a whole
    /// number inside every integer range.
    pub fn validate(&self) -> GboResult<()> {
        if self.dimensions.is_empty() {
            return Err(GboError::InvalidBounds {
                dimension: "<none>".to_string(),
                message: "at least one dimension is required".to_string(),
            });
        }

        for (i, dim) in self.dimensions.iter().enumerate() {
            let invalid = |message: &str| GboError::InvalidBounds {
                dimension: dim.name.clone(),
                message: message.to_string(),
            };
            if !dim.lower.is_finite() || !dim.upper.is_finite() {
                return Err(invalid("bounds must be finite"));
            }
            if dim.lower > dim.upper {
                return Err(invalid("lower bound exceeds upper bound"));
            }
            if !dim.width().is_finite() {
                return Err(invalid("bounds width must be finite"));
            }
            if dim.kind == DimensionKind::Integer && dim.lower.ceil() > dim.upper.floor() {
                return Err(invalid("integer range contains no whole number"));
            }
            if self.dimensions[..i].iter().any(|d| d.name == dim.name) {
                return Err(invalid("duplicate dimension name"));
            }
        }
        Ok(())
    }

    /// Verify that `point` has `D` coordinates and lies inside the box.
    pub fn check_point(&self, point: &[f64]) -> GboResult<()> {
        if point.len() != self.dimensions.len() {
            return Err(GboError::DimensionMismatch {
                expected: self.dimensions.len(),
                actual: point.len(),
            });
        }
        for (dim, &value) in self.dimensions.iter().zip(point) {
            if !(value >= dim.lower && value <= dim.upper) {
                return Err(GboError::BoundsViolation {
                    point: point.to_vec(),
                    dimension: dim.name.clone(),
                    lower: dim.lower,
                    upper: dim.upper,
                });
            }
        }
        Ok(())
    }

    /// First integer dimension on which `point` is not a whole number.
    pub fn fractional_dimension(&self, point: &[f64]) -> Option<&Dimension> {
        self.dimensions
            .iter()
            .zip(point)
            .find(|(dim, value)| dim.kind == DimensionKind::Integer && value.fract() != 0.0)
            .map(|(dim, _)| dim)
    }

    pub fn contains(&self, point: &[f64]) -> bool {
        self.check_point(point).is_ok()
    }

    /// Map a point into the unit cube `[0, 1]^D`.
    pub fn to_unit(&self, point: &[f64]) -> Vec<f64> {
        self.dimensions
            .iter()
            .zip(point)
            .map(|(dim, &value)| {
                let width = dim.width();
                if width <= 0.0 {
                    0.5
                } else {
                    (value - dim.lower) / width
                }
            })
            .collect()
    }

    /// Map a unit-cube point back into the box, rounding integer dimensions.
    pub fn from_unit(&self, unit: &[f64]) -> Vec<f64> {
        self.dimensions
            .iter()
            .zip(unit)
            .map(|(dim, &u)| dim.snap(dim.lower + u * dim.width()))
            .collect()
    }

    /// Draw a point uniformly inside the box.
    pub fn sample_uniform<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.dimensions
            .iter()
            .map(|dim| {
                let value = if dim.width() > 0.0 {
                    rng.gen_range(dim.lower..=dim.upper)
                } else {
                    dim.lower
                };
                dim.snap(value)
            })
            .collect()
    }

    /// Pair every coordinate of `point` with its dimension name.
    pub fn named(&self, point: &[f64]) -> BTreeMap<String, f64> {
        self.dimensions
            .iter()
            .zip(point)
            .map(|(dim, &value)| (dim.name.clone(), value))
            .collect()
    }
}
