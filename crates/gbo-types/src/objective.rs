//! The objective-function contract shared by the optimizer and its adapters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::ObjectiveError;

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveDirection {
    #[default]
    Maximize,
    Minimize,
}

impl ObjectiveDirection {
    /// `true` when `candidate` strictly improves on `incumbent`.
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }

    /// Map an observed value onto the maximization scale used internally.
    pub fn to_maximization(self, value: f64) -> f64 {
        match self {
            Self::Maximize => value,
            Self::Minimize => -value,
        }
    }
}

/// What one objective call produced: the scalar score plus optional
/// auxiliary metrics that the optimizer records but never reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aux: BTreeMap<String, f64>,
}

impl Evaluation {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            aux: BTreeMap::new(),
        }
    }

    pub fn with_aux(mut self, key: impl Into<String>, value: f64) -> Self {
        self.aux.insert(key.into(), value);
        self
    }
}

impl From<f64> for Evaluation {
    fn from(score: f64) -> Self {
        Self::new(score)
    }
}

/// A black-box scalar function over a bounded real-valued box.
///
/// Implementations may be noisy; the optimizer never assumes that repeated
/// calls at the same point agree.
pub trait Objective: Send + Sync {
    fn evaluate(&self, point: &[f64]) -> Result<Evaluation, ObjectiveError>;

    /// Human-readable objective name.
    fn name(&self) -> &str {
        "objective"
    }
}

impl<T: Objective + ?Sized> Objective for Box<T> {
    fn evaluate(&self, point: &[f64]) -> Result<Evaluation, ObjectiveError> {
        (**self).evaluate(point)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Adapter turning a plain closure into an [`Objective`].
pub struct FnObjective<F> {
    name: String,
    func: F,
}

impl<F> FnObjective<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Objective for FnObjective<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn evaluate(&self, point: &[f64]) -> Result<Evaluation, ObjectiveError> {
        Ok(Evaluation::new((self.func)(point)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
