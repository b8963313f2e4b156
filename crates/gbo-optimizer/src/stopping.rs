//! Optional early-stopping policies and the reason a run ended.

use serde::{Deserialize, Serialize};

use gbo_types::{invalid_config, EntryPhase, GboResult, ObjectiveDirection, OptimizationHistory};

/// When to end a run before the iteration budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoppingPolicy {
    /// Always run the full budget.
    #[default]
    None,
    /// Stop once `patience` consecutive search iterations failed to improve
    /// the incumbent by more than `min_delta`.
    NoImprovement { patience: usize, min_delta: f64 },
}

/// Why the loop reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    BudgetExhausted,
    NoImprovement,
}

impl StoppingPolicy {
    pub fn validate(&self) -> GboResult<()> {
        if let Self::NoImprovement {
            patience,
            min_delta,
        } = *self
        {
            if patience == 0 {
                return Err(invalid_config!("no-improvement patience must be positive"));
            }
            if !min_delta.is_finite() || min_delta < 0.0 {
                return Err(invalid_config!(
                    "no-improvement min_delta must be finite and non-negative, got {min_delta}"
                ));
            }
        }
        Ok(())
    }

    /// Decide whether to stop given the history so far.
    pub fn should_stop(&self, history: &OptimizationHistory, direction: ObjectiveDirection) -> bool {
        let (patience, min_delta) = match *self {
            Self::None => return false,
            Self::NoImprovement {
                patience,
                min_delta,
            } => (patience, min_delta),
        };

        let mut incumbent: Option<f64> = None;
        let mut stale = 0usize;
        for entry in history.iter() {
            let value = direction.to_maximization(entry.value);
            match incumbent {
                None => incumbent = Some(value),
                Some(best) => {
                    if value > best + min_delta {
                        incumbent = Some(value);
                        if entry.phase == EntryPhase::Search {
                            stale = 0;
                        }
                    } else {
                        if value > best {
                            incumbent = Some(value);
                        }
                        if entry.phase == EntryPhase::Search {
                            stale += 1;
                        }
                    }
                }
            }
        }
        stale >= patience
    }
}
