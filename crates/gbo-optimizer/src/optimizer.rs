//! The Bayesian optimization loop.
//!
//! A run moves through `Seeding → Fitting → Acquiring → Evaluating →
//! Updating → (Fitting | Terminated)`. The surrogate is refitted from
//! scratch on every iteration in unit-cube coordinates with observations on
//! the maximization scale; the caller only ever sees points in the original
//! bounds and values as the objective returned them.

use chrono::{DateTime, Utc};
use crossbeam_channel::RecvTimeoutError;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use gbo_surrogate::{GaussianProcess, GpConfig};
use gbo_types::{
    Bounds, EntryPhase, Evaluation, GboError, GboResult, Objective, ObjectiveDirection,
    ObjectiveError, ObservationSet, OptimizationHistory,
};

use crate::acquisition::Acquisition;
use crate::candidates::AcquisitionMaximizer;
use crate::config::OptimizerConfig;
use crate::stopping::TerminationReason;

/// Unique optimization run identifier.
pub type RunId = Uuid;

/// State of the optimization loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    Seeding,
    Fitting,
    Acquiring,
    Evaluating,
    Updating,
    Terminated,
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Seeding => "seeding",
            Self::Fitting => "fitting",
            Self::Acquiring => "acquiring",
            Self::Evaluating => "evaluating",
            Self::Updating => "updating",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// A run stopped by an error. Carries everything recorded before the
/// failure so the caller can inspect or resume it.
#[derive(Error, Debug)]
#[error("optimization aborted while {phase} at iteration {iteration}: {source}")]
pub struct RunAborted {
    /// Iteration in progress (0 during seeding).
    pub iteration: usize,
    pub phase: LoopPhase,
    /// History up to the last valid entry.
    pub history: OptimizationHistory,
    pub source: GboError,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub run_id: RunId,
    pub name: String,
    pub objective: String,
    pub direction: ObjectiveDirection,
    pub best_point: Vec<f64>,
    pub best_params: BTreeMap<String, f64>,
    pub best_value: f64,
    /// History index of the best entry.
    pub best_index: usize,
    /// Search iterations completed.
    pub iterations: usize,
    pub termination: TerminationReason,
    pub history: OptimizationHistory,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Gaussian-process Bayesian optimizer over a fixed box.
///
/// One instance drives one run; concurrent runs need independent instances.
pub struct BayesianOptimizer {
    name: String,
    config: OptimizerConfig,
    bounds: Bounds,
    acquisition: Acquisition,
    gp_config: GpConfig,
    rng: ChaCha8Rng,
    /// Unit-cube points with maximization-scale values.
    observations: ObservationSet,
    history: OptimizationHistory,
    phase: LoopPhase,
    iteration: usize,
}

impl BayesianOptimizer {
    /// Validate `config` against `bounds` and prepare a run. Nothing is
    /// evaluated here.
    pub fn new(config: OptimizerConfig, bounds: Bounds) -> GboResult<Self> {
        config.validate(&bounds)?;
        Ok(Self {
            name: "bayesian-optimization".to_string(),
            acquisition: config.acquisition(),
            gp_config: config.gp_config(),
            rng: ChaCha8Rng::seed_from_u64(config.random_seed),
            observations: ObservationSet::new(bounds.len()),
            history: OptimizationHistory::new(),
            phase: LoopPhase::Seeding,
            iteration: 0,
            config,
            bounds,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn history(&self) -> &OptimizationHistory {
        &self.history
    }

    /// Run seeding and the full iteration budget (or until the stopping
    /// policy fires).
    ///
    /// With a timeout configured each call runs on its own worker thread;
    /// an expired worker is left to finish in the background and its result
    /// is discarded.
    pub fn run<O: Objective + 'static>(
        mut self,
        objective: O,
    ) -> Result<OptimizationResult, RunAborted> {
        let objective = Arc::new(objective);
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            "Starting optimization {} ({}) of {}: {} dimensions, {} seed points, {} iterations, {} acquisition",
            self.name,
            run_id,
            objective.name(),
            self.bounds.len(),
            self.config.seed_evaluations(),
            self.config.n_iter,
            self.config.acquisition
        );

        self.seed(&objective)?;

        let mut termination = TerminationReason::BudgetExhausted;
        for iteration in 1..=self.config.n_iter {
            self.iteration = iteration;
            self.step(&objective)?;
            if self
                .config
                .stopping
                .should_stop(&self.history, self.config.direction)
            {
                info!("No improvement for the configured patience; stopping after iteration {}", iteration);
                termination = TerminationReason::NoImprovement;
                break;
            }
        }
        self.phase = LoopPhase::Terminated;

        let best = match self.history.best(self.config.direction) {
            Some(entry) => entry.clone(),
            None => return Err(self.abort(GboError::EmptySeed)),
        };
        let finished_at = Utc::now();
        info!(
            "Optimization {} finished ({:?}) after {} iterations: best value {:.6} at {:?}",
            self.name, termination, self.iteration, best.value, best.point
        );

        Ok(OptimizationResult {
            run_id,
            name: self.name,
            objective: objective.name().to_string(),
            direction: self.config.direction,
            best_params: self.bounds.named(&best.point),
            best_point: best.point,
            best_value: best.value,
            best_index: best.index,
            iterations: self.iteration,
            termination,
            history: self.history,
            started_at,
            finished_at,
        })
    }

    fn seed<O: Objective + 'static>(&mut self, objective: &Arc<O>) -> Result<(), RunAborted> {
        self.phase = LoopPhase::Seeding;

        for prior in self.config.init_observations.clone() {
            self.record(EntryPhase::Prior, prior.point, Evaluation::new(prior.value), None)
                .map_err(|e| self.abort(e))?;
        }

        let mut points = self.config.init_grid.clone();
        for _ in 0..self.config.init_points {
            points.push(self.bounds.sample_uniform(&mut self.rng));
        }
        debug!("Seeding with {} points", points.len());

        let timeout = self.timeout();
        if self.config.parallel_seed_evaluation {
            let results: Vec<Result<Evaluation, ObjectiveError>> = points
                .par_iter()
                .map(|point| evaluate(objective, point, timeout))
                .collect();
            for (point, result) in points.into_iter().zip(results) {
                let evaluation = result.map_err(|e| self.abort(e.into()))?;
                self.record(EntryPhase::Seed, point, evaluation, None)
                    .map_err(|e| self.abort(e))?;
            }
        } else {
            for point in points {
                let evaluation =
                    evaluate(objective, &point, timeout).map_err(|e| self.abort(e.into()))?;
                self.record(EntryPhase::Seed, point, evaluation, None)
                    .map_err(|e| self.abort(e))?;
            }
        }

        if self.observations.is_empty() {
            return Err(self.abort(GboError::EmptySeed));
        }
        Ok(())
    }

    /// One Fitting → Acquiring → Evaluating → Updating pass.
    fn step<O: Objective + 'static>(&mut self, objective: &Arc<O>) -> Result<(), RunAborted> {
        self.phase = LoopPhase::Fitting;
        let gp = GaussianProcess::fit(&self.observations, &self.gp_config, &mut self.rng)
            .map_err(|e| self.abort(e))?;
        debug!(
            "Iteration {}: surrogate theta {:?}, nugget {:e}, neg log-likelihood {:.4}",
            self.iteration,
            gp.params().theta,
            gp.nugget(),
            gp.neg_log_likelihood()
        );

        self.phase = LoopPhase::Acquiring;
        let incumbent = self
            .observations
            .values()
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max);
        let maximizer = AcquisitionMaximizer {
            gp: &gp,
            acquisition: self.acquisition,
            best: incumbent,
            bounds: &self.bounds,
        };
        let selection = maximizer
            .maximize(&self.config.candidates, &mut self.rng)
            .map_err(|e| self.abort(e))?;
        info!(
            "Iteration {}/{}: proposing {:?} (acquisition {:.4e}, mean {:.4}, std {:.4})",
            self.iteration,
            self.config.n_iter,
            selection.point,
            selection.score,
            self.config.direction.to_maximization(selection.mean),
            selection.variance.sqrt()
        );

        self.phase = LoopPhase::Evaluating;
        let evaluation = evaluate(objective, &selection.point, self.timeout())
            .map_err(|e| self.abort(e.into()))?;

        self.phase = LoopPhase::Updating;
        self.record(EntryPhase::Search, selection.point, evaluation, Some(selection.score))
            .map_err(|e| self.abort(e))
    }

    fn record(
        &mut self,
        phase: EntryPhase,
        point: Vec<f64>,
        evaluation: Evaluation,
        acquisition: Option<f64>,
    ) -> GboResult<()> {
        let unit = self.bounds.to_unit(&point);
        self.observations
            .push(unit, self.config.direction.to_maximization(evaluation.score))?;
        let improved = self
            .history
            .best(self.config.direction)
            .map_or(true, |best| self.config.direction.is_better(evaluation.score, best.value));
        let entry = self.history.record(
            phase,
            self.iteration,
            point,
            evaluation.score,
            acquisition,
            evaluation.aux,
        );
        if improved {
            info!("New best value {:.6} at {:?} (entry {})", entry.value, entry.point, entry.index);
        }
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        self.config.objective_timeout_ms.map(Duration::from_millis)
    }

    fn abort(&self, source: GboError) -> RunAborted {
        RunAborted {
            iteration: self.iteration,
            phase: self.phase,
            history: self.history.clone(),
            source,
        }
    }
}

/// Call the objective once, optionally under a deadline, and reject
/// non-finite scores.
fn evaluate<O: Objective + 'static>(
    objective: &Arc<O>,
    point: &[f64],
    timeout: Option<Duration>,
) -> Result<Evaluation, ObjectiveError> {
    let evaluation = match timeout {
        None => objective.evaluate(point)?,
        Some(limit) => {
            let (tx, rx) = crossbeam_channel::bounded(1);
            let worker = Arc::clone(objective);
            let owned = point.to_vec();
            thread::Builder::new()
                .name("gbo-objective".to_string())
                .spawn(move || {
                    let _ = tx.send(worker.evaluate(&owned));
                })
                .map_err(|e| ObjectiveError::failed(format!("failed to spawn objective worker: {e}")))?;
            match rx.recv_timeout(limit) {
                Ok(result) => result?,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(ObjectiveError::Timeout {
                        timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    })
                }
                Err(RecvTimeoutError::Disconnected) => return Err(ObjectiveError::Disconnected),
            }
        }
    };
    if !evaluation.score.is_finite() {
        return Err(ObjectiveError::NonFinite {
            value: evaluation.score,
        });
    }
    Ok(evaluation)
}
