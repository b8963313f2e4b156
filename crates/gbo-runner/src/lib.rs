//! # gbo-runner
//!
//! JSON run files for the `gbo-run` binary: the search bounds, the optimizer
//! configuration and which built-in objective to optimize.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use gbo_objectives::{Branin, OscillatingQuadratic, PortfolioConfig, SharpeObjective};
use gbo_optimizer::{BayesianOptimizer, OptimizationResult, OptimizerConfig, RunAborted};
use gbo_types::{invalid_config, Bounds, GboError, GboResult, Objective};

/// Built-in objectives a run file can name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuiltinObjective {
    OscillatingQuadratic,
    Branin,
    Portfolio(PortfolioConfig),
}

impl BuiltinObjective {
    pub fn build(&self) -> GboResult<Box<dyn Objective>> {
        Ok(match self {
            Self::OscillatingQuadratic => Box::new(OscillatingQuadratic),
            Self::Branin => Box::new(Branin),
            Self::Portfolio(config) => Box::new(SharpeObjective::new(config.clone())?),
        })
    }

    /// Bounds implied by the objective when the run file gives none.
    pub fn default_bounds(&self) -> GboResult<Bounds> {
        Ok(match self {
            Self::OscillatingQuadratic => OscillatingQuadratic::bounds(),
            Self::Branin => Branin::bounds(),
            Self::Portfolio(config) => SharpeObjective::new(config.clone())?.bounds(),
        })
    }
}

/// One optimization run described on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFile {
    pub name: String,
    /// Search box; falls back to the objective's natural bounds.
    #[serde(default)]
    pub bounds: Option<Bounds>,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    pub objective: BuiltinObjective,
}

impl RunFile {
    pub fn from_json(json: &str) -> GboResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> GboResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| invalid_config!("cannot read run file {}: {e}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn bounds(&self) -> GboResult<Bounds> {
        match &self.bounds {
            Some(bounds) => Ok(bounds.clone()),
            None => self.objective.default_bounds(),
        }
    }

    /// Validate everything and build the optimizer and objective, without
    /// evaluating anything.
    pub fn prepare(&self) -> GboResult<(BayesianOptimizer, Box<dyn Objective>)> {
        let objective = self.objective.build()?;
        let optimizer = BayesianOptimizer::new(self.optimizer.clone(), self.bounds()?)?
            .with_name(self.name.clone());
        Ok((optimizer, objective))
    }
}

/// Why a run file did not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Setup(#[from] GboError),
    #[error(transparent)]
    Aborted(#[from] RunAborted),
}

/// Build and run everything a run file describes.
pub fn execute(run: &RunFile) -> Result<OptimizationResult, RunError> {
    let (optimizer, objective) = run.prepare()?;
    info!("Prepared run {} with {} dimensions", run.name, optimizer.bounds().len());
    Ok(optimizer.run(objective)?)
}
