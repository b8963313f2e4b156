//! Optimizer configuration.

use serde::{Deserialize, Serialize};

use gbo_surrogate::{GpConfig, HyperparameterStrategy, KernelFamily, NuggetPolicy, PriorMean};
use gbo_types::{invalid_config, Bounds, GboError, GboResult, Observation, ObjectiveDirection};

use crate::acquisition::{Acquisition, AcquisitionKind};
use crate::candidates::CandidateStrategy;
use crate::stopping::StoppingPolicy;

/// Everything that shapes one optimization run. Bounds are supplied
/// separately so the same configuration can be reused across problems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Random seed evaluations drawn uniformly within the bounds.
    pub init_points: usize,

    /// Explicit points evaluated before the random seeds.
    pub init_grid: Vec<Vec<f64>>,

    /// Points that already carry a value; recorded without calling the
    /// objective.
    pub init_observations: Vec<Observation>,

    /// Bayesian-optimization iterations after seeding.
    pub n_iter: usize,

    pub acquisition: AcquisitionKind,

    /// UCB exploration weight.
    pub kappa: f64,

    /// EI / PoI exploration margin.
    pub xi: f64,

    pub kernel: KernelFamily,
    pub hyperparameters: HyperparameterStrategy,
    pub nugget: NuggetPolicy,
    pub prior_mean: PriorMean,
    pub candidates: CandidateStrategy,
    pub direction: ObjectiveDirection,
    pub stopping: StoppingPolicy,

    /// Per-call objective deadline in milliseconds. `None` waits forever.
    pub objective_timeout_ms: Option<u64>,

    /// Evaluate seed points concurrently. The objective must tolerate it.
    pub parallel_seed_evaluation: bool,

    pub random_seed: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            init_points: 5,
            init_grid: Vec::new(),
            init_observations: Vec::new(),
            n_iter: 25,
            acquisition: AcquisitionKind::ExpectedImprovement,
            kappa: 2.576,
            xi: 0.01,
            kernel: KernelFamily::default(),
            hyperparameters: HyperparameterStrategy::default(),
            nugget: NuggetPolicy::default(),
            prior_mean: PriorMean::default(),
            candidates: CandidateStrategy::default(),
            direction: ObjectiveDirection::Maximize,
            stopping: StoppingPolicy::None,
            objective_timeout_ms: None,
            parallel_seed_evaluation: false,
            random_seed: 42,
        }
    }
}

impl OptimizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> GboResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_init_points(mut self, n: usize) -> Self {
        self.init_points = n;
        self
    }

    pub fn with_init_grid(mut self, grid: Vec<Vec<f64>>) -> Self {
        self.init_grid = grid;
        self
    }

    pub fn with_init_observations(mut self, observations: Vec<Observation>) -> Self {
        self.init_observations = observations;
        self
    }

    pub fn with_n_iter(mut self, n: usize) -> Self {
        self.n_iter = n;
        self
    }

    pub fn with_acquisition(mut self, kind: AcquisitionKind) -> Self {
        self.acquisition = kind;
        self
    }

    pub fn with_kappa(mut self, kappa: f64) -> Self {
        self.kappa = kappa;
        self
    }

    pub fn with_xi(mut self, xi: f64) -> Self {
        self.xi = xi;
        self
    }

    pub fn with_kernel(mut self, kernel: KernelFamily) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_hyperparameters(mut self, strategy: HyperparameterStrategy) -> Self {
        self.hyperparameters = strategy;
        self
    }

    pub fn with_nugget(mut self, nugget: NuggetPolicy) -> Self {
        self.nugget = nugget;
        self
    }

    pub fn with_prior_mean(mut self, prior_mean: PriorMean) -> Self {
        self.prior_mean = prior_mean;
        self
    }

    pub fn with_candidates(mut self, candidates: CandidateStrategy) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_direction(mut self, direction: ObjectiveDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_stopping(mut self, stopping: StoppingPolicy) -> Self {
        self.stopping = stopping;
        self
    }

    pub fn with_objective_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.objective_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_parallel_seed_evaluation(mut self, enabled: bool) -> Self {
        self.parallel_seed_evaluation = enabled;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Number of seed evaluations the objective will see.
    pub fn seed_evaluations(&self) -> usize {
        self.init_grid.len() + self.init_points
    }

    /// Check the configuration against `bounds` before anything is evaluated.
    pub fn validate(&self, bounds: &Bounds) -> GboResult<()> {
        bounds.validate()?;
        let dimension = bounds.len();

        if self.seed_evaluations() == 0 && self.init_observations.is_empty() {
            return Err(GboError::EmptySeed);
        }
        for (i, point) in self.init_grid.iter().enumerate() {
            bounds.check_point(point)?;
            if let Some(dim) = bounds.fractional_dimension(point) {
                return Err(invalid_config!(
                    "init_grid[{i}] is not a whole number on integer dimension {}",
                    dim.name
                ));
            }
        }
        for (i, observation) in self.init_observations.iter().enumerate() {
            bounds.check_point(&observation.point)?;
            if let Some(dim) = bounds.fractional_dimension(&observation.point) {
                return Err(invalid_config!(
                    "init_observations[{i}] is not a whole number on integer dimension {}",
                    dim.name
                ));
            }
            if !observation.value.is_finite() {
                return Err(invalid_config!(
                    "init_observations[{i}] has non-finite value {}",
                    observation.value
                ));
            }
        }

        if !self.kappa.is_finite() || self.kappa < 0.0 {
            return Err(invalid_config!("kappa must be finite and non-negative, got {}", self.kappa));
        }
        if !self.xi.is_finite() || self.xi < 0.0 {
            return Err(invalid_config!("xi must be finite and non-negative, got {}", self.xi));
        }
        if self.objective_timeout_ms == Some(0) {
            return Err(invalid_config!("objective timeout must be positive"));
        }

        self.gp_config().validate(dimension)?;
        self.candidates.validate(dimension)?;
        self.stopping.validate()?;
        Ok(())
    }

    pub fn gp_config(&self) -> GpConfig {
        GpConfig {
            kernel: self.kernel,
            hyperparameters: self.hyperparameters.clone(),
            nugget: self.nugget,
            prior_mean: self.prior_mean,
        }
    }

    pub fn acquisition(&self) -> Acquisition {
        Acquisition::from_kind(self.acquisition, self.kappa, self.xi)
    }
}
