//! # gbo-optimizer
//!
//! Acquisition functions and the Bayesian optimization loop for GlowBack.
//!
//! Provides expected improvement, upper confidence bound and probability of
//! improvement scoring, grid and random candidate search over the bounds,
//! optional early stopping, and a seeded optimizer that refits a Gaussian
//! process surrogate every iteration.

mod acquisition;
mod candidates;
mod config;
mod optimizer;
mod stopping;

pub use acquisition::{
    expected_improvement, norm_cdf, norm_pdf, probability_of_improvement, select_best,
    upper_confidence_bound, Acquisition, AcquisitionKind,
};
pub use candidates::{unit_grid, AcquisitionMaximizer, CandidateStrategy, Selection, MAX_GRID_POINTS};
pub use config::OptimizerConfig;
pub use optimizer::{BayesianOptimizer, LoopPhase, OptimizationResult, RunAborted, RunId};
pub use stopping::{StoppingPolicy, TerminationReason};
