//! # gbo-surrogate
//!
//! Covariance kernels and Gaussian process surrogate models for GlowBack
//! Bayesian optimization.
//!
//! Provides power-exponential and Matérn correlation families, a GP fitted by
//! Cholesky factorization with nugget escalation, and maximum-likelihood
//! selection of per-dimension correlation scales.

mod gp;
mod kernel;
mod likelihood;

pub use gp::{GaussianProcess, GpConfig, HyperparameterStrategy, NuggetPolicy, PriorMean};
pub use kernel::{covariance, covariance_matrix, KernelFamily, KernelParams, MATERN_SMOOTHNESS};
pub use likelihood::{LOG_THETA_MAX, LOG_THETA_MIN};
