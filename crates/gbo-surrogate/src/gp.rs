//! Gaussian process surrogate.
//!
//! A model is fitted from scratch on the full observation set every time it
//! is needed; there is no incremental update. Fitting is O(n³) in the number
//! of observations (one Cholesky factorization per likelihood evaluation),
//! prediction O(n²) per query point given the factorization, which keeps
//! practical runs to a few hundred observations.

use nalgebra::linalg::Cholesky;
use nalgebra::{DVector, Dyn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use gbo_types::{GboError, GboResult, ObservationSet};

use crate::kernel::{KernelFamily, KernelParams};
use crate::likelihood::{profile, search_theta};

/// Diagonal jitter added to the correlation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NuggetPolicy {
    /// Nugget tried first.
    pub initial: f64,
    /// Multiplier applied after each failed factorization.
    pub growth: f64,
    /// Largest nugget before giving up with a singular-covariance error.
    pub max: f64,
}

impl Default for NuggetPolicy {
    fn default() -> Self {
        Self {
            initial: 1e-8,
            growth: 10.0,
            max: 1e-4,
        }
    }
}

impl NuggetPolicy {
    /// No jitter at all: any non-positive-definite matrix is an error.
    pub fn disabled() -> Self {
        Self {
            initial: 0.0,
            growth: 10.0,
            max: 0.0,
        }
    }

    pub fn validate(&self) -> GboResult<()> {
        let ok = self.initial.is_finite()
            && self.max.is_finite()
            && self.initial >= 0.0
            && self.max >= self.initial
            && self.growth > 1.0;
        if !ok {
            return Err(GboError::InvalidKernelParameter {
                parameter: "nugget".to_string(),
                value: self.initial,
                message: format!(
                    "nugget policy needs 0 <= initial <= max and growth > 1 (initial {}, max {}, growth {})",
                    self.initial, self.max, self.growth
                ),
            });
        }
        Ok(())
    }
}

/// Prior mean of the process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PriorMean {
    #[default]
    Zero,
    Constant { value: f64 },
    /// Generalized-least-squares constant fitted with the model.
    Estimated,
}

/// How correlation scales are chosen at each fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HyperparameterStrategy {
    Fixed { theta: Vec<f64> },
    MaximumLikelihood { restarts: usize, sweeps: usize },
}

impl Default for HyperparameterStrategy {
    fn default() -> Self {
        Self::MaximumLikelihood {
            restarts: 4,
            sweeps: 2,
        }
    }
}

/// Everything needed to fit a surrogate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GpConfig {
    #[serde(default)]
    pub kernel: KernelFamily,
    #[serde(default)]
    pub hyperparameters: HyperparameterStrategy,
    #[serde(default)]
    pub nugget: NuggetPolicy,
    #[serde(default)]
    pub prior_mean: PriorMean,
}

impl GpConfig {
    pub fn new(kernel: KernelFamily) -> Self {
        Self {
            kernel,
            ..Self::default()
        }
    }

    /// Validate against a problem of `dimension` inputs.
    pub fn validate(&self, dimension: usize) -> GboResult<()> {
        self.kernel.validate()?;
        self.nugget.validate()?;
        if let PriorMean::Constant { value } = self.prior_mean {
            if !value.is_finite() {
                return Err(GboError::InvalidConfig(format!(
                    "constant prior mean must be finite, got {value}"
                )));
            }
        }
        if let HyperparameterStrategy::Fixed { theta } = &self.hyperparameters {
            if theta.len() != dimension {
                return Err(GboError::DimensionMismatch {
                    expected: dimension,
                    actual: theta.len(),
                });
            }
            KernelParams::new(self.kernel, theta.clone())?;
        }
        Ok(())
    }
}

/// A fitted Gaussian process.
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    params: KernelParams,
    nugget: f64,
    prior_mean: f64,
    points: Vec<Vec<f64>>,
    cholesky: Cholesky<f64, Dyn>,
    /// `R⁻¹ (y - prior_mean)`.
    alpha: DVector<f64>,
    neg_log_likelihood: f64,
}

impl GaussianProcess {
    /// Fit a model, choosing correlation scales per `config`. The random
    /// source only drives likelihood restarts.
    pub fn fit<R: Rng + ?Sized>(
        observations: &ObservationSet,
        config: &GpConfig,
        rng: &mut R,
    ) -> GboResult<Self> {
        if observations.is_empty() {
            return Err(GboError::EmptySeed);
        }
        config.validate(observations.dimension())?;

        let theta = match &config.hyperparameters {
            HyperparameterStrategy::Fixed { theta } => theta.clone(),
            HyperparameterStrategy::MaximumLikelihood { restarts, sweeps } => {
                let points = owned_points(observations);
                let values = DVector::from_vec(observations.values());
                search_theta(
                    &points,
                    &values,
                    &config.kernel,
                    &config.nugget,
                    &config.prior_mean,
                    *restarts,
                    *sweeps,
                    rng,
                )?
            }
        };

        let params = KernelParams::new(config.kernel, theta)?;
        Self::fit_with_params(observations, &params, &config.nugget, &config.prior_mean)
    }

    /// Fit with fixed correlation family and scales. The process variance in
    /// `params` is ignored and re-estimated from the data.
    pub fn fit_with_params(
        observations: &ObservationSet,
        params: &KernelParams,
        nugget: &NuggetPolicy,
        prior_mean: &PriorMean,
    ) -> GboResult<Self> {
        if observations.is_empty() {
            return Err(GboError::EmptySeed);
        }
        params.validate()?;
        if params.dimension() != observations.dimension() {
            return Err(GboError::DimensionMismatch {
                expected: observations.dimension(),
                actual: params.dimension(),
            });
        }

        let points = owned_points(observations);
        let values = DVector::from_vec(observations.values());
        let fitted = profile(&points, &values, &params.family, &params.theta, nugget, prior_mean)?;

        if fitted.factor.nugget > nugget.initial {
            warn!(
                "Covariance over {} points needed nugget {:e} (initial {:e}); points may be nearly duplicated",
                points.len(),
                fitted.factor.nugget,
                nugget.initial
            );
        }
        debug!(
            "Fitted GP on {} points: theta {:?}, variance {:.4e}, mean {:.4}, nugget {:e}",
            points.len(),
            params.theta,
            fitted.variance,
            fitted.mean,
            fitted.factor.nugget
        );

        Ok(Self {
            params: KernelParams {
                family: params.family,
                theta: params.theta.clone(),
                variance: fitted.variance,
            },
            nugget: fitted.factor.nugget,
            prior_mean: fitted.mean,
            points,
            cholesky: fitted.factor.cholesky,
            alpha: fitted.alpha,
            neg_log_likelihood: fitted.neg_log_likelihood,
        })
    }

    /// Posterior mean and variance at each query point.
    pub fn predict<A: AsRef<[f64]>>(&self, queries: &[A]) -> GboResult<(Vec<f64>, Vec<f64>)> {
        let mut means = Vec::with_capacity(queries.len());
        let mut variances = Vec::with_capacity(queries.len());
        for query in queries {
            let query = query.as_ref();
            if query.len() != self.dimension() {
                return Err(GboError::DimensionMismatch {
                    expected: self.dimension(),
                    actual: query.len(),
                });
            }
            let (mean, variance) = self.predict_point(query);
            means.push(mean);
            variances.push(variance);
        }
        Ok((means, variances))
    }

    /// Posterior `(mean, variance)` at one point of the model's dimension.
    /// Variance is floored at zero.
    pub fn predict_point(&self, x: &[f64]) -> (f64, f64) {
        let family = &self.params.family;
        let theta = &self.params.theta;
        let r = DVector::from_fn(self.points.len(), |i, _| {
            family.correlation(x, &self.points[i], theta)
        });
        let mean = self.prior_mean + r.dot(&self.alpha);
        let reduction = r.dot(&self.cholesky.solve(&r));
        let variance = (self.params.variance * (1.0 - reduction)).max(0.0);
        (mean, variance)
    }

    pub fn params(&self) -> &KernelParams {
        &self.params
    }

    /// Nugget actually used by the factorization.
    pub fn nugget(&self) -> f64 {
        self.nugget
    }

    pub fn prior_mean(&self) -> f64 {
        self.prior_mean
    }

    pub fn neg_log_likelihood(&self) -> f64 {
        self.neg_log_likelihood
    }

    pub fn dimension(&self) -> usize {
        self.params.dimension()
    }
}

fn owned_points(observations: &ObservationSet) -> Vec<Vec<f64>> {
    observations.iter().map(|o| o.point.clone()).collect()
}
