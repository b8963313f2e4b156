//! Concentrated likelihood and the hyperparameter search built on it.
//!
//! For fixed correlation scales the prior mean and the process variance have
//! closed forms, leaving `n ln σ̂² + ln |R|` to minimize over `log10 θ`.

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};
use rand::Rng;
use tracing::debug;

use gbo_types::{GboError, GboResult};

use crate::gp::{NuggetPolicy, PriorMean};
use crate::kernel::{correlation_matrix, KernelFamily};

/// Search box for `log10 θ` in unit-cube coordinates.
pub const LOG_THETA_MIN: f64 = -3.0;
pub const LOG_THETA_MAX: f64 = 3.0;

/// Smallest process variance a profile may report.
const VARIANCE_FLOOR: f64 = 1e-12;

const GOLDEN_ITERATIONS: usize = 24;
const INV_PHI: f64 = 0.618_033_988_749_894_8;

pub(crate) struct Factorization {
    pub cholesky: Cholesky<f64, Dyn>,
    pub nugget: f64,
}

/// Cholesky-factorize `corr + δI`, growing `δ` per `policy` until the matrix
/// is positive-definite.
pub(crate) fn factorize(corr: &DMatrix<f64>, policy: &NuggetPolicy) -> GboResult<Factorization> {
    let n = corr.nrows();
    if corr.iter().any(|v| !v.is_finite()) {
        return Err(GboError::SingularCovariance {
            points: n,
            nugget: policy.initial,
        });
    }

    let mut nugget = policy.initial;
    loop {
        let mut matrix = corr.clone();
        for i in 0..n {
            matrix[(i, i)] += nugget;
        }
        if let Some(cholesky) = Cholesky::new(matrix) {
            if cholesky.l_dirty().diagonal().iter().all(|d| d.is_finite() && *d > 0.0) {
                return Ok(Factorization { cholesky, nugget });
            }
        }
        if nugget >= policy.max {
            return Err(GboError::SingularCovariance { points: n, nugget });
        }
        let next = if nugget > 0.0 {
            nugget * policy.growth
        } else {
            policy.max.min(1e-12)
        };
        debug!("Cholesky failed with nugget {:e}, retrying with {:e}", nugget, next.min(policy.max));
        nugget = next.min(policy.max);
    }
}

/// Closed-form quantities for one choice of `θ`.
pub(crate) struct Profile {
    pub factor: Factorization,
    pub mean: f64,
    /// `R⁻¹ (y - mean)`.
    pub alpha: DVector<f64>,
    pub variance: f64,
    pub neg_log_likelihood: f64,
}

pub(crate) fn profile(
    points: &[Vec<f64>],
    values: &DVector<f64>,
    family: &KernelFamily,
    theta: &[f64],
    policy: &NuggetPolicy,
    prior: &PriorMean,
) -> GboResult<Profile> {
    let n = points.len();
    let corr = correlation_matrix(points, family, theta);
    let factor = factorize(&corr, policy)?;

    let (mean, alpha) = match *prior {
        PriorMean::Zero => (0.0, factor.cholesky.solve(values)),
        PriorMean::Constant { value } => {
            let centered = values.map(|y| y - value);
            (value, factor.cholesky.solve(&centered))
        }
        PriorMean::Estimated => {
            let ones = DVector::from_element(n, 1.0);
            let r_inv_ones = factor.cholesky.solve(&ones);
            let r_inv_y = factor.cholesky.solve(values);
            let denom = ones.dot(&r_inv_ones);
            let mean = if denom.abs() > f64::EPSILON {
                ones.dot(&r_inv_y) / denom
            } else {
                values.mean()
            };
            (mean, r_inv_y - r_inv_ones * mean)
        }
    };

    let centered = values.map(|y| y - mean);
    let variance = (centered.dot(&alpha) / n as f64).max(VARIANCE_FLOOR);
    let log_det: f64 = factor
        .cholesky
        .l_dirty()
        .diagonal()
        .iter()
        .map(|d| d.ln())
        .sum::<f64>()
        * 2.0;
    let neg_log_likelihood = n as f64 * variance.ln() + log_det;

    Ok(Profile {
        factor,
        mean,
        alpha,
        variance,
        neg_log_likelihood,
    })
}

/// Maximum-likelihood scales: best of a shared-θ grid and `restarts` seeded
/// random starts, then `sweeps` rounds of per-coordinate golden-section search.
pub(crate) fn search_theta<R: Rng + ?Sized>(
    points: &[Vec<f64>],
    values: &DVector<f64>,
    family: &KernelFamily,
    policy: &NuggetPolicy,
    prior: &PriorMean,
    restarts: usize,
    sweeps: usize,
    rng: &mut R,
) -> GboResult<Vec<f64>> {
    let dim = points.first().map(Vec::len).unwrap_or(0);
    let objective = |log_theta: &[f64]| -> f64 {
        let theta: Vec<f64> = log_theta.iter().map(|v| 10f64.powf(*v)).collect();
        match profile(points, values, family, &theta, policy, prior) {
            Ok(p) if p.neg_log_likelihood.is_finite() => p.neg_log_likelihood,
            _ => f64::INFINITY,
        }
    };

    let mut starts: Vec<Vec<f64>> = (0..=12)
        .map(|k| vec![LOG_THETA_MIN + 0.5 * k as f64; dim])
        .collect();
    for _ in 0..restarts {
        starts.push(
            (0..dim)
                .map(|_| rng.gen_range(LOG_THETA_MIN..=LOG_THETA_MAX))
                .collect(),
        );
    }

    let mut best = vec![0.0; dim];
    let mut best_value = f64::INFINITY;
    for start in starts {
        let value = objective(&start);
        if value < best_value {
            best_value = value;
            best = start;
        }
    }
    if !best_value.is_finite() {
        return Err(GboError::SingularCovariance {
            points: points.len(),
            nugget: policy.max,
        });
    }

    for _ in 0..sweeps {
        for d in 0..dim {
            let mut trial = best.clone();
            let (x, value) = golden_section(
                |t| {
                    trial[d] = t;
                    objective(&trial)
                },
                LOG_THETA_MIN,
                LOG_THETA_MAX,
            );
            if value < best_value {
                best[d] = x;
                best_value = value;
            }
        }
    }

    debug!(
        "Likelihood search selected log10 theta {:?} (nll {:.4})",
        best, best_value
    );
    Ok(best.iter().map(|v| 10f64.powf(*v)).collect())
}

/// Minimize a one-dimensional function on `[lo, hi]`.
fn golden_section(mut f: impl FnMut(f64) -> f64, mut lo: f64, mut hi: f64) -> (f64, f64) {
    let mut c = hi - INV_PHI * (hi - lo);
    let mut d = lo + INV_PHI * (hi - lo);
    let mut fc = f(c);
    let mut fd = f(d);
    for _ in 0..GOLDEN_ITERATIONS {
        if fc <= fd {
            hi = d;
            d = c;
            fd = fc;
            c = hi - INV_PHI * (hi - lo);
            fc = f(c);
        } else {
            lo = c;
            c = d;
            fc = fd;
            d = lo + INV_PHI * (hi - lo);
            fd = f(d);
        }
    }
    if fc <= fd {
        (c, fc)
    } else {
        (d, fd)
    }
}
