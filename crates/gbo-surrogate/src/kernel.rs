//! Correlation families and covariance evaluation.
//!
//! Both families are stationary and separable in the scaled distance:
//!
//! - power exponential: `exp(-Σ_d θ_d |x_d - x'_d|^p)`, `p ∈ (0, 2]`
//! - Matérn: closed forms for `ν ∈ {1/2, 3/2, 5/2}` on
//!   `r = sqrt(Σ_d θ_d (x_d - x'_d)²)`
//!
//! Covariance is the process variance times the correlation.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use gbo_types::{GboError, GboResult};

const SQRT_3: f64 = 1.732_050_807_568_877_2;
const SQRT_5: f64 = 2.236_067_977_499_79;

/// Smoothness values with a closed-form Matérn correlation.
pub const MATERN_SMOOTHNESS: [f64; 3] = [0.5, 1.5, 2.5];

/// Correlation family with its shape parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelFamily {
    PowerExponential { power: f64 },
    Matern { nu: f64 },
}

impl Default for KernelFamily {
    fn default() -> Self {
        Self::PowerExponential { power: 2.0 }
    }
}

impl KernelFamily {
    /// Reject shape parameters outside the family's legal range.
    pub fn validate(&self) -> GboResult<()> {
        match *self {
            Self::PowerExponential { power } => {
                if !(power > 0.0 && power <= 2.0) {
                    return Err(GboError::InvalidKernelParameter {
                        parameter: "power".to_string(),
                        value: power,
                        message: "power exponential requires 0 < power <= 2".to_string(),
                    });
                }
            }
            Self::Matern { nu } => {
                if !MATERN_SMOOTHNESS.iter().any(|&legal| (nu - legal).abs() < 1e-12) {
                    return Err(GboError::InvalidKernelParameter {
                        parameter: "nu".to_string(),
                        value: nu,
                        message: "matern smoothness must be one of 0.5, 1.5, 2.5".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Correlation between two points under per-dimension scales `theta`.
    pub fn correlation(&self, a: &[f64], b: &[f64], theta: &[f64]) -> f64 {
        match *self {
            Self::PowerExponential { power } => {
                let exponent: f64 = a
                    .iter()
                    .zip(b)
                    .zip(theta)
                    .map(|((x, y), t)| t * (x - y).abs().powf(power))
                    .sum();
                (-exponent).exp()
            }
            Self::Matern { nu } => {
                let r_sq: f64 = a
                    .iter()
                    .zip(b)
                    .zip(theta)
                    .map(|((x, y), t)| t * (x - y) * (x - y))
                    .sum();
                let r = r_sq.sqrt();
                if nu < 1.0 {
                    (-r).exp()
                } else if nu < 2.0 {
                    let s = SQRT_3 * r;
                    (1.0 + s) * (-s).exp()
                } else {
                    let s = SQRT_5 * r;
                    (1.0 + s + 5.0 / 3.0 * r_sq) * (-s).exp()
                }
            }
        }
    }
}

/// Fitted kernel hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelParams {
    pub family: KernelFamily,
    /// Per-dimension inverse length scales, all strictly positive.
    pub theta: Vec<f64>,
    /// Process variance scaling the correlation.
    pub variance: f64,
}

impl KernelParams {
    /// Unit-variance parameters, validated.
    pub fn new(family: KernelFamily, theta: Vec<f64>) -> GboResult<Self> {
        let params = Self {
            family,
            theta,
            variance: 1.0,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_variance(mut self, variance: f64) -> GboResult<Self> {
        self.variance = variance;
        self.validate()?;
        Ok(self)
    }

    pub fn dimension(&self) -> usize {
        self.theta.len()
    }

    pub fn validate(&self) -> GboResult<()> {
        self.family.validate()?;
        if self.theta.is_empty() {
            return Err(GboError::InvalidKernelParameter {
                parameter: "theta".to_string(),
                value: f64::NAN,
                message: "at least one scale parameter is required".to_string(),
            });
        }
        if let Some(&bad) = self.theta.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
            return Err(GboError::InvalidKernelParameter {
                parameter: "theta".to_string(),
                value: bad,
                message: "scale parameters must be finite and positive".to_string(),
            });
        }
        if !(self.variance.is_finite() && self.variance > 0.0) {
            return Err(GboError::InvalidKernelParameter {
                parameter: "variance".to_string(),
                value: self.variance,
                message: "process variance must be finite and positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Covariance between two points.
pub fn covariance(a: &[f64], b: &[f64], params: &KernelParams) -> f64 {
    params.variance * params.family.correlation(a, b, &params.theta)
}

/// Covariance matrix with entry `(i, j) = covariance(x1[i], x2[j])`.
pub fn covariance_matrix<A, B>(x1: &[A], x2: &[B], params: &KernelParams) -> DMatrix<f64>
where
    A: AsRef<[f64]>,
    B: AsRef<[f64]>,
{
    DMatrix::from_fn(x1.len(), x2.len(), |i, j| {
        covariance(x1[i].as_ref(), x2[j].as_ref(), params)
    })
}

/// Correlation matrix of a point set with itself (unit diagonal, symmetric).
pub(crate) fn correlation_matrix<A: AsRef<[f64]>>(
    points: &[A],
    family: &KernelFamily,
    theta: &[f64],
) -> DMatrix<f64> {
    let n = points.len();
    let mut matrix = DMatrix::identity(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            let c = family.correlation(points[i].as_ref(), points[j].as_ref(), theta);
            matrix[(i, j)] = c;
            matrix[(j, i)] = c;
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::SymmetricEigen;

    fn families() -> Vec<KernelFamily> {
        vec![
            KernelFamily::PowerExponential { power: 2.0 },
            KernelFamily::PowerExponential { power: 1.0 },
            KernelFamily::PowerExponential { power: 0.5 },
            KernelFamily::Matern { nu: 0.5 },
            KernelFamily::Matern { nu: 1.5 },
            KernelFamily::Matern { nu: 2.5 },
        ]
    }

    fn sample_points() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, 0.9],
            vec![0.5, 0.5],
            vec![0.8, 0.2],
            vec![1.0, 1.0],
            vec![0.33, 0.66],
        ]
    }

    #[test]
    fn power_validation() {
        assert!(KernelFamily::PowerExponential { power: 2.0 }.validate().is_ok());
        assert!(KernelFamily::PowerExponential { power: 1.95 }.validate().is_ok());
        for bad in [0.0, -1.0, 2.0001, f64::NAN] {
            assert!(matches!(
                KernelFamily::PowerExponential { power: bad }.validate(),
                Err(GboError::InvalidKernelParameter { .. })
            ));
        }
    }

    #[test]
    fn matern_validation() {
        for nu in MATERN_SMOOTHNESS {
            assert!(KernelFamily::Matern { nu }.validate().is_ok());
        }
        assert!(matches!(
            KernelFamily::Matern { nu: 2.0 }.validate(),
            Err(GboError::InvalidKernelParameter { ref parameter, .. }) if parameter == "nu"
        ));
    }

    #[test]
    fn theta_validation() {
        let family = KernelFamily::default();
        assert!(KernelParams::new(family, vec![1.0, 2.0]).is_ok());
        assert!(KernelParams::new(family, vec![]).is_err());
        assert!(KernelParams::new(family, vec![1.0, 0.0]).is_err());
        assert!(KernelParams::new(family, vec![1.0])
            .unwrap()
            .with_variance(-1.0)
            .is_err());
    }

    #[test]
    fn correlation_is_one_at_zero_distance_and_decays() {
        let theta = [3.0, 3.0];
        for family in families() {
            let at_zero = family.correlation(&[0.2, 0.4], &[0.2, 0.4], &theta);
            assert!((at_zero - 1.0).abs() < 1e-12, "{family:?}");
            let near = family.correlation(&[0.0, 0.0], &[0.1, 0.0], &theta);
            let far = family.correlation(&[0.0, 0.0], &[0.6, 0.0], &theta);
            assert!(near > far && far > 0.0, "{family:?}: {near} vs {far}");
        }
    }

    #[test]
    fn power_exponential_closed_form() {
        let family = KernelFamily::PowerExponential { power: 2.0 };
        let c = family.correlation(&[0.0, 1.0], &[0.5, 0.0], &[2.0, 0.5]);
        let expected = (-(2.0 * 0.25 + 0.5 * 1.0_f64)).exp();
        assert!((c - expected).abs() < 1e-12);
    }

    #[test]
    fn covariance_scales_with_variance() {
        let params = KernelParams::new(KernelFamily::Matern { nu: 2.5 }, vec![4.0])
            .unwrap()
            .with_variance(3.0)
            .unwrap();
        assert!((covariance(&[0.3], &[0.3], &params) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn covariance_matrix_symmetric_and_psd() {
        let points = sample_points();
        for family in families() {
            let params = KernelParams::new(family, vec![5.0, 2.0]).unwrap();
            let k = covariance_matrix(&points, &points, &params);
            assert_eq!(k.shape(), (6, 6));
            for i in 0..6 {
                for j in 0..6 {
                    assert!((k[(i, j)] - k[(j, i)]).abs() < 1e-14);
                }
            }
            let eigen = SymmetricEigen::new(k);
            let min = eigen.eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min);
            assert!(min > -1e-10, "{family:?} min eigenvalue {min}");
        }
    }

    #[test]
    fn correlation_matrix_matches_covariance_matrix() {
        let points = sample_points();
        let family = KernelFamily::Matern { nu: 1.5 };
        let params = KernelParams::new(family, vec![1.0, 1.0]).unwrap();
        let corr = correlation_matrix(&points, &family, &params.theta);
        let cov = covariance_matrix(&points, &points, &params);
        assert!((corr - cov).abs().max() < 1e-12);
    }

    #[test]
    fn rectangular_covariance_matrix() {
        let params = KernelParams::new(KernelFamily::default(), vec![1.0]).unwrap();
        let k = covariance_matrix(&[vec![0.0], vec![1.0]], &[vec![0.0], vec![0.5], vec![1.0]], &params);
        assert_eq!(k.shape(), (2, 3));
        assert!((k[(1, 2)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn family_serde_tagging() {
        let json = serde_json::to_string(&KernelFamily::Matern { nu: 2.5 }).unwrap();
        assert_eq!(json, r#"{"type":"matern","nu":2.5}"#);
        let back: KernelFamily =
            serde_json::from_str(r#"{"type":"power_exponential","power":1.95}"#).unwrap();
        assert_eq!(back, KernelFamily::PowerExponential { power: 1.95 });
    }
}
