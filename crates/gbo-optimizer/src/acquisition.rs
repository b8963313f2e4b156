//! Acquisition functions.
//!
//! All scores follow the maximization convention: larger is more worth
//! sampling, and `best` is the largest value observed so far. Minimization
//! runs negate observations before they reach this module.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use std::fmt;
use std::str::FromStr;

use gbo_types::{invalid_config, GboError};

const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Standard normal density.
pub fn norm_pdf(z: f64) -> f64 {
    INV_SQRT_2PI * (-0.5 * z * z).exp()
}

/// Standard normal distribution function.
pub fn norm_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// `(μ − best − ξ) Φ(Z) + σ φ(Z)` with `Z = (μ − best − ξ) / σ`; zero when
/// there is no posterior uncertainty.
pub fn expected_improvement(mean: f64, stddev: f64, best: f64, xi: f64) -> f64 {
    if !(stddev > 0.0) {
        return 0.0;
    }
    let improvement = mean - best - xi;
    let z = improvement / stddev;
    (improvement * norm_cdf(z) + stddev * norm_pdf(z)).max(0.0)
}

/// `μ + κ σ`.
pub fn upper_confidence_bound(mean: f64, stddev: f64, kappa: f64) -> f64 {
    mean + kappa * stddev
}

/// `Φ((μ − best − ξ) / σ)`; zero when there is no posterior uncertainty.
pub fn probability_of_improvement(mean: f64, stddev: f64, best: f64, xi: f64) -> f64 {
    if !(stddev > 0.0) {
        return 0.0;
    }
    norm_cdf((mean - best - xi) / stddev)
}

/// Which acquisition function drives candidate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionKind {
    #[default]
    #[serde(alias = "ei")]
    ExpectedImprovement,
    #[serde(alias = "ucb")]
    UpperConfidenceBound,
    #[serde(alias = "poi")]
    ProbabilityOfImprovement,
}

impl FromStr for AcquisitionKind {
    type Err = GboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ei" | "expected_improvement" => Ok(Self::ExpectedImprovement),
            "ucb" | "upper_confidence_bound" => Ok(Self::UpperConfidenceBound),
            "poi" | "pi" | "probability_of_improvement" => Ok(Self::ProbabilityOfImprovement),
            other => Err(invalid_config!(
                "unknown acquisition mode {other:?} (expected ei, ucb or poi)"
            )),
        }
    }
}

impl fmt::Display for AcquisitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExpectedImprovement => "ei",
            Self::UpperConfidenceBound => "ucb",
            Self::ProbabilityOfImprovement => "poi",
        };
        f.write_str(name)
    }
}

/// A resolved acquisition function with its exploration parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Acquisition {
    ExpectedImprovement { xi: f64 },
    UpperConfidenceBound { kappa: f64 },
    ProbabilityOfImprovement { xi: f64 },
}

impl Acquisition {
    pub fn from_kind(kind: AcquisitionKind, kappa: f64, xi: f64) -> Self {
        match kind {
            AcquisitionKind::ExpectedImprovement => Self::ExpectedImprovement { xi },
            AcquisitionKind::UpperConfidenceBound => Self::UpperConfidenceBound { kappa },
            AcquisitionKind::ProbabilityOfImprovement => Self::ProbabilityOfImprovement { xi },
        }
    }

    /// Score one point from its posterior mean and standard deviation.
    pub fn score(&self, mean: f64, stddev: f64, best: f64) -> f64 {
        match *self {
            Self::ExpectedImprovement { xi } => expected_improvement(mean, stddev, best, xi),
            Self::UpperConfidenceBound { kappa } => upper_confidence_bound(mean, stddev, kappa),
            Self::ProbabilityOfImprovement { xi } => {
                probability_of_improvement(mean, stddev, best, xi)
            }
        }
    }

    /// Score many points in parallel; output order matches input order.
    pub fn score_batch(&self, means: &[f64], stddevs: &[f64], best: f64) -> Vec<f64> {
        means
            .par_iter()
            .zip(stddevs.par_iter())
            .map(|(&mean, &stddev)| self.score(mean, stddev, best))
            .collect()
    }
}

/// Index and value of the strictly largest score; the first one wins ties
/// and NaN scores are skipped.
pub fn select_best(scores: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if score <= current => {}
            _ => best = Some((i, score)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_helpers() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((norm_cdf(1.959_963_985) - 0.975).abs() < 1e-7);
        assert!((norm_cdf(-1.0) + norm_cdf(1.0) - 1.0).abs() < 1e-12);
        assert!((norm_pdf(0.0) - INV_SQRT_2PI).abs() < 1e-15);
    }

    #[test]
    fn ei_is_zero_without_uncertainty() {
        for (mean, best) in [(10.0, 0.0), (-3.0, 5.0), (0.0, 0.0)] {
            assert_eq!(expected_improvement(mean, 0.0, best, 0.01), 0.0);
            assert_eq!(probability_of_improvement(mean, 0.0, best, 0.01), 0.0);
        }
    }

    #[test]
    fn ei_matches_closed_form() {
        // mean == best + xi gives Z = 0, so EI = σ φ(0).
        let ei = expected_improvement(1.01, 2.0, 1.0, 0.01);
        assert!((ei - 2.0 * INV_SQRT_2PI).abs() < 1e-12);
        // Far above the incumbent EI approaches the plain improvement.
        let ei = expected_improvement(10.0, 0.01, 0.0, 0.0);
        assert!((ei - 10.0).abs() < 1e-9);
        assert!(expected_improvement(-10.0, 0.5, 0.0, 0.0) >= 0.0);
    }

    #[test]
    fn larger_xi_prefers_uncertain_points() {
        // Point A: high mean, low uncertainty. Point B: lower mean, high uncertainty.
        let (mean_a, std_a) = (1.05, 0.01);
        let (mean_b, std_b) = (0.9, 0.5);
        let best = 1.0;
        let ratio = |xi: f64| {
            let acquisition = Acquisition::ExpectedImprovement { xi };
            acquisition.score(mean_b, std_b, best) / acquisition.score(mean_a, std_a, best)
        };
        assert!(ratio(0.1) > ratio(0.0));
    }

    #[test]
    fn ucb_monotone_in_kappa() {
        let mut previous = f64::NEG_INFINITY;
        for k in 0..20 {
            let kappa = k as f64 * 0.5;
            let score = upper_confidence_bound(0.3, 0.7, kappa);
            assert!(score >= previous);
            previous = score;
        }
    }

    #[test]
    fn select_best_breaks_ties_by_order() {
        assert_eq!(select_best(&[0.1, 0.5, 0.5, 0.2]), Some((1, 0.5)));
        assert_eq!(select_best(&[f64::NAN, 0.0, 0.0]), Some((1, 0.0)));
        assert_eq!(select_best(&[]), None);
        assert_eq!(select_best(&[f64::NAN]), None);
    }

    #[test]
    fn batch_scoring_preserves_order() {
        let acquisition = Acquisition::UpperConfidenceBound { kappa: 2.0 };
        let means = [0.0, 1.0, 2.0, 3.0];
        let stds = [1.0, 0.0, 0.5, 0.25];
        let scores = acquisition.score_batch(&means, &stds, 0.0);
        assert_eq!(scores, vec![2.0, 1.0, 3.0, 3.5]);
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("ei".parse::<AcquisitionKind>().unwrap(), AcquisitionKind::ExpectedImprovement);
        assert_eq!(" UCB ".parse::<AcquisitionKind>().unwrap(), AcquisitionKind::UpperConfidenceBound);
        assert_eq!("poi".parse::<AcquisitionKind>().unwrap(), AcquisitionKind::ProbabilityOfImprovement);
        assert!(matches!(
            "thompson".parse::<AcquisitionKind>(),
            Err(GboError::InvalidConfig(_))
        ));
        let kind: AcquisitionKind = serde_json::from_str(r#""ucb""#).unwrap();
        assert_eq!(kind, AcquisitionKind::UpperConfidenceBound);
        assert_eq!(kind.to_string(), "ucb");
    }

    #[test]
    fn from_kind_carries_parameters() {
        assert_eq!(
            Acquisition::from_kind(AcquisitionKind::UpperConfidenceBound, 2.576, 0.01),
            Acquisition::UpperConfidenceBound { kappa: 2.576 }
        );
        assert_eq!(
            Acquisition::from_kind(AcquisitionKind::ExpectedImprovement, 2.576, 0.01),
            Acquisition::ExpectedImprovement { xi: 0.01 }
        );
    }
}
