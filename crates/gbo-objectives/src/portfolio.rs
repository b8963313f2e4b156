//! Constrained portfolio fitness.
//!
//! Scores a long-only weight vector by its Sharpe ratio
//! `(wᵀμ − r_f) / sqrt(wᵀΣw)`, minus a penalty proportional to how far the
//! weights stray from the feasible set (non-negative, summing to one).

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use gbo_types::{invalid_config, Bounds, Evaluation, GboError, GboResult, Objective, ObjectiveError};

/// How a decision vector maps onto portfolio weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeightEncoding {
    /// The optimizer proposes the first `n - 1` weights and the last one is
    /// `1 - Σ others`, so the sum is exactly one; a negative residual is
    /// penalized.
    #[default]
    Residual,
    /// The optimizer proposes all `n` weights; `|Σ w - 1|` is penalized.
    Full,
}

/// Inputs of the portfolio fitness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    pub assets: Vec<String>,
    /// Expected period return per asset.
    pub expected_returns: Vec<f64>,
    /// Row-major return covariance.
    pub covariance: Vec<Vec<f64>>,
    #[serde(default)]
    pub risk_free_rate: f64,
    #[serde(default = "default_penalty_weight")]
    pub penalty_weight: f64,
    #[serde(default)]
    pub encoding: WeightEncoding,
}

fn default_penalty_weight() -> f64 {
    100.0
}

impl PortfolioConfig {
    /// Three assets with annualized moments of a bond, a broad equity index
    /// and a single growth stock.
    pub fn three_asset_example() -> Self {
        Self {
            assets: vec!["bond".to_string(), "index".to_string(), "growth".to_string()],
            expected_returns: vec![0.04, 0.08, 0.14],
            covariance: vec![
                vec![0.0025, 0.0006, 0.0004],
                vec![0.0006, 0.0225, 0.0180],
                vec![0.0004, 0.0180, 0.0900],
            ],
            risk_free_rate: 0.02,
            penalty_weight: default_penalty_weight(),
            encoding: WeightEncoding::Residual,
        }
    }
}

/// Breakdown of one portfolio evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioMetrics {
    pub weights: Vec<f64>,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
    /// Total constraint violation before weighting.
    pub violation: f64,
    pub score: f64,
}

/// Penalized Sharpe-ratio objective over portfolio weights.
#[derive(Debug, Clone)]
pub struct SharpeObjective {
    assets: Vec<String>,
    returns: DVector<f64>,
    covariance: DMatrix<f64>,
    risk_free_rate: f64,
    penalty_weight: f64,
    encoding: WeightEncoding,
}

impl SharpeObjective {
    pub fn new(config: PortfolioConfig) -> GboResult<Self> {
        let n = config.assets.len();
        if n < 2 {
            return Err(invalid_config!("portfolio needs at least two assets, got {n}"));
        }
        if config.expected_returns.len() != n {
            return Err(GboError::DimensionMismatch {
                expected: n,
                actual: config.expected_returns.len(),
            });
        }
        if config.covariance.len() != n || config.covariance.iter().any(|row| row.len() != n) {
            return Err(invalid_config!("covariance must be a {n}x{n} matrix"));
        }
        if !config.risk_free_rate.is_finite() {
            return Err(invalid_config!("risk-free rate must be finite"));
        }
        if !config.penalty_weight.is_finite() || config.penalty_weight < 0.0 {
            return Err(invalid_config!(
                "penalty weight must be finite and non-negative, got {}",
                config.penalty_weight
            ));
        }

        let returns = DVector::from_vec(config.expected_returns);
        let covariance = DMatrix::from_fn(n, n, |i, j| config.covariance[i][j]);
        if returns.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
            return Err(invalid_config!("portfolio moments must be finite"));
        }
        if (&covariance - covariance.transpose()).abs().max() > 1e-12 {
            return Err(invalid_config!("covariance must be symmetric"));
        }
        if covariance.clone().cholesky().is_none() {
            return Err(invalid_config!("covariance must be positive-definite"));
        }

        Ok(Self {
            assets: config.assets,
            returns,
            covariance,
            risk_free_rate: config.risk_free_rate,
            penalty_weight: config.penalty_weight,
            encoding: config.encoding,
        })
    }

    /// Length of the decision vector the optimizer searches over.
    pub fn dimension(&self) -> usize {
        match self.encoding {
            WeightEncoding::Residual => self.assets.len() - 1,
            WeightEncoding::Full => self.assets.len(),
        }
    }

    /// `[0, 1]` per decision coordinate, named after its asset.
    pub fn bounds(&self) -> Bounds {
        self.assets
            .iter()
            .take(self.dimension())
            .fold(Bounds::new(), |bounds, asset| bounds.add_continuous(format!("w_{asset}"), 0.0, 1.0))
    }

    /// Portfolio weights encoded by a decision vector.
    pub fn weights(&self, point: &[f64]) -> Vec<f64> {
        let mut weights = point.to_vec();
        if self.encoding == WeightEncoding::Residual {
            weights.push(1.0 - point.iter().sum::<f64>());
        }
        weights
    }

    /// Evaluate a decision vector.
    pub fn metrics(&self, point: &[f64]) -> Result<PortfolioMetrics, ObjectiveError> {
        if point.len() != self.dimension() {
            return Err(ObjectiveError::failed(format!(
                "portfolio expects {} weights, got {}",
                self.dimension(),
                point.len()
            )));
        }
        let weights = self.weights(point);
        let w = DVector::from_column_slice(&weights);

        let expected_return = w.dot(&self.returns);
        let variance = w.dot(&(&self.covariance * &w));
        let volatility = variance.max(0.0).sqrt();
        let sharpe = if volatility > 0.0 {
            (expected_return - self.risk_free_rate) / volatility
        } else {
            0.0
        };

        let shortfall: f64 = weights.iter().map(|v| (-v).max(0.0)).sum();
        let violation = match self.encoding {
            WeightEncoding::Residual => shortfall,
            WeightEncoding::Full => shortfall + (w.sum() - 1.0).abs(),
        };
        let score = sharpe - self.penalty_weight * violation;

        Ok(PortfolioMetrics {
            weights,
            expected_return,
            volatility,
            sharpe,
            violation,
            score,
        })
    }
}

impl Objective for SharpeObjective {
    fn evaluate(&self, point: &[f64]) -> Result<Evaluation, ObjectiveError> {
        let metrics = self.metrics(point)?;
        if metrics.violation > 0.0 {
            debug!(
                "Infeasible weights {:?} (violation {:.4e})",
                metrics.weights, metrics.violation
            );
        }
        let mut evaluation = Evaluation::new(metrics.score)
            .with_aux("expected_return", metrics.expected_return)
            .with_aux("volatility", metrics.volatility)
            .with_aux("sharpe", metrics.sharpe)
            .with_aux("violation", metrics.violation);
        for (asset, weight) in self.assets.iter().zip(&metrics.weights) {
            evaluation = evaluation.with_aux(format!("weight.{asset}"), *weight);
        }
        Ok(evaluation)
    }

    fn name(&self) -> &str {
        "portfolio_sharpe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objective() -> SharpeObjective {
        SharpeObjective::new(PortfolioConfig::three_asset_example()).unwrap()
    }

    #[test]
    fn residual_weights_sum_to_one() {
        let objective = objective();
        assert_eq!(objective.dimension(), 2);
        let weights = objective.weights(&[0.2, 0.5]);
        assert_eq!(weights.len(), 3);
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((weights[2] - 0.3).abs() < 1e-12);
        let bounds = objective.bounds();
        let names: Vec<&str> = bounds.names().collect();
        assert_eq!(names, vec!["w_bond", "w_index"]);
    }

    #[test]
    fn quadratic_form_matches_double_sum() {
        let objective = objective();
        let m = objective.metrics(&[0.3, 0.3]).unwrap();
        let config = PortfolioConfig::three_asset_example();
        let mut variance = 0.0;
        for i in 0..3 {
            for j in 0..3 {
                variance += m.weights[i] * m.weights[j] * config.covariance[i][j];
            }
        }
        assert!((m.volatility - variance.sqrt()).abs() < 1e-12);
        let ret: f64 = m.weights.iter().zip(&config.expected_returns).map(|(w, r)| w * r).sum();
        assert!((m.expected_return - ret).abs() < 1e-12);
        assert!((m.sharpe - (ret - 0.02) / variance.sqrt()).abs() < 1e-12);
        assert_eq!(m.violation, 0.0);
        assert_eq!(m.score, m.sharpe);
    }

    #[test]
    fn infeasible_weights_are_penalized() {
        let objective = objective();
        let m = objective.metrics(&[0.8, 0.6]).unwrap();
        assert!((m.violation - 0.4).abs() < 1e-12);
        assert!((m.score - (m.sharpe - 40.0)).abs() < 1e-9);

        let feasible = objective.evaluate(&[0.5, 0.25]).unwrap();
        let infeasible = objective.evaluate(&[0.8, 0.6]).unwrap();
        assert!(feasible.score > infeasible.score);
        assert_eq!(feasible.aux["weight.growth"], 0.25);
    }

    #[test]
    fn full_encoding_penalizes_sum_deviation() {
        let mut config = PortfolioConfig::three_asset_example();
        config.encoding = WeightEncoding::Full;
        config.penalty_weight = 10.0;
        let objective = SharpeObjective::new(config).unwrap();
        assert_eq!(objective.dimension(), 3);
        let m = objective.metrics(&[0.5, 0.5, 0.5]).unwrap();
        assert!((m.violation - 0.5).abs() < 1e-12);
        assert!((m.score - (m.sharpe - 5.0)).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_inputs() {
        let mut config = PortfolioConfig::three_asset_example();
        config.covariance[0][1] = 0.5;
        assert!(SharpeObjective::new(config).is_err());

        let mut config = PortfolioConfig::three_asset_example();
        config.expected_returns.pop();
        assert!(matches!(
            SharpeObjective::new(config),
            Err(GboError::DimensionMismatch { expected: 3, actual: 2 })
        ));

        let mut config = PortfolioConfig::three_asset_example();
        config.covariance = vec![vec![1.0, 2.0, 0.0], vec![2.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]];
        assert!(SharpeObjective::new(config).is_err());

        assert!(objective().evaluate(&[0.5]).is_err());
    }

    #[test]
    fn parses_with_defaults() {
        let json = r#"{
            "assets": ["a", "b"],
            "expected_returns": [0.05, 0.1],
            "covariance": [[0.01, 0.0], [0.0, 0.04]]
        }"#;
        let config: PortfolioConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.penalty_weight, 100.0);
        assert_eq!(config.encoding, WeightEncoding::Residual);
        assert_eq!(config.risk_free_rate, 0.0);
    }
}
