//! Candidate generation and acquisition maximization.
//!
//! Candidates live in the unit cube the surrogate is fitted in. Each one is
//! snapped through the bounds (integer dimensions round) before scoring so
//! the surrogate sees exactly the point that would be evaluated.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use gbo_surrogate::GaussianProcess;
use gbo_types::{invalid_config, Bounds, GboError, GboResult};

use crate::acquisition::{select_best, Acquisition};

/// Largest dense grid we are willing to score per iteration.
pub const MAX_GRID_POINTS: usize = 1_000_000;

const REFINE_INITIAL_STEP: f64 = 0.1;
const REFINE_MIN_STEP: f64 = 1e-4;

/// How the acquisition function is maximized over the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CandidateStrategy {
    /// Dense grid with `points_per_dim` evenly spaced values per dimension,
    /// endpoints included.
    Grid { points_per_dim: usize },
    /// Uniform random candidates from the run's seeded generator.
    Random { count: usize },
    /// Random candidates followed by a compass search on the acquisition
    /// surface from the best of them.
    RandomRefined {
        count: usize,
        refine_iterations: usize,
    },
}

impl Default for CandidateStrategy {
    fn default() -> Self {
        Self::RandomRefined {
            count: 1000,
            refine_iterations: 50,
        }
    }
}

impl CandidateStrategy {
    pub fn validate(&self, dimension: usize) -> GboResult<()> {
        match *self {
            Self::Grid { points_per_dim } => {
                if points_per_dim == 0 {
                    return Err(invalid_config!("grid needs at least one point per dimension"));
                }
                let total = u32::try_from(dimension)
                    .ok()
                    .and_then(|d| points_per_dim.checked_pow(d));
                match total {
                    Some(total) if total <= MAX_GRID_POINTS => Ok(()),
                    _ => Err(invalid_config!(
                        "grid of {points_per_dim}^{dimension} points exceeds the limit of {MAX_GRID_POINTS}"
                    )),
                }
            }
            Self::Random { count } | Self::RandomRefined { count, .. } => {
                if count == 0 {
                    return Err(invalid_config!("random candidate count must be positive"));
                }
                Ok(())
            }
        }
    }

    /// Unit-cube candidates, in a deterministic order.
    pub fn generate<R: Rng + ?Sized>(&self, dimension: usize, rng: &mut R) -> Vec<Vec<f64>> {
        match *self {
            Self::Grid { points_per_dim } => unit_grid(dimension, points_per_dim),
            Self::Random { count } | Self::RandomRefined { count, .. } => (0..count)
                .map(|_| (0..dimension).map(|_| rng.gen::<f64>()).collect())
                .collect(),
        }
    }

    fn refine_iterations(&self) -> usize {
        match *self {
            Self::RandomRefined {
                refine_iterations, ..
            } => refine_iterations,
            _ => 0,
        }
    }
}

/// Evenly spaced cartesian grid on `[0, 1]^dimension`; the first dimension
/// varies slowest.
pub fn unit_grid(dimension: usize, points_per_dim: usize) -> Vec<Vec<f64>> {
    let axis: Vec<f64> = if points_per_dim <= 1 {
        vec![0.5]
    } else {
        (0..points_per_dim)
            .map(|i| i as f64 / (points_per_dim - 1) as f64)
            .collect()
    };

    let mut result: Vec<Vec<f64>> = vec![Vec::with_capacity(dimension)];
    for _ in 0..dimension {
        let mut next = Vec::with_capacity(result.len() * axis.len());
        for existing in &result {
            for &value in &axis {
                let mut point = existing.clone();
                point.push(value);
                next.push(point);
            }
        }
        result = next;
    }
    result
}

/// The winning candidate of one acquisition round.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Point in the caller's coordinates, inside the bounds.
    pub point: Vec<f64>,
    /// The same point in the unit cube.
    pub unit_point: Vec<f64>,
    pub score: f64,
    pub mean: f64,
    pub variance: f64,
}

/// Finds the candidate with the strictly largest acquisition score.
///
/// `gp` must be fitted on unit-cube points and `best` given on the same
/// (maximization) scale as its observations.
pub struct AcquisitionMaximizer<'a> {
    pub gp: &'a GaussianProcess,
    pub acquisition: Acquisition,
    pub best: f64,
    pub bounds: &'a Bounds,
}

impl AcquisitionMaximizer<'_> {
    fn snap(&self, unit: &[f64]) -> Vec<f64> {
        let clamped: Vec<f64> = unit.iter().map(|u| u.clamp(0.0, 1.0)).collect();
        self.bounds.to_unit(&self.bounds.from_unit(&clamped))
    }

    fn score(&self, unit: &[f64]) -> f64 {
        let (mean, variance) = self.gp.predict_point(unit);
        self.acquisition.score(mean, variance.sqrt(), self.best)
    }

    /// Score `candidates` in parallel and return the arg-max.
    pub fn select_from(&self, candidates: &[Vec<f64>]) -> GboResult<Selection> {
        let snapped: Vec<Vec<f64>> = candidates.par_iter().map(|c| self.snap(c)).collect();
        let (means, stddevs): (Vec<f64>, Vec<f64>) = snapped
            .par_iter()
            .map(|u| {
                let (mean, variance) = self.gp.predict_point(u);
                (mean, variance.sqrt())
            })
            .unzip();
        let scores = self.acquisition.score_batch(&means, &stddevs, self.best);
        let (index, _) = select_best(&scores).ok_or(GboError::DegenerateAcquisition {
            candidates: candidates.len(),
        })?;
        self.finish(snapped[index].clone())
    }

    /// Generate candidates per `strategy`, pick the best, optionally refine.
    pub fn maximize<R: Rng + ?Sized>(
        &self,
        strategy: &CandidateStrategy,
        rng: &mut R,
    ) -> GboResult<Selection> {
        let candidates = strategy.generate(self.bounds.len(), rng);
        let start = self.select_from(&candidates)?;
        let iterations = strategy.refine_iterations();
        if iterations == 0 {
            return Ok(start);
        }
        let refined = self.compass_search(start.unit_point.clone(), start.score, iterations);
        if refined.1 > start.score {
            debug!(
                "Compass search improved acquisition {:.6e} -> {:.6e}",
                start.score, refined.1
            );
            self.finish(refined.0)
        } else {
            Ok(start)
        }
    }

    fn compass_search(&self, mut point: Vec<f64>, mut score: f64, iterations: usize) -> (Vec<f64>, f64) {
        let mut step = REFINE_INITIAL_STEP;
        for _ in 0..iterations {
            let mut improved = false;
            'directions: for d in 0..point.len() {
                for sign in [1.0, -1.0] {
                    let mut neighbor = point.clone();
                    neighbor[d] += sign * step;
                    let neighbor = self.snap(&neighbor);
                    let value = self.score(&neighbor);
                    if value > score {
                        point = neighbor;
                        score = value;
                        improved = true;
                        break 'directions;
                    }
                }
            }
            if !improved {
                step *= 0.5;
                if step < REFINE_MIN_STEP {
                    break;
                }
            }
        }
        (point, score)
    }

    fn finish(&self, unit_point: Vec<f64>) -> GboResult<Selection> {
        let point = self.bounds.from_unit(&unit_point);
        self.bounds.check_point(&point)?;
        let (mean, variance) = self.gp.predict_point(&unit_point);
        let score = self.acquisition.score(mean, variance.sqrt(), self.best);
        Ok(Selection {
            point,
            unit_point,
            score,
            mean,
            variance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbo_surrogate::{KernelFamily, KernelParams, NuggetPolicy, PriorMean};
    use gbo_types::ObservationSet;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fitted_gp() -> GaussianProcess {
        let points = vec![vec![0.1], vec![0.4], vec![0.9]];
        let values = vec![0.2, 1.0, -0.5];
        let obs = ObservationSet::from_pairs(1, &points, &values).unwrap();
        let params = KernelParams::new(KernelFamily::Matern { nu: 2.5 }, vec![30.0]).unwrap();
        GaussianProcess::fit_with_params(&obs, &params, &NuggetPolicy::default(), &PriorMean::Zero)
            .unwrap()
    }

    #[test]
    fn unit_grid_shape_and_order() {
        let grid = unit_grid(2, 3);
        assert_eq!(grid.len(), 9);
        assert_eq!(grid[0], vec![0.0, 0.0]);
        assert_eq!(grid[1], vec![0.0, 0.5]);
        assert_eq!(grid[8], vec![1.0, 1.0]);
        assert_eq!(unit_grid(1, 1), vec![vec![0.5]]);
    }

    #[test]
    fn strategy_validation() {
        assert!(CandidateStrategy::Grid { points_per_dim: 100 }.validate(2).is_ok());
        assert!(CandidateStrategy::Grid { points_per_dim: 100 }.validate(4).is_err());
        assert!(CandidateStrategy::Grid { points_per_dim: 0 }.validate(1).is_err());
        assert!(CandidateStrategy::Random { count: 0 }.validate(1).is_err());
        assert!(CandidateStrategy::default().validate(5).is_ok());
    }

    #[test]
    fn random_candidates_are_seeded() {
        let strategy = CandidateStrategy::Random { count: 10 };
        let a = strategy.generate(3, &mut ChaCha8Rng::seed_from_u64(1));
        let b = strategy.generate(3, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(a, b);
        assert!(a.iter().flatten().all(|u| (0.0..1.0).contains(u)));
    }

    #[test]
    fn grid_selection_stays_in_bounds() {
        let gp = fitted_gp();
        let bounds = Bounds::new().add_continuous("x", -2.0, 2.0);
        let maximizer = AcquisitionMaximizer {
            gp: &gp,
            acquisition: Acquisition::UpperConfidenceBound { kappa: 2.0 },
            best: 1.0,
            bounds: &bounds,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let selection = maximizer
            .maximize(&CandidateStrategy::Grid { points_per_dim: 51 }, &mut rng)
            .unwrap();
        assert!(bounds.contains(&selection.point));
        assert!(selection.score.is_finite());
        assert!((selection.point[0] - (-2.0 + 4.0 * selection.unit_point[0])).abs() < 1e-12);
    }

    #[test]
    fn refinement_never_worsens_the_score() {
        let gp = fitted_gp();
        let bounds = Bounds::new().add_continuous("x", 0.0, 1.0);
        let maximizer = AcquisitionMaximizer {
            gp: &gp,
            acquisition: Acquisition::ExpectedImprovement { xi: 0.01 },
            best: 1.0,
            bounds: &bounds,
        };
        let coarse = maximizer
            .maximize(&CandidateStrategy::Random { count: 20 }, &mut ChaCha8Rng::seed_from_u64(9))
            .unwrap();
        let refined = maximizer
            .maximize(
                &CandidateStrategy::RandomRefined {
                    count: 20,
                    refine_iterations: 40,
                },
                &mut ChaCha8Rng::seed_from_u64(9),
            )
            .unwrap();
        assert!(refined.score >= coarse.score);
    }

    #[test]
    fn all_nan_scores_are_a_numerical_failure() {
        let gp = fitted_gp();
        let bounds = Bounds::new().add_continuous("x", 0.0, 1.0);
        let maximizer = AcquisitionMaximizer {
            gp: &gp,
            acquisition: Acquisition::ProbabilityOfImprovement { xi: 0.0 },
            best: f64::NAN,
            bounds: &bounds,
        };
        // Away from the observations so every posterior deviation is positive.
        let candidates = vec![vec![0.25], vec![0.6], vec![0.75]];
        let err = maximizer.select_from(&candidates).unwrap_err();
        assert!(matches!(err, GboError::DegenerateAcquisition { candidates: 3 }));
    }

    #[test]
    fn integer_dimensions_are_snapped() {
        let points = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let obs = ObservationSet::from_pairs(2, &points, &[0.0, 1.0]).unwrap();
        let params =
            KernelParams::new(KernelFamily::PowerExponential { power: 2.0 }, vec![2.0, 2.0]).unwrap();
        let gp =
            GaussianProcess::fit_with_params(&obs, &params, &NuggetPolicy::default(), &PriorMean::Zero)
                .unwrap();
        let bounds = Bounds::new()
            .add_continuous("x", 0.0, 1.0)
            .add_integer("layers", 1, 4);
        let maximizer = AcquisitionMaximizer {
            gp: &gp,
            acquisition: Acquisition::UpperConfidenceBound { kappa: 1.0 },
            best: 1.0,
            bounds: &bounds,
        };
        let selection = maximizer
            .maximize(&CandidateStrategy::default(), &mut ChaCha8Rng::seed_from_u64(4))
            .unwrap();
        assert_eq!(selection.point[1].fract(), 0.0);
        assert!(bounds.contains(&selection.point));
    }
}
