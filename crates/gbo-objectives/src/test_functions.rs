//! Closed-form benchmark functions.

use gbo_types::{Bounds, Evaluation, Objective, ObjectiveError};

fn expect_dimension(point: &[f64], expected: usize, name: &str) -> Result<(), ObjectiveError> {
    if point.len() != expected {
        return Err(ObjectiveError::failed(format!(
            "{name} takes {expected} coordinates, got {}",
            point.len()
        )));
    }
    Ok(())
}

/// `f(x) = (2x - 10)² sin(32x - 4)` on `[0, 1]`.
///
/// Highly multimodal; its global minimum sits near `x ≈ 0.076`. Intended for
/// minimization.
#[derive(Debug, Clone, Copy, Default)]
pub struct OscillatingQuadratic;

impl OscillatingQuadratic {
    pub fn value(x: f64) -> f64 {
        (2.0 * x - 10.0).powi(2) * (32.0 * x - 4.0).sin()
    }

    pub fn bounds() -> Bounds {
        Bounds::new().add_continuous("x", 0.0, 1.0)
    }
}

impl Objective for OscillatingQuadratic {
    fn evaluate(&self, point: &[f64]) -> Result<Evaluation, ObjectiveError> {
        expect_dimension(point, 1, self.name())?;
        Ok(Evaluation::new(Self::value(point[0])))
    }

    fn name(&self) -> &str {
        "oscillating_quadratic"
    }
}

/// Branin-Hoo function on `[-5, 10] × [0, 15]`. Three global minima with
/// `f* ≈ 0.397887`. Intended for minimization.
#[derive(Debug, Clone, Copy, Default)]
pub struct Branin;

impl Branin {
    pub const MINIMUM: f64 = 0.397_887_357_729_738_1;

    pub fn value(x1: f64, x2: f64) -> f64 {
        let pi = std::f64::consts::PI;
        let b = 5.1 / (4.0 * pi * pi);
        let c = 5.0 / pi;
        let t = 1.0 / (8.0 * pi);
        (x2 - b * x1 * x1 + c * x1 - 6.0).powi(2) + 10.0 * (1.0 - t) * x1.cos() + 10.0
    }

    pub fn bounds() -> Bounds {
        Bounds::new()
            .add_continuous("x1", -5.0, 10.0)
            .add_continuous("x2", 0.0, 15.0)
    }
}

impl Objective for Branin {
    fn evaluate(&self, point: &[f64]) -> Result<Evaluation, ObjectiveError> {
        expect_dimension(point, 2, self.name())?;
        Ok(Evaluation::new(Self::value(point[0], point[1])))
    }

    fn name(&self) -> &str {
        "branin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oscillating_quadratic_known_values() {
        // f(0) = 100 sin(-4)
        assert!((OscillatingQuadratic::value(0.0) - 100.0 * (-4.0f64).sin()).abs() < 1e-12);
        // f(1) = 64 sin(28)
        assert!((OscillatingQuadratic::value(1.0) - 64.0 * 28.0f64.sin()).abs() < 1e-12);
        let eval = OscillatingQuadratic.evaluate(&[0.5]).unwrap();
        assert!((eval.score - 81.0 * 12.0f64.sin()).abs() < 1e-12);
    }

    #[test]
    fn branin_at_optima() {
        let pi = std::f64::consts::PI;
        for (x1, x2) in [(-pi, 12.275), (pi, 2.275), (3.0 * pi, 2.475)] {
            assert!((Branin::value(x1, x2) - Branin::MINIMUM).abs() < 1e-4);
        }
        assert!(Branin::bounds().contains(&[pi, 2.275]));
    }

    #[test]
    fn wrong_dimension_is_an_objective_error() {
        assert!(matches!(
            Branin.evaluate(&[1.0]),
            Err(ObjectiveError::Failed { .. })
        ));
        assert!(OscillatingQuadratic.evaluate(&[0.1, 0.2]).is_err());
    }
}
