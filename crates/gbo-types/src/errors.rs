use thiserror::Error;

/// Main error type for GlowBack Bayesian optimization
#[derive(Error, Debug)]
pub enum GboError {
    #[error("Invalid kernel parameter: {parameter} = {value} ({message})")]
    InvalidKernelParameter {
        parameter: String,
        value: f64,
        message: String,
    },

    #[error(
        "Singular covariance: matrix over {points} points is not positive-definite \
         after nugget {nugget:e} (duplicate or near-duplicate sample points are the usual cause)"
    )]
    SingularCovariance { points: usize, nugget: f64 },

    #[error(
        "Degenerate acquisition: none of {candidates} candidates produced a finite score \
         (the surrogate posterior is numerically unusable)"
    )]
    DegenerateAcquisition { candidates: usize },

    #[error("Empty seed: no initial grid, random points or prior observations to fit the first surrogate")]
    EmptySeed,

    #[error("Objective evaluation error: {0}")]
    ObjectiveEvaluation(#[from] ObjectiveError),

    #[error("Bounds violation: point {point:?} lies outside dimension {dimension} bounds [{lower}, {upper}]")]
    BoundsViolation {
        point: Vec<f64>,
        dimension: String,
        lower: f64,
        upper: f64,
    },

    #[error("Invalid bounds for dimension {dimension}: {message}")]
    InvalidBounds { dimension: String, message: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures raised while evaluating an objective function
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObjectiveError {
    #[error("objective failed: {message}")]
    Failed { message: String },

    #[error("objective returned a non-finite value: {value}")]
    NonFinite { value: f64 },

    #[error("objective timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("objective worker disconnected before returning a value")]
    Disconnected,
}

impl ObjectiveError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Result type alias for GlowBack optimization operations
pub type GboResult<T> = Result<T, GboError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! invalid_config {
    ($($arg:tt)*) => {
        $crate::GboError::InvalidConfig(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singular_covariance_mentions_duplicates() {
        let error = GboError::SingularCovariance {
            points: 4,
            nugget: 1e-6,
        };
        let text = error.to_string();
        assert!(text.contains("4 points"));
        assert!(text.contains("duplicate"));
    }

    #[test]
    fn degenerate_acquisition_reports_candidate_count() {
        let text = GboError::DegenerateAcquisition { candidates: 250 }.to_string();
        assert!(text.contains("250 candidates"));
    }

    #[test]
    fn objective_error_converts() {
        let err: GboError = ObjectiveError::NonFinite { value: f64::NAN }.into();
        match err {
            GboError::ObjectiveEvaluation(ObjectiveError::NonFinite { value }) => {
                assert!(value.is_nan())
            }
            other => panic!("expected objective error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_config_macro() {
        let err = invalid_config!("n_iter must be finite, got {}", 3);
        assert!(matches!(err, GboError::InvalidConfig(ref m) if m.contains('3')));
    }
}
