use std::fmt;

/// Error types for optimizers
///
/// Only malformed input and collaborator failures end up here. Terminal solver
/// outcomes (convergence, line-search failure, iteration budget) are reported
/// through [`crate::minimize::OptimizeResult::status`] instead.
#[derive(Debug, Clone, PartialEq)]
pub enum MinimizerError {
    ConfigError(String),
    Delegate(String),
    DimensionMismatch(String),
    FileError(String),
    FunctionEvaluationError,
    GradientEvaluationError,
    InvalidBounds(String),
    InvalidDimension,
    InvalidParameters(String),
    InvalidTolerance,
}

impl fmt::Display for MinimizerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MinimizerError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            MinimizerError::Delegate(msg) => write!(f, "Bound-constrained delegate failed: {}", msg),
            MinimizerError::DimensionMismatch(msg) => write!(f, "Dimension mismatch: {}", msg),
            MinimizerError::FileError(msg) => write!(f, "File error: {}", msg),
            MinimizerError::FunctionEvaluationError => {
                write!(f, "Function evaluation returned invalid value")
            }
            MinimizerError::GradientEvaluationError => {
                write!(f, "Gradient evaluation returned invalid value")
            }
            MinimizerError::InvalidBounds(msg) => write!(f, "Invalid bounds: {}", msg),
            MinimizerError::InvalidDimension => write!(f, "Invalid dimension or empty vector"),
            MinimizerError::InvalidParameters(msg) => {
                write!(f, "Invalid parameters: {}", msg)
            }
            MinimizerError::InvalidTolerance => {
                write!(f, "Tolerance must be non-negative and finite")
            }
        }
    }
}

impl std::error::Error for MinimizerError {}

impl From<serde_json::Error> for MinimizerError {
    fn from(err: serde_json::Error) -> Self {
        MinimizerError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for MinimizerError {
    fn from(err: std::io::Error) -> Self {
        MinimizerError::FileError(err.to_string())
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            MinimizerError::InvalidDimension.to_string(),
            "Invalid dimension or empty vector"
        );
        assert_eq!(
            MinimizerError::InvalidBounds("lower > upper".to_string()).to_string(),
            "Invalid bounds: lower > upper"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let converted: MinimizerError = err.into();
        assert!(matches!(converted, MinimizerError::ConfigError(_)));
    }
}
