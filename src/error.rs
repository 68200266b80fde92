use thiserror::Error;

/// Result type for capsule layer operations
pub type Result<T> = std::result::Result<T, CapsError>;

/// Main error type for the capsule layers.
///
/// Every variant is fatal: a call either fully succeeds or fails before
/// producing any output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapsError {
    /// Invalid configuration value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Tensor has the wrong number of axes
    #[error("Rank mismatch: expected {expected}, got {actual}")]
    RankMismatch {
        expected: String,
        actual: String,
    },

    /// Tensor axes disagree with each other or with an allocated parameter
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        expected: String,
        actual: String,
    },

    /// Wrong number of inputs handed to a layer
    #[error("Arity mismatch: expected {expected} input(s), got {actual}")]
    ArityMismatch {
        expected: usize,
        actual: usize,
    },

    /// The transformation matrix has not been allocated yet
    #[error("Layer not built: call build() or forward() with an input first")]
    NotBuilt,

    /// Configuration file could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),
}

impl From<std::io::Error> for CapsError {
    fn from(err: std::io::Error) -> Self {
        CapsError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CapsError {
    fn from(err: serde_json::Error) -> Self {
        CapsError::Config(err.to_string())
    }
}

impl From<ndarray::ShapeError> for CapsError {
    fn from(err: ndarray::ShapeError) -> Self {
        CapsError::ShapeMismatch {
            expected: "a compatible layout".to_string(),
            actual: err.to_string(),
        }
    }
}

// Helper functions for common error patterns
impl CapsError {
    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        CapsError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn rank_mismatch(expected: usize, actual: &[usize]) -> Self {
        CapsError::RankMismatch {
            expected: format!("rank {}", expected),
            actual: format!("rank {} (shape {:?})", actual.len(), actual),
        }
    }

    pub fn shape_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        CapsError::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
