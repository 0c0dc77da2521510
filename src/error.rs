//! Crate-wide error taxonomy.
//!
//! One variant per failure kind: tensor/caller-bug errors, kernel
//! precondition failures, backend failures, and construction-time
//! failures. The core never retries; callers decide.

use thiserror::Error;

/// The error type returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum OnnxKitError {
    #[error("shape mismatch: expected {expected} elements for shape {shape:?}, got {actual}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("axis {axis} out of range for rank {rank}")]
    AxisOutOfRange { axis: i64, rank: usize },

    #[error("index {index} out of range for axis of size {size}")]
    IndexOutOfRange { index: i64, size: usize },

    #[error("cannot squeeze axis {axis}: size is {size}, not 1")]
    InvalidSqueeze { axis: usize, size: usize },

    #[error("dimension mismatch: {a} vs {b}")]
    DimensionMismatch { a: usize, b: usize },

    #[error("backend error: {message}")]
    BackendError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("model source error: {0}")]
    ModelSourceError(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, OnnxKitError>;

impl OnnxKitError {
    pub fn backend(message: impl Into<String>) -> Self {
        OnnxKitError::BackendError {
            message: message.into(),
            source: None,
        }
    }

    pub fn backend_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        OnnxKitError::BackendError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
