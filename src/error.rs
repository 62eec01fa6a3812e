//! Error types for lazr
//!
//! Two layers: [`BackendError`] is what an accelerated backend reports from a
//! single dispatch, [`Error`] is what the expression engine reports to callers.
//! Backend failures convert into [`Error::Backend`] so the caller can decide
//! whether to fall back to the generic loop or abort.

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using lazr's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or evaluating expressions
#[derive(Error, Debug)]
pub enum Error {
    /// Operand or destination shapes do not conform
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Invalid dimension index
    #[error("Invalid dimension {dim} for expression with {ndim} dimensions")]
    InvalidDimension {
        /// The invalid dimension
        dim: usize,
        /// Number of dimensions
        ndim: usize,
    },

    /// Index out of bounds
    #[error("Index {index} out of bounds for dimension of size {size}")]
    IndexOutOfBounds {
        /// The invalid index
        index: usize,
        /// Size of the dimension
        size: usize,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Unsupported dtype for an operation
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// A backend dispatch failed
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Returns the backend error if this error came from a dispatch
    pub fn as_backend(&self) -> Option<&BackendError> {
        match self {
            Self::Backend(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure reported by a backend routine or while marshalling its descriptors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend cannot describe a tensor of this rank
    #[error("{backend}: rank {rank} is not supported (max {max})")]
    UnsupportedRank {
        /// Backend name
        backend: &'static str,
        /// Rank of the offending tensor
        rank: usize,
        /// Largest rank the backend accepts
        max: usize,
    },

    /// The backend does not implement this operation for this dtype
    #[error("{backend}: {operation} is not supported for {dtype:?}")]
    UnsupportedOperation {
        /// Backend name
        backend: &'static str,
        /// Operation name
        operation: &'static str,
        /// Element type requested
        dtype: DType,
    },

    /// The operand layout cannot be handed to the backend
    #[error("{backend}: {operation} requires {required} storage")]
    UnsupportedLayout {
        /// Backend name
        backend: &'static str,
        /// Operation name
        operation: &'static str,
        /// Layout the backend needs
        required: &'static str,
    },

    /// Descriptors handed to a routine disagree with the buffers
    #[error("{backend}: descriptor mismatch in {operation}: {reason}")]
    DescriptorMismatch {
        /// Backend name
        backend: &'static str,
        /// Operation name
        operation: &'static str,
        /// What disagreed
        reason: String,
    },

    /// The routine itself failed
    #[error("{backend}: {operation} failed with status {status}")]
    Execution {
        /// Backend name
        backend: &'static str,
        /// Operation name
        operation: &'static str,
        /// Status string reported by the backend
        status: String,
    },
}

impl BackendError {
    /// True when the failure only says "this backend cannot do that" and a
    /// generic implementation can always take over.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedRank { .. }
                | Self::UnsupportedOperation { .. }
                | Self::UnsupportedLayout { .. }
        )
    }

    /// Name of the backend that produced the error
    pub fn backend(&self) -> &'static str {
        match self {
            Self::UnsupportedRank { backend, .. }
            | Self::UnsupportedOperation { backend, .. }
            | Self::UnsupportedLayout { backend, .. }
            | Self::DescriptorMismatch { backend, .. }
            | Self::Execution { backend, .. } => backend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_converts() {
        let err: Error = BackendError::Execution {
            backend: "cpu",
            operation: "pool2d_forward",
            status: "BAD_PARAM".into(),
        }
        .into();
        let backend = err.as_backend().unwrap();
        assert_eq!(backend.backend(), "cpu");
        assert!(!backend.is_unsupported());
        assert!(err.to_string().contains("BAD_PARAM"));
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = Error::shape_mismatch(&[2, 3], &[3, 2]);
        assert_eq!(err.to_string(), "Shape mismatch: expected [2, 3], got [3, 2]");
    }
}
