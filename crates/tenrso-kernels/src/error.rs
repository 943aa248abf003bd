//! Error types for tensor kernel operations
//!
//! Kernels validate operand shapes up front and report mismatches with enough
//! context to tell which operand of which kernel was wrong.

use thiserror::Error;

/// Error type for tensor kernel operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// Operand or output buffer has the wrong shape
    #[error("{operation}: dimension mismatch - expected {expected:?}, got {actual:?}. {context}")]
    DimensionMismatch {
        operation: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
        context: String,
    },

    /// Mode index outside the tensor
    #[error("Invalid mode {mode}: must be < {max_mode}. {context}")]
    InvalidMode {
        mode: usize,
        max_mode: usize,
        context: String,
    },

    /// Factor matrices disagree on the CP rank
    #[error("{operation}: rank mismatch at factor {factor_index}: expected rank {expected_rank}, got {actual_rank}")]
    RankMismatch {
        operation: String,
        expected_rank: usize,
        actual_rank: usize,
        factor_index: usize,
    },

    /// Empty input where at least one element is required
    #[error("{operation}: empty input not allowed for parameter '{parameter}'")]
    EmptyInput { operation: String, parameter: String },
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    pub fn dimension_mismatch(
        operation: impl Into<String>,
        expected: Vec<usize>,
        actual: Vec<usize>,
        context: impl Into<String>,
    ) -> Self {
        KernelError::DimensionMismatch {
            operation: operation.into(),
            expected,
            actual,
            context: context.into(),
        }
    }

    pub fn invalid_mode(mode: usize, max_mode: usize, context: impl Into<String>) -> Self {
        KernelError::InvalidMode {
            mode,
            max_mode,
            context: context.into(),
        }
    }

    pub fn rank_mismatch(
        operation: impl Into<String>,
        expected_rank: usize,
        actual_rank: usize,
        factor_index: usize,
    ) -> Self {
        KernelError::RankMismatch {
            operation: operation.into(),
            expected_rank,
            actual_rank,
            factor_index,
        }
    }

    pub fn empty_input(operation: impl Into<String>, parameter: impl Into<String>) -> Self {
        KernelError::EmptyInput {
            operation: operation.into(),
            parameter: parameter.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = KernelError::dimension_mismatch(
            "mttkrp_with_krp",
            vec![8, 2],
            vec![6, 2],
            "KRP rows must equal the product of the other modes",
        );

        let msg = format!("{}", err);
        assert!(msg.contains("mttkrp_with_krp"));
        assert!(msg.contains("dimension mismatch"));
        assert!(msg.contains("[8, 2]"));
        assert!(msg.contains("[6, 2]"));
    }

    #[test]
    fn test_invalid_mode_display() {
        let err = KernelError::invalid_mode(3, 3, "Tensor has only 3 modes");

        let msg = format!("{}", err);
        assert!(msg.contains("Invalid mode 3"));
        assert!(msg.contains("must be < 3"));
    }

    #[test]
    fn test_rank_mismatch_display() {
        let err = KernelError::rank_mismatch("khatri_rao_leave_out_one", 5, 3, 2);

        let msg = format!("{}", err);
        assert!(msg.contains("factor 2"));
        assert!(msg.contains("expected rank 5"));
        assert!(msg.contains("got 3"));
    }

    #[test]
    fn test_empty_input_display() {
        let err = KernelError::empty_input("gram_hadamard", "grams");
        assert!(err.to_string().contains("'grams'"));
    }
}
