//! Error type for the factorization engine

use scirs2_linalg::LinalgError;
use tenrso_comm::CommError;
use tenrso_dimtree::DimTreeError;
use tenrso_kernels::KernelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NtfError {
    #[error("Invalid rank: {0}")]
    InvalidRank(usize),

    #[error("Invalid iteration count: {0}")]
    InvalidIterations(usize),

    #[error("Tensor needs at least 2 modes, got {0}")]
    TooFewModes(usize),

    #[error("Mode count mismatch: tensor has {tensor} modes, global dims {global}, grid {grid}")]
    ModeCountMismatch {
        tensor: usize,
        global: usize,
        grid: usize,
    },

    #[error("Mode {mode}: local extent {local} does not equal global {global} / grid {grid}")]
    DimensionMismatch {
        mode: usize,
        local: usize,
        global: usize,
        grid: usize,
    },

    #[error("Mode {mode}: global extent {global} is not divisible by {parts}")]
    IndivisibleDimension {
        mode: usize,
        global: usize,
        parts: usize,
    },

    #[error("Expected {expected} regularizers (L2, L1 per mode), got {actual}")]
    RegularizerLength { expected: usize, actual: usize },

    #[error("Regularizer {index} is not a finite non-negative number: {value}")]
    InvalidRegularizer { index: usize, value: f64 },

    #[error("Tensor has zero norm; relative error is undefined")]
    ZeroNormTensor,

    #[error("Factor {mode} has shape {actual:?}, expected {expected:?}")]
    FactorShape {
        mode: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Unknown update algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Buffer for {0} is not contiguous")]
    NonContiguous(&'static str),

    #[error("Communication error: {0}")]
    Comm(#[from] CommError),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("Linear algebra error: {0}")]
    LinalgError(#[from] LinalgError),

    #[error("Dimension tree error: {0}")]
    DimTree(#[from] DimTreeError),
}

pub type NtfResult<T> = Result<T, NtfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comm_error_converts() {
        let err: NtfError = CommError::Aborted.into();
        assert!(matches!(err, NtfError::Comm(CommError::Aborted)));
        assert!(err.to_string().contains("aborted"));
    }

    #[test]
    fn test_indivisible_display() {
        let err = NtfError::IndivisibleDimension {
            mode: 1,
            global: 10,
            parts: 4,
        };
        assert_eq!(err.to_string(), "Mode 1: global extent 10 is not divisible by 4");
    }
}
