//! Error types for collective communication

use thiserror::Error;

/// Errors raised by communicators and process-grid setup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommError {
    /// A member of the group left before the collective completed
    #[error("communicator aborted: a peer left the group before the collective completed")]
    Aborted,

    /// Buffer lengths disagree between ranks or with the group size
    #[error("{operation}: buffer length mismatch (expected {expected}, got {actual})")]
    CountMismatch {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The grid does not cover the communicator
    #[error("process grid {grid:?} has {expected} processes but the communicator has {actual}")]
    GridMismatch {
        grid: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    /// Grid shape is unusable (empty or with a zero extent)
    #[error("invalid process grid {grid:?}: {reason}")]
    InvalidGrid { grid: Vec<usize>, reason: String },

    /// A sub-communicator does not have the membership the grid implies
    #[error("{collective} group of mode {mode}: {reason}")]
    TopologyMismatch {
        collective: String,
        mode: usize,
        reason: String,
    },

    /// The backend refused to split the communicator
    #[error("communicator split failed for color {color}")]
    SplitFailed { color: usize },
}

/// Result type for communication operations
pub type CommResult<T> = Result<T, CommError>;
