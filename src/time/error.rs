//! Interval algebra error types

use thiserror::Error;

/// Errors raised when constructing or splitting time ranges
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// Range start is before the epoch
    #[error("Invalid range: start must be a positive number, got {0}")]
    NegativeStart(i64),

    /// Range end comes before its start
    #[error("Invalid range: start ({start}) must come before end ({end})")]
    EndBeforeStart { start: i64, end: i64 },

    /// Split period must be strictly positive
    #[error("Invalid period: {0} (must be greater than zero)")]
    InvalidPeriod(i64),
}

/// Result type alias for range operations
pub type RangeResult<T> = Result<T, RangeError>;
