//! Aggregation cache error types

use thiserror::Error;

/// Errors that can occur in the aggregation cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key or block could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Block width must be positive
    #[error("Invalid block width: {0}")]
    InvalidBlockWidth(i64),

    /// Cache backend rejected the operation
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// Lookup range could not be split
    #[error("Invalid range: {0}")]
    Range(#[from] crate::time::RangeError),
}

impl From<bincode::Error> for CacheError {
    fn from(err: bincode::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::RangeError;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CacheError::InvalidBlockWidth(0).to_string(),
            "Invalid block width: 0"
        );

        let err: CacheError = RangeError::InvalidPeriod(-5).into();
        assert!(matches!(err, CacheError::Range(_)));
    }

    #[test]
    fn test_bincode_error_conversion() {
        let err = bincode::deserialize::<String>(&[0xff]).unwrap_err();
        let cache_err: CacheError = err.into();
        assert!(matches!(cache_err, CacheError::Serialization(_)));
    }
}
