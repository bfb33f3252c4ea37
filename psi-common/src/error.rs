//! Common error types for psi45

use thiserror::Error;

/// Common result type for psi45 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the loader, conditioner and model stages
///
/// Numeric degeneracy (empty signal, zero sample rate) is not an error:
/// those stages return documented defaults instead.
#[derive(Error, Debug)]
pub enum Error {
    /// File extension does not match the domain, or no decode backend exists
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// No identifiable signal dataset inside a structured container
    #[error("Data not found: {0}")]
    DataNotFound(String),

    /// Input exceeds a configured sample/timestep cap
    #[error("Size limit exceeded: {what} has {actual} entries (limit {limit})")]
    SizeLimitExceeded {
        what: &'static str,
        actual: usize,
        limit: usize,
    },

    /// Corrupt or truncated container
    #[error("Decode error: {0}")]
    Decode(String),

    /// Resampler construction or processing failure
    #[error("Resample error: {0}")]
    Resample(String),

    /// Model training failure that has no seed-parameter fallback
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_message() {
        let err = Error::SizeLimitExceeded {
            what: "ligo strain",
            actual: 2_000_001,
            limit: 2_000_000,
        };
        assert_eq!(
            err.to_string(),
            "Size limit exceeded: ligo strain has 2000001 entries (limit 2000000)"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}
