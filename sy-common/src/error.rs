//! Common error types for the Station Yield tools

use thiserror::Error;

/// Common result type for Station Yield operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the aggregation tools
///
/// A period with zero matching raw events is not an error: the
/// calculators return zero-valued results for it.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed period identifier or request parameter
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
