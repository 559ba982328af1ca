//! Error types shared across the lake crates

use thiserror::Error;

/// Result type alias for shared lake operations
pub type Result<T> = std::result::Result<T, LakeError>;

/// Errors raised while parsing or validating shared lake types
#[derive(Error, Debug)]
pub enum LakeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested serialization format is outside the supported set.
    /// Fatal, never retried.
    #[error("Unsupported format '{0}': expected one of parquet, csv, json")]
    UnsupportedFormat(String),

    #[error("Invalid tier '{0}': expected one of raw, bronze, silver")]
    InvalidTier(String),

    #[error("Invalid partition dimension: {0}")]
    InvalidPartition(String),

    #[error("Invalid source name '{0}': must be non-empty and contain no '/' or whitespace")]
    InvalidSource(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
