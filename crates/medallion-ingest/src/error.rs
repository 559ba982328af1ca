//! Error types for ingestion

use medallion_common::types::Tier;
use medallion_common::LakeError;
use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Shared type errors, including `UnsupportedFormat`
    #[error(transparent)]
    Lake(#[from] LakeError),

    /// Object store failure after any retries
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("The {0} tier has no predecessor to load from")]
    NoPredecessor(Tier),

    #[error("Incompatible schemas: {0}")]
    SchemaMismatch(String),

    #[error("Object not found: {0}")]
    MissingObject(String),

    #[error("No input for the {0} tier: {1}")]
    MissingInput(Tier, String),

    #[error("Invalid processing date '{0}': expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS")]
    InvalidDate(String),

    /// Raised by a caller-supplied validate or transform hook
    #[error("Dataset hook failed: {0}")]
    Hook(String),
}

impl IngestError {
    pub fn hook(msg: impl Into<String>) -> Self {
        Self::Hook(msg.into())
    }
}
