//! Object store contract consumed by the ingestion core
//!
//! Backends report "object absent" as [`Lookup::NotFound`], never as an error,
//! so a missing object cannot be confused with a failed request. Failures are
//! classified as [`StoreError::Transient`] (retry may help) or
//! [`StoreError::Permanent`]; [`RetryingStore`] turns repeated transient
//! failures into [`StoreError::RetriesExhausted`].
//!
//! | Backend          | Use                                   |
//! |------------------|---------------------------------------|
//! | [`S3Store`]      | AWS S3 or any S3-compatible endpoint  |
//! | [`MemoryStore`]  | tests and local dry runs              |
//! | [`RetryingStore`]| bounded exponential backoff decorator |

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::metadata::ObjectMetadata;

pub mod config;
pub mod memory;
pub mod retry;
pub mod s3;

pub use config::{RetryPolicy, StorageConfig};
pub use memory::MemoryStore;
pub use retry::RetryingStore;
pub use s3::S3Store;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connection failures, throttling, server-side 5xx
    #[error("Transient store failure for '{key}': {message}")]
    Transient { key: String, message: String },

    /// Permission denied, invalid request, and similar
    #[error("Store failure for '{key}': {message}")]
    Permanent { key: String, message: String },

    #[error("Store failure for '{key}' after {attempts} attempts: {message}")]
    RetriesExhausted {
        key: String,
        attempts: u32,
        message: String,
    },
}

impl StoreError {
    pub fn transient(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn permanent(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Permanent {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Transient { key, .. }
            | Self::Permanent { key, .. }
            | Self::RetriesExhausted { key, .. } => key,
        }
    }
}

/// Outcome of a lookup that may legitimately find nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

/// What `head` reports about a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub metadata: ObjectMetadata,
}

/// Precondition for a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePrecondition {
    /// Write only if no object exists under the key
    #[default]
    DoesNotExist,
    /// Overwrite unconditionally (last write wins)
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// `DoesNotExist` precondition failed: another writer got there first
    AlreadyExists,
}

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub content_type: Option<String>,
    pub precondition: WritePrecondition,
}

/// Remote key-value object store.
///
/// Every call is a suspension point; implementations may retry internally.
/// Objects are individually atomic (fully readable or absent); nothing here
/// spans multiple keys.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn head(&self, key: &str) -> StoreResult<Lookup<ObjectInfo>>;

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.head(key).await?.is_found())
    }

    async fn read(&self, key: &str) -> StoreResult<Lookup<Bytes>>;

    async fn write(
        &self,
        key: &str,
        data: Bytes,
        metadata: &ObjectMetadata,
        options: WriteOptions,
    ) -> StoreResult<WriteOutcome>;

    /// All keys under `prefix`, sorted
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;
}
