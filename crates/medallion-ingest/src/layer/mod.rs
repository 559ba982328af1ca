//! Tier-aware ingestion
//!
//! A [`LayerManager`] is bound to one (source, tier, store) triple and runs
//! each ingestion as a strictly sequential pass:
//!
//! ```text
//! validate -> process -> build key -> exists? ─ yes -> done (no write)
//!                                            └ no  -> serialize -> checksum
//!                                                     -> metadata -> write
//! ```
//!
//! Tier-specific behavior lives in a [`TierDescriptor`]: two dataset hooks
//! chosen at construction time instead of per-tier subclasses.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use medallion_common::types::{Format, PartitionKey, Tier};

use crate::dataset::Dataset;
use crate::error::Result;
use crate::metadata::ObjectMetadata;

mod manager;

pub use manager::LayerManager;

/// Dataset -> dataset function used for validation and transformation
pub type DatasetHook = Arc<dyn Fn(Dataset) -> Result<Dataset> + Send + Sync>;

fn identity() -> DatasetHook {
    Arc::new(Ok)
}

/// The validate and transform hooks for one tier.
///
/// Raw and bronze always store data as received (identity transform); only
/// silver accepts a caller-supplied transform. Validation defaults to
/// identity in every tier.
#[derive(Clone)]
pub struct TierDescriptor {
    tier: Tier,
    validate: DatasetHook,
    transform: DatasetHook,
}

impl TierDescriptor {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            validate: identity(),
            transform: identity(),
        }
    }

    /// Silver tier applying `transform` to every ingested dataset
    pub fn silver<F>(transform: F) -> Self
    where
        F: Fn(Dataset) -> Result<Dataset> + Send + Sync + 'static,
    {
        Self {
            transform: Arc::new(transform),
            ..Self::new(Tier::Silver)
        }
    }

    /// Guard or repair hook run before the transform
    pub fn with_validator<F>(mut self, validate: F) -> Self
    where
        F: Fn(Dataset) -> Result<Dataset> + Send + Sync + 'static,
    {
        self.validate = Arc::new(validate);
        self
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn validate(&self, dataset: Dataset) -> Result<Dataset> {
        (self.validate)(dataset)
    }

    pub fn process(&self, dataset: Dataset) -> Result<Dataset> {
        (self.transform)(dataset)
    }
}

impl fmt::Debug for TierDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TierDescriptor")
            .field("tier", &self.tier)
            .finish_non_exhaustive()
    }
}

/// Parameters of one `ingest_data` call
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub processing_date: NaiveDateTime,
    pub format: Format,
    pub partition: Option<PartitionKey>,
    /// Caller entries merged into the object metadata
    pub extra_metadata: ObjectMetadata,
    /// Already-stored object to copy verbatim (raw tier, Parquet only)
    pub source_object: Option<String>,
}

impl IngestRequest {
    pub fn new(processing_date: NaiveDateTime, format: Format) -> Self {
        Self {
            processing_date,
            format,
            partition: None,
            extra_metadata: ObjectMetadata::new(),
            source_object: None,
        }
    }

    pub fn with_partition(mut self, partition: PartitionKey) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_source_object(mut self, key: impl Into<String>) -> Self {
        self.source_object = Some(key.into());
        self
    }
}

/// How an `ingest_data` call ended. Every variant is a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Written { key: String, checksum: String },
    /// The key already existed; nothing was serialized or written
    AlreadyPresent { key: String },
    /// Zero-row input; the store was not touched
    SkippedEmpty,
}

impl IngestOutcome {
    /// Stored object key, empty for [`IngestOutcome::SkippedEmpty`]
    pub fn key(&self) -> &str {
        match self {
            IngestOutcome::Written { key, .. } | IngestOutcome::AlreadyPresent { key } => key,
            IngestOutcome::SkippedEmpty => "",
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, IngestOutcome::Written { .. })
    }
}
