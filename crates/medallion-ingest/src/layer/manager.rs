use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDateTime;
use medallion_common::checksum::compute_digest;
use medallion_common::types::{validate_source_name, Format, Tier};
use tracing::{debug, error, info, instrument, warn};

use super::{IngestOutcome, IngestRequest, TierDescriptor};
use crate::dataset::Dataset;
use crate::error::{IngestError, Result};
use crate::keys::{build_object_key, tier_prefix};
use crate::metadata::{build_metadata, ObjectMetadata, Provenance};
use crate::serializer;
use crate::store::{Lookup, ObjectStore, StoreError, WriteOptions, WriteOutcome};

/// Ingestion front end for one source in one tier.
///
/// Holds no mutable state; managers for different sources, tiers or dates
/// can run concurrently against the same store.
#[derive(Clone)]
pub struct LayerManager {
    source: String,
    descriptor: TierDescriptor,
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for LayerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerManager")
            .field("source", &self.source)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl LayerManager {
    /// Manager using the default (identity) hooks for `tier`
    pub fn new(source: impl Into<String>, tier: Tier, store: Arc<dyn ObjectStore>) -> Result<Self> {
        Self::with_descriptor(source, TierDescriptor::new(tier), store)
    }

    pub fn with_descriptor(
        source: impl Into<String>,
        descriptor: TierDescriptor,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self> {
        let source = source.into();
        validate_source_name(&source)?;
        Ok(Self {
            source,
            descriptor,
            store,
        })
    }

    /// Silver-tier manager applying `transform` before every write
    pub fn silver<F>(source: impl Into<String>, store: Arc<dyn ObjectStore>, transform: F) -> Result<Self>
    where
        F: Fn(Dataset) -> Result<Dataset> + Send + Sync + 'static,
    {
        Self::with_descriptor(source, TierDescriptor::silver(transform), store)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tier(&self) -> Tier {
        self.descriptor.tier()
    }

    /// Key `ingest_data` would write for `request`
    pub fn object_key(&self, request: &IngestRequest) -> String {
        build_object_key(
            self.tier(),
            &self.source,
            request.format,
            request.processing_date,
            request.partition.as_ref(),
        )
    }

    /// Store `dataset` under its deterministic key unless that key exists.
    ///
    /// A zero-row dataset is skipped without touching the store. In the raw
    /// tier a Parquet request naming a `source_object` copies that object's
    /// bytes verbatim and ignores `dataset`.
    #[instrument(
        skip(self, dataset, request),
        fields(source = %self.source, tier = %self.tier(), format = %request.format)
    )]
    pub async fn ingest_data(&self, dataset: Dataset, request: &IngestRequest) -> Result<IngestOutcome> {
        if let Some(source_object) = self.verbatim_source(request) {
            return self.copy_object(source_object, request).await;
        }

        if dataset.is_empty() {
            warn!(
                columns = dataset.num_columns(),
                "Dataset has no rows, skipping ingestion"
            );
            return Ok(IngestOutcome::SkippedEmpty);
        }

        let dataset = self.descriptor.validate(dataset)?;
        let dataset = self.descriptor.process(dataset)?;

        let key = self.object_key(request);
        if self.exists(&key).await? {
            info!(key = %key, "Object already present, skipping write");
            return Ok(IngestOutcome::AlreadyPresent { key });
        }

        let data = serializer::serialize(&dataset, request.format)?;
        let checksum = compute_digest(&data);
        let metadata = build_metadata(
            &Provenance {
                source: &self.source,
                tier: self.tier(),
                processing_date: request.processing_date,
                format: request.format,
                checksum: &checksum,
                shape: Some((dataset.num_rows(), dataset.column_names())),
                source_object: None,
            },
            &request.extra_metadata,
        );

        debug!(
            key = %key,
            rows = dataset.num_rows(),
            bytes = data.len(),
            "Writing dataset"
        );
        self.write(key, data, &metadata, request.format, checksum).await
    }

    /// Read every predecessor-tier object of this source stored in `format`
    /// and union them in key order.
    ///
    /// All matching objects are loaded whatever their processing date. No
    /// matching objects yields an empty dataset.
    #[instrument(skip(self), fields(source = %self.source, tier = %self.tier()))]
    pub async fn load_from_previous_layer(
        &self,
        processing_date: NaiveDateTime,
        format: Format,
    ) -> Result<Dataset> {
        let predecessor = self
            .tier()
            .predecessor()
            .ok_or(IngestError::NoPredecessor(self.tier()))?;

        let prefix = tier_prefix(predecessor, &self.source);
        let suffix = format!(".{}", format.extension());

        let keys: Vec<String> = self
            .store
            .list(&prefix)
            .await
            .inspect_err(|e| log_store_error("list", e))?
            .into_iter()
            .filter(|key| key.ends_with(&suffix))
            .collect();

        if keys.is_empty() {
            info!(prefix = %prefix, "No {} objects in predecessor tier", format);
            return Ok(Dataset::empty());
        }

        let mut parts = Vec::with_capacity(keys.len());
        for key in &keys {
            let data = self.read(key).await?;
            parts.push(serializer::deserialize(data, format)?);
        }

        let dataset = Dataset::concat(parts)?;
        info!(
            objects = keys.len(),
            rows = dataset.num_rows(),
            "Loaded {} tier data",
            predecessor
        );
        Ok(dataset)
    }

    fn verbatim_source<'a>(&self, request: &'a IngestRequest) -> Option<&'a str> {
        if self.tier() == Tier::Raw && request.format.is_columnar() {
            request.source_object.as_deref()
        } else {
            None
        }
    }

    async fn copy_object(&self, source_object: &str, request: &IngestRequest) -> Result<IngestOutcome> {
        let key = self.object_key(request);
        if self.exists(&key).await? {
            info!(key = %key, "Object already present, skipping copy");
            return Ok(IngestOutcome::AlreadyPresent { key });
        }

        let data = self.read(source_object).await?;
        let checksum = compute_digest(&data);
        let metadata = build_metadata(
            &Provenance {
                source: &self.source,
                tier: self.tier(),
                processing_date: request.processing_date,
                format: request.format,
                checksum: &checksum,
                shape: None,
                source_object: Some(source_object),
            },
            &request.extra_metadata,
        );

        debug!(key = %key, source_object, bytes = data.len(), "Copying object verbatim");
        self.write(key, data, &metadata, request.format, checksum).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.store
            .exists(key)
            .await
            .inspect_err(|e| log_store_error("exists", e))
            .map_err(IngestError::from)
    }

    async fn read(&self, key: &str) -> Result<Bytes> {
        match self
            .store
            .read(key)
            .await
            .inspect_err(|e| log_store_error("read", e))?
        {
            Lookup::Found(data) => Ok(data),
            Lookup::NotFound => {
                error!(key, "Object disappeared before it could be read");
                Err(IngestError::MissingObject(key.to_string()))
            },
        }
    }

    async fn write(
        &self,
        key: String,
        data: Bytes,
        metadata: &ObjectMetadata,
        format: Format,
        checksum: String,
    ) -> Result<IngestOutcome> {
        let options = WriteOptions {
            content_type: Some(format.content_type().to_string()),
            ..WriteOptions::default()
        };

        match self
            .store
            .write(&key, data, metadata, options)
            .await
            .inspect_err(|e| log_store_error("write", e))?
        {
            WriteOutcome::Written => {
                info!(key = %key, checksum = %checksum, "Ingested object");
                Ok(IngestOutcome::Written { key, checksum })
            },
            WriteOutcome::AlreadyExists => {
                warn!(key = %key, "Concurrent writer created the object first");
                Ok(IngestOutcome::AlreadyPresent { key })
            },
        }
    }
}

fn log_store_error(operation: &str, err: &StoreError) {
    error!(key = %err.key(), operation, error = %err, "Object store call failed");
}
