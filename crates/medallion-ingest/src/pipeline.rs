//! Driver for one ingestion pass: pick the input for the requested tier, then
//! hand it to that tier's [`LayerManager`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use medallion_common::checksum::compute_digest;
use medallion_common::types::{Format, PartitionKey, Tier};
use tracing::{info, instrument};

use crate::dataset::Dataset;
use crate::error::{IngestError, Result};
use crate::layer::{IngestOutcome, IngestRequest, LayerManager, TierDescriptor};
use crate::serializer;
use crate::store::ObjectStore;

/// One ingestion pass as requested on the command line
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub source: String,
    pub tier: Tier,
    pub processing_date: NaiveDateTime,
    pub format: Format,
    /// Write under `year=/month=/day=` of the processing date
    pub partition_by_date: bool,
    /// Local file holding raw-tier input in `format`
    pub input: Option<PathBuf>,
    /// Stored object to copy into the raw tier
    pub source_object: Option<String>,
}

impl PipelineRun {
    pub fn new(source: impl Into<String>, tier: Tier, processing_date: NaiveDateTime) -> Self {
        Self {
            source: source.into(),
            tier,
            processing_date,
            format: Format::Parquet,
            partition_by_date: false,
            input: None,
            source_object: None,
        }
    }

    fn request(&self) -> IngestRequest {
        let mut request = IngestRequest::new(self.processing_date, self.format);
        if self.partition_by_date {
            request = request.with_partition(PartitionKey::daily(self.processing_date.date()));
        }
        if let Some(source_object) = &self.source_object {
            request = request.with_source_object(source_object.clone());
        }
        request
    }
}

#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    silver: TierDescriptor,
}

impl Pipeline {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            silver: TierDescriptor::new(Tier::Silver),
        }
    }

    /// Transform applied when running the silver tier
    pub fn with_silver_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Dataset) -> Result<Dataset> + Send + Sync + 'static,
    {
        self.silver = TierDescriptor::silver(transform);
        self
    }

    #[instrument(skip(self, run), fields(source = %run.source, tier = %run.tier, date = %run.processing_date))]
    pub async fn run(&self, run: &PipelineRun) -> Result<IngestOutcome> {
        let descriptor = match run.tier {
            Tier::Silver => self.silver.clone(),
            tier => TierDescriptor::new(tier),
        };
        let manager = LayerManager::with_descriptor(&run.source, descriptor, self.store.clone())?;

        let dataset = match run.tier {
            Tier::Raw => raw_input(run)?,
            _ => {
                manager
                    .load_from_previous_layer(run.processing_date, run.format)
                    .await?
            },
        };

        let outcome = manager.ingest_data(dataset, &run.request()).await?;
        match &outcome {
            IngestOutcome::Written { key, .. } => info!(key = %key, "Ingestion pass complete"),
            IngestOutcome::AlreadyPresent { key } => info!(key = %key, "Ingestion pass found existing object"),
            IngestOutcome::SkippedEmpty => info!("Ingestion pass had nothing to write"),
        }
        Ok(outcome)
    }
}

fn raw_input(run: &PipelineRun) -> Result<Dataset> {
    match (&run.input, &run.source_object) {
        (Some(path), _) => read_local_input(path, run.format),
        (None, Some(_)) if run.format == Format::Parquet => Ok(Dataset::empty()),
        (None, Some(_)) => Err(IngestError::MissingInput(
            Tier::Raw,
            format!("copying a stored object requires parquet, not {}", run.format),
        )),
        (None, None) => Err(IngestError::MissingInput(
            Tier::Raw,
            "provide a local input file or a stored source object".to_string(),
        )),
    }
}

fn read_local_input(path: &Path, format: Format) -> Result<Dataset> {
    let data = Bytes::from(std::fs::read(path)?);
    let digest = compute_digest(&data);
    let dataset = serializer::deserialize(data, format)?;

    info!(
        path = %path.display(),
        digest = %digest,
        rows = dataset.num_rows(),
        "Read local input"
    );
    Ok(dataset)
}

/// Accepts `YYYY-MM-DD` (midnight) or `YYYY-MM-DD HH:MM:SS`, with a space or `T`
pub fn parse_processing_date(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    for layout in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, layout) {
            return Ok(parsed);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| IngestError::InvalidDate(value.to_string()))
}

/// Yesterday at 00:00:00 local time
pub fn default_processing_date() -> NaiveDateTime {
    let yesterday = Local::now().date_naive() - Duration::days(1);
    yesterday.and_time(chrono::NaiveTime::MIN)
}
