//! Medallion Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Moves tabular datasets through the raw -> bronze -> silver tiers of an
//! object-store data lake.
//!
//! # Components
//!
//! - **keys**: deterministic, Hive-partitioned object keys
//! - **serializer**: Parquet / CSV / JSON-lines codecs and the content checksum
//! - **store**: object store contract with S3, in-memory and retrying backends
//! - **layer**: per-(source, tier) ingestion and predecessor-tier reloads
//! - **pipeline**: the driver behind the `medallion-ingest` binary
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use medallion_common::types::{Format, Tier};
//! use medallion_ingest::layer::{IngestRequest, LayerManager};
//! use medallion_ingest::store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let bronze = LayerManager::new("transactions", Tier::Bronze, store)?;
//!
//!     let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 2)
//!         .and_then(|d| d.and_hms_opt(10, 15, 0))
//!         .ok_or_else(|| anyhow::anyhow!("bad date"))?;
//!     let dataset = bronze.load_from_previous_layer(date, Format::Parquet).await?;
//!     let outcome = bronze
//!         .ingest_data(dataset, &IngestRequest::new(date, Format::Parquet))
//!         .await?;
//!     println!("{}", outcome.key());
//!     Ok(())
//! }
//! ```

pub mod dataset;
pub mod error;
pub mod keys;
pub mod layer;
pub mod metadata;
pub mod pipeline;
pub mod serializer;
pub mod store;

pub use dataset::Dataset;
pub use error::{IngestError, Result};
