//! Ingestion metadata stored alongside every object

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, SecondsFormat, Utc};
use medallion_common::types::{metadata_keys as keys, Format, Tier};
use tracing::warn;

/// String-to-string user metadata attached to a stored object
pub type ObjectMetadata = BTreeMap<String, String>;

/// ISO-8601 rendering used for the `processing_date` entry
pub const PROCESSING_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// What the core knows about one write.
#[derive(Debug, Clone)]
pub struct Provenance<'a> {
    pub source: &'a str,
    pub tier: Tier,
    pub processing_date: NaiveDateTime,
    pub format: Format,
    pub checksum: &'a str,
    /// Row count and column names; absent for verbatim object copies
    pub shape: Option<(usize, Vec<String>)>,
    /// Key of the object copied verbatim, if any
    pub source_object: Option<&'a str>,
}

/// Merge caller entries with the reserved provenance entries.
///
/// Caller keys are lower-cased. `created_at` / `created_by` defaults may be
/// overridden; reserved keys are never taken from the caller and a collision
/// is dropped with a warning.
pub fn build_metadata(provenance: &Provenance<'_>, extra: &ObjectMetadata) -> ObjectMetadata {
    let mut metadata = ObjectMetadata::new();
    metadata.insert(
        keys::CREATED_AT.to_string(),
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    metadata.insert(
        keys::CREATED_BY.to_string(),
        std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
    );

    for (key, value) in extra {
        let key = key.to_lowercase();
        if is_reserved(&key) {
            warn!(key = %key, "Ignoring caller metadata entry that shadows a reserved key");
            continue;
        }
        metadata.insert(key, value.clone());
    }

    let mut reserved = vec![
        (keys::SOURCE, provenance.source.to_string()),
        (keys::LAYER, provenance.tier.to_string()),
        (
            keys::PROCESSING_DATE,
            provenance.processing_date.format(PROCESSING_DATE_FORMAT).to_string(),
        ),
        (keys::CHECKSUM, provenance.checksum.to_string()),
        (keys::FORMAT, provenance.format.to_string()),
    ];
    if let Some((rows, columns)) = &provenance.shape {
        reserved.push((keys::ROWS, rows.to_string()));
        reserved.push((keys::COLUMNS, columns.join(",")));
    }
    if let Some(source_object) = provenance.source_object {
        reserved.push((keys::SOURCE_OBJECT, source_object.to_string()));
    }

    metadata.extend(reserved.into_iter().map(|(k, v)| (k.to_string(), v)));
    metadata
}

fn is_reserved(key: &str) -> bool {
    keys::COMPUTED.contains(&key) || keys::IDENTITY.contains(&key) || key == keys::SOURCE_OBJECT
}
