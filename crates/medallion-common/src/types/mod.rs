//! Common types used across the lake crates

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{LakeError, Result};

/// One stage of the raw -> bronze -> silver progression.
///
/// Tiers are totally ordered; every tier except `Raw` reads from exactly one
/// predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Raw,
    Bronze,
    Silver,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Raw, Tier::Bronze, Tier::Silver];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Raw => "raw",
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
        }
    }

    /// The tier this one is rebuilt from, `None` for raw
    pub fn predecessor(self) -> Option<Tier> {
        match self {
            Tier::Raw => None,
            Tier::Bronze => Some(Tier::Raw),
            Tier::Silver => Some(Tier::Bronze),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = LakeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(Tier::Raw),
            "bronze" => Ok(Tier::Bronze),
            "silver" => Ok(Tier::Silver),
            _ => Err(LakeError::InvalidTier(s.to_string())),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of serialization formats.
///
/// Only Parquet preserves column types; CSV and JSON lines are read back as
/// text / inferred types respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Columnar binary
    Parquet,
    /// Delimited text with a header row
    Csv,
    /// Line-delimited JSON objects
    Json,
}

impl Format {
    /// File extension used as the object key suffix
    pub fn extension(self) -> &'static str {
        match self {
            Format::Parquet => "parquet",
            Format::Csv => "csv",
            Format::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Format::Parquet => "application/octet-stream",
            Format::Csv => "text/csv",
            Format::Json => "application/json",
        }
    }

    pub fn is_columnar(self) -> bool {
        matches!(self, Format::Parquet)
    }
}

impl std::str::FromStr for Format {
    type Err = LakeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parquet" => Ok(Format::Parquet),
            "csv" => Ok(Format::Csv),
            "json" | "jsonl" => Ok(Format::Json),
            _ => Err(LakeError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Ordered Hive-style partition dimensions.
///
/// Insertion order is the path segment order. No re-sorting happens here, so
/// callers pick the order (see [`PartitionKey::daily`] for the date layout).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartitionKey(Vec<(String, String)>);

impl PartitionKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// `year=YYYY/month=MM/day=DD` for the given date
    pub fn daily(date: NaiveDate) -> Self {
        Self(vec![
            ("year".to_string(), format!("{:04}", date.year())),
            ("month".to_string(), format!("{:02}", date.month())),
            ("day".to_string(), format!("{:02}", date.day())),
        ])
    }

    /// Adds a dimension, replacing the value in place if the name exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();

        if name.is_empty() || name.contains(['/', '=']) {
            return Err(LakeError::InvalidPartition(format!(
                "dimension name '{}' must be non-empty without '/' or '='",
                name
            )));
        }
        if value.is_empty() || value.contains('/') {
            return Err(LakeError::InvalidPartition(format!(
                "value '{}' for '{}' must be non-empty without '/'",
                value, name
            )));
        }

        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
        Ok(())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `k1=v1/k2=v2` in insertion order
    pub fn to_path(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Source names become a key path segment and a file name prefix.
pub fn validate_source_name(source: &str) -> Result<()> {
    if source.is_empty() || source.contains('/') || source.chars().any(char::is_whitespace) {
        return Err(LakeError::InvalidSource(source.to_string()));
    }
    Ok(())
}

/// Reserved ingestion metadata keys
pub mod metadata_keys {
    pub const SOURCE: &str = "source";
    pub const LAYER: &str = "layer";
    pub const PROCESSING_DATE: &str = "processing_date";
    pub const CHECKSUM: &str = "checksum";
    pub const FORMAT: &str = "format";
    pub const ROWS: &str = "rows";
    pub const COLUMNS: &str = "columns";
    pub const CREATED_AT: &str = "created_at";
    pub const CREATED_BY: &str = "created_by";
    pub const SOURCE_OBJECT: &str = "source_object";

    /// Always recomputed from the stored content
    pub const COMPUTED: [&str; 4] = [CHECKSUM, FORMAT, ROWS, COLUMNS];

    /// Describe the ingestion itself and cannot be replaced by caller entries
    pub const IDENTITY: [&str; 3] = [SOURCE, LAYER, PROCESSING_DATE];
}
