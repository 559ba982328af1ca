//! Medallion Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the medallion lake workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`LakeError`] and the crate [`Result`] alias
//! - **Checksums**: content fingerprints attached to stored objects
//! - **Logging**: tracing subscriber bootstrap shared by all binaries
//! - **Types**: tiers, formats, partition keys and metadata key names
//!
//! # Example
//!
//! ```no_run
//! use medallion_common::types::{Format, Tier};
//!
//! fn describe(tier: &str, format: &str) -> medallion_common::Result<String> {
//!     let tier: Tier = tier.parse()?;
//!     let format: Format = format.parse()?;
//!     Ok(format!("{} objects stored as .{}", tier, format.extension()))
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{LakeError, Result};
