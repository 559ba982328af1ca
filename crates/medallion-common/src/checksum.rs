//! Content fingerprints for stored objects
//!
//! Digests here are provenance data written into object metadata. They are
//! not a security boundary and are not used to deduplicate content.

/// Hex-encoded MD5 digest of an in-memory buffer
pub fn compute_digest(data: &[u8]) -> String {
    hex::encode(md5::compute(data).0)
}
