//! Immutable metadata record for one published file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identity, location, and integrity metadata for one remote file.
///
/// Constructed only by [`crate::Manifest`] when resolving a file lookup;
/// immutable thereafter. Equality is structural over all fields.
///
/// `relative_path` is the single identity key: it is both the object-store
/// key for fetches and the placement below the cache root, so
/// `local_path == cache_root / relative_path` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheFileAttributes {
    /// Full URL of the file in the object store.
    pub url: String,
    /// Version (date string, `YYYYMMDD`) the file was published under.
    pub version: String,
    /// Size of the file in bytes, as recorded in the manifest.
    pub file_size: u64,
    /// Absolute path where the file lives (or will live) locally.
    pub local_path: PathBuf,
    /// Path relative to the cache root; doubles as the object-store key.
    pub relative_path: String,
    /// File type tag (extension, e.g. `csv` or `h5ad`).
    pub file_type: String,
    /// MD5 hex digest of the file contents.
    pub file_hash: String,
}
