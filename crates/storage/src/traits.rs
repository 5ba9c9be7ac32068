//! Remote store interface implemented by each backend.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use atlas_cache_common::{ProgressCallback, TransferProgress};

/// Errors surfaced by a remote store backend.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Object not found in the store.
    #[error("Object not found: {key}")]
    NotFound { key: String },

    /// Network-level failure.
    #[error("Network error for {key}: {message}")]
    Network { key: String, message: String },

    /// Local I/O failure while persisting fetched bytes.
    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },
}

/// Read-only access to the object store a dataset is published in.
///
/// The cache layer is parameterized over this interface; local-filesystem
/// and S3 backends are the two implementations. All methods are probes or
/// fetches; the cache never writes to the remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List all manifest keys published for this dataset, sorted
    /// lexicographically. Implementations must paginate: a bucket may hold
    /// thousands of manifest objects.
    async fn list_manifests(&self) -> Result<Vec<String>, StoreError>;

    /// Fetch the raw bytes of one manifest document.
    ///
    /// # Arguments
    /// * `key` - Manifest object key (`releases/<version>/manifest.json`)
    async fn get_manifest(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Stream an object's bytes into a local file, reporting progress.
    ///
    /// The destination's parent directory must already exist. Progress
    /// totals come from the transfer response's declared length, when the
    /// backend knows it.
    ///
    /// # Arguments
    /// * `key` - Object key to fetch
    /// * `dest` - Local file path to write
    /// * `progress` - Optional progress callback
    async fn download_object(
        &self,
        key: &str,
        dest: &Path,
        progress: Option<&dyn ProgressCallback<TransferProgress>>,
    ) -> Result<(), StoreError>;
}
