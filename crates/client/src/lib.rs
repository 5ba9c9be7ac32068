//! Manifest-driven local cache for published atlas datasets.
//!
//! Datasets are released as versioned snapshots described by a JSON
//! manifest. [`ProjectCache`] keeps a local mirror of the files an
//! application asks for, verifying every download against the hash the
//! manifest declares, and answers listing and size queries without
//! touching the network.
//!
//! ```no_run
//! use atlas_cache::{ProjectCache, DownloadOptions};
//!
//! # async fn demo() -> Result<(), atlas_cache::ProjectCacheError> {
//! let mut cache = ProjectCache::from_cache_dir("/data/atlas_cache").await?;
//! let path = cache
//!     .get_file_path("WMB-10X", "cell_metadata", DownloadOptions::default())
//!     .await?;
//! println!("metadata at {}", path.display());
//! # Ok(())
//! # }
//! ```

mod cache;
mod error;

pub use cache::{
    ProjectCache, DEFAULT_BUCKET, DEFAULT_LARGE_DOWNLOAD_WARNING_BYTES, MAX_MANIFEST_VERSION,
    MIN_MANIFEST_VERSION,
};
pub use error::{ProjectCacheError, VersionError};

pub use atlas_cache_model::{
    CacheFileAttributes, DataKind, DirectoryChanges, FileChanges, ManifestComparison,
};
pub use atlas_cache_s3::S3RemoteStore;
pub use atlas_cache_storage::{DownloadOptions, RemoteStore};
