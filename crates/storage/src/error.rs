//! Error types for cache operations.

use thiserror::Error;

use atlas_cache_model::ManifestError;

use crate::traits::StoreError;

/// Errors that can occur during cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Manifest parsing or lookup failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Remote store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The requested manifest name is not one of the valid names for this
    /// dataset.
    #[error(
        "Manifest to load ({name}) is not one of the valid manifest names \
         for this dataset. Valid names include: {valid_names:?}"
    )]
    UnknownManifest {
        name: String,
        valid_names: Vec<String>,
    },

    /// No manifest has been loaded into this cache yet.
    #[error("No manifest loaded; call load_manifest first")]
    NoManifestLoaded,

    /// The remote store lists no manifests at all for this dataset.
    #[error("No manifests are published for this dataset")]
    NoManifestsPublished,

    /// A local path exists but is not a file. Unrecoverable without user
    /// intervention.
    #[error("{path} exists, but is not a file; unsure how to proceed")]
    NotAFile { path: String },

    /// A component of a local destination path exists but is not a
    /// directory. Unrecoverable without user intervention.
    #[error("{path} exists, but is not a directory")]
    NotADirectory { path: String },

    /// Local I/O error.
    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    /// A file could not be downloaded with a matching hash within the
    /// retry budget. Signals a persistent integrity or connectivity
    /// problem rather than transient noise.
    #[error("Could not download {file} in {attempts} attempts")]
    DownloadFailed { file: String, attempts: u32 },
}

impl CacheError {
    /// Create an `Io` error from a `std::io::Error`.
    ///
    /// # Arguments
    /// * `path` - Path where the error occurred
    /// * `err` - The underlying I/O error
    pub fn from_io(path: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
