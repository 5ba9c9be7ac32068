//! Error types for the project cache facade.

use thiserror::Error;

use atlas_cache_model::ManifestError;
use atlas_cache_storage::CacheError;

/// A loaded manifest's version falls outside the window this client
/// release supports.
#[derive(Error, Debug)]
#[error(
    "Manifest version {version} is not compatible with this client; \
     supported versions are >= {minimum} and < {maximum}. Upgrade the \
     client or load a manifest inside that window."
)]
pub struct VersionError {
    pub version: String,
    pub minimum: String,
    pub maximum: String,
}

/// Errors surfaced by the project cache facade.
#[derive(Error, Debug)]
pub enum ProjectCacheError {
    /// Underlying cache operation failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Manifest lookup failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Manifest version incompatible with this client release.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// A file was requested from a local-only cache but has never been
    /// downloaded.
    #[error("{path} is not present in the local cache; use a cloud-backed cache to download it")]
    NotDownloaded { path: String },
}
