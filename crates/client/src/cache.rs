//! Project-level cache facade.
//!
//! `ProjectCache` is the entry point applications use: it owns either a
//! download-capable cloud cache or a read-only local cache behind one API,
//! loads a manifest at construction, and enforces the manifest version
//! window this client release understands.

use std::path::{Path, PathBuf};

use tracing::warn;

use atlas_cache_common::format_directory_size;
use atlas_cache_model::{compare_manifests, DataKind, Manifest, ManifestComparison};
use atlas_cache_s3::S3RemoteStore;
use atlas_cache_storage::{
    CacheError, CloudCache, DownloadOptions, FilePathResult, LocalCache, RemoteStore,
    LAST_USED_FILE_NAME,
};

use crate::error::{ProjectCacheError, VersionError};

/// Bucket the atlas datasets are published in.
pub const DEFAULT_BUCKET: &str = "allen-brain-cell-atlas";

/// Earliest manifest version this client release understands (inclusive).
pub const MIN_MANIFEST_VERSION: &str = "20230101";

/// Earliest manifest version this client release no longer understands
/// (exclusive upper bound).
pub const MAX_MANIFEST_VERSION: &str = "20300101";

/// Default directory size past which a download gets a heads-up warning.
pub const DEFAULT_LARGE_DOWNLOAD_WARNING_BYTES: u64 = 10 * 1024 * 1024 * 1024;

enum Backend<S: RemoteStore> {
    Cloud(CloudCache<S>),
    Local(LocalCache),
}

/// One dataset cache, cloud-backed or local-only.
///
/// Holds exactly one loaded manifest at a time; every accessor answers
/// against that manifest. Loading a manifest whose version falls outside
/// `[MIN_MANIFEST_VERSION, MAX_MANIFEST_VERSION)` fails with
/// [`VersionError`].
pub struct ProjectCache<S: RemoteStore = S3RemoteStore> {
    backend: Backend<S>,
    large_download_warning_bytes: u64,
}

impl ProjectCache<S3RemoteStore> {
    /// Open a cloud-backed cache against a public S3 bucket and load the
    /// last-used (or latest) manifest.
    ///
    /// # Arguments
    /// * `cache_dir` - Directory to hold manifests and downloaded files
    /// * `bucket` - Bucket the dataset is published in
    pub async fn from_s3_cache(
        cache_dir: impl Into<PathBuf>,
        bucket: impl Into<String>,
    ) -> Result<Self, ProjectCacheError> {
        let store: S3RemoteStore = S3RemoteStore::connect(bucket).await;
        Self::from_store(cache_dir, store).await
    }

    /// Open a read-only cache over an already-populated directory and load
    /// the last-used (or latest downloaded) manifest.
    pub fn from_local_cache(cache_dir: impl Into<PathBuf>) -> Result<Self, ProjectCacheError> {
        let local: LocalCache = LocalCache::new(cache_dir);
        let mut cache: Self = Self {
            backend: Backend::Local(local),
            large_download_warning_bytes: DEFAULT_LARGE_DOWNLOAD_WARNING_BYTES,
        };
        cache.load_last_manifest_local()?;
        cache.check_version()?;
        Ok(cache)
    }

    /// Open a cache over a directory, choosing cloud or local mode by
    /// probing whether the directory is writable. A read-only directory
    /// (a shared dataset mount, say) gets local mode with a warning.
    pub async fn from_cache_dir(
        cache_dir: impl Into<PathBuf>,
    ) -> Result<Self, ProjectCacheError> {
        let cache_dir: PathBuf = cache_dir.into();
        if directory_is_writable(&cache_dir) {
            Self::from_s3_cache(cache_dir, DEFAULT_BUCKET).await
        } else {
            warn!(
                cache_dir = %cache_dir.display(),
                "cache directory is not writable; opening in local-only mode, \
                 no new files can be downloaded"
            );
            Self::from_local_cache(cache_dir)
        }
    }
}

impl<S: RemoteStore> ProjectCache<S> {
    /// Open a cloud-backed cache over an explicit remote store and load the
    /// last-used (or latest) manifest.
    pub async fn from_store(
        cache_dir: impl Into<PathBuf>,
        store: S,
    ) -> Result<Self, ProjectCacheError> {
        let cloud: CloudCache<S> = CloudCache::new(cache_dir, store).await?;
        let mut cache: Self = Self {
            backend: Backend::Cloud(cloud),
            large_download_warning_bytes: DEFAULT_LARGE_DOWNLOAD_WARNING_BYTES,
        };
        cache.load_last_manifest().await?;
        Ok(cache)
    }

    /// The name of the currently loaded manifest, if any.
    pub fn current_manifest(&self) -> Option<&str> {
        match &self.backend {
            Backend::Cloud(cloud) => cloud.current_manifest(),
            Backend::Local(local) => local.current_manifest(),
        }
    }

    /// All manifest names this cache can load: published manifests in cloud
    /// mode, locally-downloaded ones in local mode.
    pub fn manifest_file_names(&self) -> &[String] {
        match &self.backend {
            Backend::Cloud(cloud) => cloud.manifest_file_names(),
            Backend::Local(local) => local.manifest_file_names(),
        }
    }

    /// The latest manifest available to this cache.
    pub fn latest_manifest_file(&self) -> Option<&String> {
        match &self.backend {
            Backend::Cloud(cloud) => cloud.latest_manifest_file(),
            Backend::Local(local) => local.latest_manifest_file(),
        }
    }

    /// Load a manifest by name.
    pub async fn load_manifest(&mut self, name: &str) -> Result<(), ProjectCacheError> {
        match &mut self.backend {
            Backend::Cloud(cloud) => cloud.load_manifest(name).await?,
            Backend::Local(local) => local.load_manifest(name)?,
        }
        self.check_version()
    }

    /// Load the latest manifest available to this cache.
    pub async fn load_latest_manifest(&mut self) -> Result<(), ProjectCacheError> {
        match &mut self.backend {
            Backend::Cloud(cloud) => cloud.load_latest_manifest().await?,
            Backend::Local(local) => {
                let latest: String = local
                    .latest_manifest_file()
                    .cloned()
                    .ok_or(CacheError::NoManifestsPublished)?;
                local.load_manifest(&latest)?;
            }
        }
        self.check_version()
    }

    /// Load the manifest used in the previous session, falling back to the
    /// latest when no usable record exists.
    pub async fn load_last_manifest(&mut self) -> Result<(), ProjectCacheError> {
        match &mut self.backend {
            Backend::Cloud(cloud) => {
                cloud.load_last_manifest().await?;
                self.check_version()
            }
            Backend::Local(_) => {
                self.load_last_manifest_local()?;
                self.check_version()
            }
        }
    }

    /// All directories in the loaded release, sorted.
    pub fn list_directories(&self) -> Result<&[String], ProjectCacheError> {
        Ok(self.manifest()?.list_directories())
    }

    /// Metadata file identifiers in a directory.
    pub fn list_metadata_files(&self, directory: &str) -> Result<Vec<String>, ProjectCacheError> {
        Ok(self.manifest()?.list_files(directory, DataKind::Metadata)?)
    }

    /// Expression-matrix file identifiers in a directory.
    pub fn list_expression_matrices_files(
        &self,
        directory: &str,
    ) -> Result<Vec<String>, ProjectCacheError> {
        Ok(self
            .manifest()?
            .list_files(directory, DataKind::ExpressionMatrices)?)
    }

    /// Image-volume file identifiers in a directory.
    pub fn list_image_volumes_files(
        &self,
        directory: &str,
    ) -> Result<Vec<String>, ProjectCacheError> {
        Ok(self
            .manifest()?
            .list_files(directory, DataKind::ImageVolumes)?)
    }

    /// MapMyCells file identifiers in a directory.
    pub fn list_mapmycells_files(
        &self,
        directory: &str,
    ) -> Result<Vec<String>, ProjectCacheError> {
        Ok(self
            .manifest()?
            .list_files(directory, DataKind::MapMyCells)?)
    }

    /// Human-readable aggregate size of one kind of data in a directory.
    pub fn get_directory_size(
        &self,
        directory: &str,
        kind: DataKind,
    ) -> Result<String, ProjectCacheError> {
        Ok(self.manifest()?.get_directory_size(directory, kind)?)
    }

    /// Adjust the directory-size threshold for the pre-download warning.
    pub fn set_large_download_warning_bytes(&mut self, bytes: u64) {
        self.large_download_warning_bytes = bytes;
    }

    /// Resolve one file to a local path, downloading it in cloud mode.
    ///
    /// In local mode the file must already be on disk; a missing file is
    /// [`ProjectCacheError::NotDownloaded`].
    pub async fn get_file_path(
        &mut self,
        directory: &str,
        file_name: &str,
        opts: DownloadOptions,
    ) -> Result<PathBuf, ProjectCacheError> {
        match &mut self.backend {
            Backend::Cloud(cloud) => {
                Ok(cloud.download_file(directory, file_name, opts, None).await?)
            }
            Backend::Local(local) => {
                let resolved: FilePathResult = local.get_file_path(directory, file_name)?;
                if !resolved.exists {
                    return Err(ProjectCacheError::NotDownloaded {
                        path: resolved.local_path.display().to_string(),
                    });
                }
                Ok(resolved.local_path)
            }
        }
    }

    /// All metadata files of a directory, downloaded in cloud mode.
    pub async fn get_directory_metadata(
        &mut self,
        directory: &str,
    ) -> Result<Vec<PathBuf>, ProjectCacheError> {
        self.get_directory_data(directory, DataKind::Metadata, DownloadOptions::default())
            .await
    }

    /// All expression matrices of a directory, downloaded in cloud mode.
    pub async fn get_directory_expression_matrices(
        &mut self,
        directory: &str,
    ) -> Result<Vec<PathBuf>, ProjectCacheError> {
        self.get_directory_data(
            directory,
            DataKind::ExpressionMatrices,
            DownloadOptions::default(),
        )
        .await
    }

    /// All image volumes of a directory, downloaded in cloud mode.
    pub async fn get_directory_image_volumes(
        &mut self,
        directory: &str,
    ) -> Result<Vec<PathBuf>, ProjectCacheError> {
        self.get_directory_data(
            directory,
            DataKind::ImageVolumes,
            DownloadOptions::default(),
        )
        .await
    }

    /// All MapMyCells files of a directory, downloaded in cloud mode.
    pub async fn get_directory_mapmycells(
        &mut self,
        directory: &str,
    ) -> Result<Vec<PathBuf>, ProjectCacheError> {
        self.get_directory_data(directory, DataKind::MapMyCells, DownloadOptions::default())
            .await
    }

    /// All files of one kind in a directory.
    ///
    /// Cloud mode warns before starting an unusually large download, then
    /// fetches sequentially. Local mode resolves paths and skips (with a
    /// warning) any file not on disk.
    pub async fn get_directory_data(
        &mut self,
        directory: &str,
        kind: DataKind,
        opts: DownloadOptions,
    ) -> Result<Vec<PathBuf>, ProjectCacheError> {
        match &mut self.backend {
            Backend::Cloud(cloud) => {
                let total_bytes: u64 = cloud
                    .manifest()?
                    .get_directory_size_bytes(directory, kind)?;
                if total_bytes > self.large_download_warning_bytes {
                    warn!(
                        directory,
                        kind = %kind,
                        size = %format_directory_size(total_bytes),
                        "large download ahead; this may take a while"
                    );
                }
                Ok(cloud.download_directory(directory, kind, opts, None).await?)
            }
            Backend::Local(local) => {
                let file_names: Vec<String> = local.manifest()?.list_files(directory, kind)?;
                let mut local_paths: Vec<PathBuf> = Vec::with_capacity(file_names.len());
                for file_name in &file_names {
                    let resolved: FilePathResult = local.get_file_path(directory, file_name)?;
                    if resolved.exists {
                        local_paths.push(resolved.local_path);
                    } else {
                        warn!(
                            directory,
                            file_name,
                            "file is missing from the local cache; skipping"
                        );
                    }
                }
                Ok(local_paths)
            }
        }
    }

    /// Structural differences between two manifest versions.
    ///
    /// # Arguments
    /// * `newer_name` - Name of the newer manifest
    /// * `older_name` - Name of the older manifest
    pub async fn compare_manifests(
        &mut self,
        newer_name: &str,
        older_name: &str,
    ) -> Result<ManifestComparison, ProjectCacheError> {
        match &mut self.backend {
            Backend::Cloud(cloud) => Ok(cloud.compare_manifests(newer_name, older_name).await?),
            Backend::Local(local) => {
                let newer: Manifest = local.read_manifest(newer_name)?;
                let older: Manifest = local.read_manifest(older_name)?;
                Ok(compare_manifests(&newer, &older)?)
            }
        }
    }

    fn manifest(&self) -> Result<&Manifest, CacheError> {
        match &self.backend {
            Backend::Cloud(cloud) => cloud.manifest(),
            Backend::Local(local) => local.manifest(),
        }
    }

    fn load_last_manifest_local(&mut self) -> Result<(), ProjectCacheError> {
        let Backend::Local(local) = &mut self.backend else {
            return Ok(());
        };

        let marker_path: PathBuf = local.cache_root().join(LAST_USED_FILE_NAME);
        let recorded: Option<String> = std::fs::read_to_string(marker_path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .filter(|name| local.manifest_file_names().iter().any(|n| n == name));

        let name: String = match recorded {
            Some(name) => name,
            None => local
                .latest_manifest_file()
                .cloned()
                .ok_or(CacheError::NoManifestsPublished)?,
        };
        local.load_manifest(&name)?;
        Ok(())
    }

    fn check_version(&self) -> Result<(), ProjectCacheError> {
        let version: &str = self.manifest()?.version();
        if version < MIN_MANIFEST_VERSION || version >= MAX_MANIFEST_VERSION {
            return Err(ProjectCacheError::Version(VersionError {
                version: version.to_string(),
                minimum: MIN_MANIFEST_VERSION.to_string(),
                maximum: MAX_MANIFEST_VERSION.to_string(),
            }));
        }
        Ok(())
    }
}

/// Probe whether new files can be created under a directory.
fn directory_is_writable(cache_dir: &Path) -> bool {
    if std::fs::create_dir_all(cache_dir).is_err() {
        return false;
    }
    let probe: PathBuf = cache_dir.join(".write_probe");
    match std::fs::write(&probe, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}
