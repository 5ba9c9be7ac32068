//! Read-only cache over a directory populated by earlier downloads.

use std::path::{Path, PathBuf};

use tracing::warn;

use atlas_cache_model::{CacheFileAttributes, Manifest};

use crate::error::CacheError;
use crate::names::{discover_local_manifests, latest_manifest};

/// File name of the marker recording the most recently loaded manifest.
pub const LAST_USED_FILE_NAME: &str = "_manifest_last_used.txt";

/// Result of resolving a file to its local location.
#[derive(Debug, Clone)]
pub struct FilePathResult {
    /// Absolute path where the file lives (or would live) locally.
    pub local_path: PathBuf,
    /// Whether the file is present on the local filesystem.
    pub exists: bool,
    /// Full descriptor for the file.
    pub attributes: CacheFileAttributes,
}

/// A read-only view over a cache directory containing manifests and
/// previously-fetched files. Never touches the network: manifests are
/// discovered by globbing `releases/*/manifest.json` under the cache root,
/// and file existence is judged purely from filesystem presence.
#[derive(Debug)]
pub struct LocalCache {
    cache_root: PathBuf,
    manifest_file_names: Vec<String>,
    current_manifest: Option<Manifest>,
    current_manifest_name: Option<String>,
}

impl LocalCache {
    /// Open a local cache over an existing cache directory.
    ///
    /// # Arguments
    /// * `cache_root` - Directory holding manifests and downloaded files
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        let cache_root: PathBuf = cache_root.into();
        let manifest_file_names: Vec<String> = discover_local_manifests(&cache_root);
        Self {
            cache_root,
            manifest_file_names,
            current_manifest: None,
            current_manifest_name: None,
        }
    }

    /// The cache directory path.
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Sorted manifest names discoverable on disk.
    pub fn manifest_file_names(&self) -> &[String] {
        &self.manifest_file_names
    }

    /// The name of the currently loaded manifest, if any.
    pub fn current_manifest(&self) -> Option<&str> {
        self.current_manifest_name.as_deref()
    }

    /// The latest manifest available on disk.
    pub fn latest_manifest_file(&self) -> Option<&String> {
        latest_manifest(&self.manifest_file_names)
    }

    /// The currently loaded manifest.
    ///
    /// # Errors
    /// `CacheError::NoManifestLoaded` if no manifest has been loaded.
    pub fn manifest(&self) -> Result<&Manifest, CacheError> {
        self.current_manifest
            .as_ref()
            .ok_or(CacheError::NoManifestLoaded)
    }

    /// Load a manifest already present on disk.
    ///
    /// # Errors
    /// `CacheError::UnknownManifest` if `name` is not among the locally
    /// discoverable manifests; the error lists the valid names.
    pub fn load_manifest(&mut self, name: &str) -> Result<(), CacheError> {
        if !self.manifest_file_names.iter().any(|n| n == name) {
            return Err(CacheError::UnknownManifest {
                name: name.to_string(),
                valid_names: self.manifest_file_names.clone(),
            });
        }

        let manifest: Manifest = read_manifest_file(&self.cache_root, name)?;
        self.current_manifest = Some(manifest);
        self.current_manifest_name = Some(name.to_string());
        save_last_used(&self.cache_root, name);
        Ok(())
    }

    /// Parse a manifest on disk by name without making it current.
    ///
    /// # Errors
    /// `CacheError::UnknownManifest` if `name` is not discoverable locally.
    pub fn read_manifest(&self, name: &str) -> Result<Manifest, CacheError> {
        if !self.manifest_file_names.iter().any(|n| n == name) {
            return Err(CacheError::UnknownManifest {
                name: name.to_string(),
                valid_names: self.manifest_file_names.clone(),
            });
        }
        read_manifest_file(&self.cache_root, name)
    }

    /// Resolve a file identifier to its local path and report existence.
    ///
    /// Existence is computed purely from filesystem presence; no hash check
    /// is performed. A path that exists but is not a file is a fatal
    /// `NotAFile` error.
    pub fn get_file_path(
        &self,
        directory: &str,
        file_name: &str,
    ) -> Result<FilePathResult, CacheError> {
        let attributes: CacheFileAttributes =
            self.manifest()?.get_file_attributes(directory, file_name)?;
        let exists: bool = file_exists(&attributes.local_path)?;
        Ok(FilePathResult {
            local_path: attributes.local_path.clone(),
            exists,
            attributes,
        })
    }
}

/// Whether a local path holds a regular file.
///
/// # Errors
/// `CacheError::NotAFile` if the path exists but is not a file.
pub(crate) fn file_exists(local_path: &Path) -> Result<bool, CacheError> {
    if !local_path.exists() {
        return Ok(false);
    }
    if !local_path.is_file() {
        return Err(CacheError::NotAFile {
            path: local_path.display().to_string(),
        });
    }
    Ok(true)
}

/// Parse a manifest file stored below the cache root.
pub(crate) fn read_manifest_file(cache_root: &Path, name: &str) -> Result<Manifest, CacheError> {
    let manifest_path: PathBuf = cache_root.join(name);
    let bytes: Vec<u8> = std::fs::read(&manifest_path)
        .map_err(|e| CacheError::from_io(manifest_path.display().to_string(), e))?;
    Ok(Manifest::from_json_bytes(cache_root, &bytes)?)
}

/// Best-effort persist of the last-used-manifest marker. Read-only cache
/// roots are a supported mode, so failure is a warning rather than an
/// error.
pub(crate) fn save_last_used(cache_root: &Path, name: &str) {
    let marker_path: PathBuf = cache_root.join(LAST_USED_FILE_NAME);
    if let Err(e) = std::fs::write(&marker_path, name) {
        warn!(
            marker = %marker_path.display(),
            error = %e,
            "could not record last-used manifest; cache root may be read-only"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_cache_model::DataKind;

    fn manifest_json(version: &str) -> String {
        serde_json::json!({
            "version": version,
            "resource_uri": "s3://test-bucket/",
            "directory_listing": { "test_directory": {"directories": {}} },
            "file_listing": {
                "test_directory": {
                    "metadata": {
                        "metadata_file": {
                            "files": {
                                "csv": {
                                    "version": version,
                                    "relative_path": format!("metadata/test_directory/{version}/metadata_file.csv"),
                                    "url": format!("https://test-bucket.s3.amazonaws.com/metadata/test_directory/{version}/metadata_file.csv"),
                                    "size": 5678,
                                    "file_hash": format!("abcd{version}")
                                }
                            }
                        }
                    }
                }
            }
        })
        .to_string()
    }

    fn write_manifest(cache_root: &Path, version: &str) {
        let release_dir: PathBuf = cache_root.join("releases").join(version);
        std::fs::create_dir_all(&release_dir).unwrap();
        std::fs::write(release_dir.join("manifest.json"), manifest_json(version)).unwrap();
    }

    #[test]
    fn test_discovers_manifests_on_disk() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "20230101");
        write_manifest(dir.path(), "20240101");

        let cache: LocalCache = LocalCache::new(dir.path());
        assert_eq!(
            cache.manifest_file_names(),
            [
                "releases/20230101/manifest.json",
                "releases/20240101/manifest.json"
            ]
        );
        assert_eq!(
            cache.latest_manifest_file().unwrap(),
            "releases/20240101/manifest.json"
        );
    }

    #[test]
    fn test_load_unknown_manifest_lists_valid_names() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "20230101");

        let mut cache: LocalCache = LocalCache::new(dir.path());
        let result = cache.load_manifest("releases/20990101/manifest.json");
        match result {
            Err(CacheError::UnknownManifest { valid_names, .. }) => {
                assert_eq!(valid_names, ["releases/20230101/manifest.json"]);
            }
            other => panic!("expected UnknownManifest, got {other:?}"),
        }
    }

    #[test]
    fn test_load_manifest_and_query() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "20230101");

        let mut cache: LocalCache = LocalCache::new(dir.path());
        cache
            .load_manifest("releases/20230101/manifest.json")
            .unwrap();
        assert_eq!(
            cache.current_manifest(),
            Some("releases/20230101/manifest.json")
        );
        assert_eq!(cache.manifest().unwrap().version(), "20230101");

        let files: Vec<String> = cache
            .manifest()
            .unwrap()
            .list_files("test_directory", DataKind::Metadata)
            .unwrap();
        assert_eq!(files, ["metadata_file"]);
    }

    #[test]
    fn test_get_file_path_reports_existence_from_disk() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "20230101");

        let mut cache: LocalCache = LocalCache::new(dir.path());
        cache
            .load_manifest("releases/20230101/manifest.json")
            .unwrap();

        let missing: FilePathResult = cache
            .get_file_path("test_directory", "metadata_file")
            .unwrap();
        assert!(!missing.exists);

        // Drop the file on disk without any ledger involvement; the local
        // cache trusts whatever is there.
        std::fs::create_dir_all(missing.local_path.parent().unwrap()).unwrap();
        std::fs::write(&missing.local_path, b"data").unwrap();

        let present: FilePathResult = cache
            .get_file_path("test_directory", "metadata_file")
            .unwrap();
        assert!(present.exists);
        assert_eq!(present.attributes.file_type, "csv");
    }

    #[test]
    fn test_local_path_that_is_a_directory_is_fatal() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "20230101");

        let mut cache: LocalCache = LocalCache::new(dir.path());
        cache
            .load_manifest("releases/20230101/manifest.json")
            .unwrap();

        let resolved: FilePathResult = cache
            .get_file_path("test_directory", "metadata_file")
            .unwrap();
        std::fs::create_dir_all(&resolved.local_path).unwrap();

        let result = cache.get_file_path("test_directory", "metadata_file");
        assert!(matches!(result, Err(CacheError::NotAFile { .. })));
    }

    #[test]
    fn test_no_manifest_loaded() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let cache: LocalCache = LocalCache::new(dir.path());
        assert!(matches!(
            cache.manifest(),
            Err(CacheError::NoManifestLoaded)
        ));
    }
}
