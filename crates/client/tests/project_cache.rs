//! Facade tests over an in-memory remote store and on-disk fixtures.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use atlas_cache::{
    DataKind, DownloadOptions, ProjectCache, ProjectCacheError, RemoteStore,
};
use atlas_cache_common::hash_bytes;
use atlas_cache_storage::StoreError;

#[derive(Default)]
struct FakeStore {
    manifests: BTreeMap<String, Vec<u8>>,
    objects: BTreeMap<String, Vec<u8>>,
}

#[async_trait]
impl RemoteStore for FakeStore {
    async fn list_manifests(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.manifests.keys().cloned().collect())
    }

    async fn get_manifest(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.manifests
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn download_object(
        &self,
        key: &str,
        dest: &Path,
        _progress: Option<&dyn atlas_cache_common::ProgressCallback<atlas_cache_common::TransferProgress>>,
    ) -> Result<(), StoreError> {
        let bytes: &Vec<u8> = self.objects.get(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        std::fs::write(dest, bytes).map_err(|e| StoreError::Io {
            path: dest.display().to_string(),
            message: e.to_string(),
        })
    }
}

fn manifest_name(version: &str) -> String {
    format!("releases/{version}/manifest.json")
}

fn add_release(store: &mut FakeStore, version: &str) {
    let csv_path: String = format!("metadata/WMB-10X/{version}/cell_metadata.csv");
    let csv_bytes: Vec<u8> = format!("{version} cell metadata").into_bytes();
    let gene_path: String = format!("metadata/WMB-10X/{version}/gene.csv");
    let gene_bytes: Vec<u8> = format!("{version} gene metadata").into_bytes();

    let document = serde_json::json!({
        "version": version,
        "resource_uri": "s3://test-bucket/",
        "directory_listing": { "WMB-10X": {"directories": {}} },
        "file_listing": {
            "WMB-10X": {
                "metadata": {
                    "cell_metadata": {
                        "files": {
                            "csv": {
                                "version": version,
                                "relative_path": csv_path,
                                "url": format!("https://test-bucket.s3.amazonaws.com/{csv_path}"),
                                "size": csv_bytes.len(),
                                "file_hash": hash_bytes(&csv_bytes),
                            }
                        }
                    },
                    "gene": {
                        "files": {
                            "csv": {
                                "version": version,
                                "relative_path": gene_path,
                                "url": format!("https://test-bucket.s3.amazonaws.com/{gene_path}"),
                                "size": gene_bytes.len(),
                                "file_hash": hash_bytes(&gene_bytes),
                            }
                        }
                    }
                }
            }
        }
    });
    store.manifests.insert(
        manifest_name(version),
        serde_json::to_vec(&document).unwrap(),
    );
    store.objects.insert(csv_path, csv_bytes);
    store.objects.insert(gene_path, gene_bytes);
}

#[tokio::test]
async fn test_construction_loads_latest_manifest() {
    let mut store: FakeStore = FakeStore::default();
    add_release(&mut store, "20230601");
    add_release(&mut store, "20240601");

    let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
    let cache: ProjectCache<FakeStore> =
        ProjectCache::from_store(dir.path(), store).await.unwrap();
    assert_eq!(
        cache.current_manifest(),
        Some(manifest_name("20240601").as_str())
    );
    assert_eq!(cache.manifest_file_names().len(), 2);
    assert_eq!(cache.list_directories().unwrap(), ["WMB-10X"]);
}

#[tokio::test]
async fn test_manifest_version_window_is_enforced() {
    let mut store: FakeStore = FakeStore::default();
    add_release(&mut store, "20220101");

    let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
    let result = ProjectCache::from_store(dir.path(), store).await;
    assert!(matches!(result, Err(ProjectCacheError::Version(_))));
}

#[tokio::test]
async fn test_load_manifest_outside_window_is_rejected() {
    let mut store: FakeStore = FakeStore::default();
    add_release(&mut store, "20240601");
    add_release(&mut store, "20220101");

    let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
    let mut cache: ProjectCache<FakeStore> =
        ProjectCache::from_store(dir.path(), store).await.unwrap();

    let result = cache.load_manifest(&manifest_name("20220101")).await;
    assert!(matches!(result, Err(ProjectCacheError::Version(_))));
}

#[tokio::test]
async fn test_get_file_path_downloads_in_cloud_mode() {
    let mut store: FakeStore = FakeStore::default();
    add_release(&mut store, "20240601");

    let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
    let mut cache: ProjectCache<FakeStore> =
        ProjectCache::from_store(dir.path(), store).await.unwrap();

    let path: PathBuf = cache
        .get_file_path("WMB-10X", "cell_metadata", DownloadOptions::default())
        .await
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "20240601 cell metadata"
    );
}

#[tokio::test]
async fn test_directory_metadata_and_sizes() {
    let mut store: FakeStore = FakeStore::default();
    add_release(&mut store, "20240601");

    let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
    let mut cache: ProjectCache<FakeStore> =
        ProjectCache::from_store(dir.path(), store).await.unwrap();

    assert_eq!(
        cache.list_metadata_files("WMB-10X").unwrap(),
        ["cell_metadata", "gene"]
    );
    // Both fixture files are tiny, so the size reports in MB
    let size: String = cache
        .get_directory_size("WMB-10X", DataKind::Metadata)
        .unwrap();
    assert!(size.ends_with(" MB"), "unexpected size string: {size}");

    let paths: Vec<PathBuf> = cache.get_directory_metadata("WMB-10X").await.unwrap();
    assert_eq!(paths.len(), 2);
    for path in &paths {
        assert!(path.is_file());
    }
}

#[tokio::test]
async fn test_absent_kind_is_an_error() {
    let mut store: FakeStore = FakeStore::default();
    add_release(&mut store, "20240601");

    let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
    let cache: ProjectCache<FakeStore> =
        ProjectCache::from_store(dir.path(), store).await.unwrap();

    let result = cache.list_image_volumes_files("WMB-10X");
    assert!(result.is_err());
}

#[tokio::test]
async fn test_local_mode_resolves_only_downloaded_files() {
    let mut store: FakeStore = FakeStore::default();
    add_release(&mut store, "20240601");

    // A cloud session downloads one of the two metadata files
    let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
    {
        let mut cloud: ProjectCache<FakeStore> =
            ProjectCache::from_store(dir.path(), store).await.unwrap();
        cloud
            .get_file_path("WMB-10X", "cell_metadata", DownloadOptions::default())
            .await
            .unwrap();
    }

    // A local-only session over the same directory sees what was fetched
    let mut local: ProjectCache = ProjectCache::from_local_cache(dir.path()).unwrap();
    assert_eq!(
        local.current_manifest(),
        Some(manifest_name("20240601").as_str())
    );

    let path: PathBuf = local
        .get_file_path("WMB-10X", "cell_metadata", DownloadOptions::default())
        .await
        .unwrap();
    assert!(path.is_file());

    let missing = local
        .get_file_path("WMB-10X", "gene", DownloadOptions::default())
        .await;
    assert!(matches!(
        missing,
        Err(ProjectCacheError::NotDownloaded { .. })
    ));

    // The directory convenience skips the missing file instead of failing
    let paths: Vec<PathBuf> = local.get_directory_metadata("WMB-10X").await.unwrap();
    assert_eq!(paths.len(), 1);
}

#[tokio::test]
async fn test_compare_manifests_through_facade() {
    let mut store: FakeStore = FakeStore::default();
    add_release(&mut store, "20230601");
    add_release(&mut store, "20240601");

    let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
    let mut cache: ProjectCache<FakeStore> =
        ProjectCache::from_store(dir.path(), store).await.unwrap();

    let comparison = cache
        .compare_manifests(&manifest_name("20240601"), &manifest_name("20230601"))
        .await
        .unwrap();
    // Same directory set and file identifiers; every file moved to a new
    // versioned path, so both count as changed
    assert!(comparison.directory_changes.new_dirs.is_empty());
    assert_eq!(
        comparison.metadata.changed_files,
        ["WMB-10X: cell_metadata", "WMB-10X: gene"]
    );
    assert!(comparison.metadata.new_files.is_empty());
    assert!(comparison.metadata.removed_files.is_empty());
}
