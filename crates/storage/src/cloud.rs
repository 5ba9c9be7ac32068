//! Download-capable cache over a remote object store.
//!
//! `CloudCache` layers remote manifest discovery, staleness advisories, the
//! download ledger, and the verified-download protocol on top of the local
//! cache behavior. It is generic over [`RemoteStore`], so the same
//! orchestration drives both the S3 backend and test fakes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use atlas_cache_common::{hash_file, ProgressCallback, TransferProgress};
use atlas_cache_model::{
    compare_manifests as compare_documents, CacheFileAttributes, DataKind, Manifest,
    ManifestComparison,
};

use crate::error::CacheError;
use crate::ledger::{DownloadLedger, LEDGER_FILE_NAME};
use crate::local::{file_exists, read_manifest_file, save_last_used, LAST_USED_FILE_NAME};
use crate::names::{discover_local_manifests, latest_manifest};
use crate::traits::RemoteStore;

/// Maximum number of transfer attempts before a download is declared
/// failed. Repeated hash mismatches indicate a persistent integrity or
/// connectivity problem, not transient noise.
pub const MAX_DOWNLOAD_ATTEMPTS: u32 = 10;

/// Per-download behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadOptions {
    /// Re-download even if a verified copy is already on disk.
    pub force: bool,
    /// Accept the transferred bytes without hash verification. The declared
    /// manifest hash is still recorded in the ledger.
    pub skip_hash_check: bool,
}

/// A cache that can populate itself from a remote object store.
///
/// Holds at most one loaded manifest at a time. Downloads are sequential;
/// there is never more than one transfer in flight, and the ledger has a
/// single writer.
pub struct CloudCache<S: RemoteStore> {
    cache_root: PathBuf,
    store: S,
    manifest_file_names: Vec<String>,
    current_manifest: Option<Manifest>,
    current_manifest_name: Option<String>,
    ledger: DownloadLedger,
    // Latest-release name we already warned about, so a session loading
    // several outdated manifests nags only once per release.
    last_warned_latest: Option<String>,
}

impl<S: RemoteStore> CloudCache<S> {
    /// Open (or create) a cache directory backed by a remote store.
    ///
    /// Lists the manifests published in the store and loads the download
    /// ledger. If files are already present under the cache root but no
    /// ledger exists, warns that those files will not be trusted until the
    /// ledger is reconstructed.
    ///
    /// # Arguments
    /// * `cache_root` - Directory to hold manifests and downloaded files
    /// * `store` - Remote store the dataset is published in
    pub async fn new(cache_root: impl Into<PathBuf>, store: S) -> Result<Self, CacheError> {
        let cache_root: PathBuf = cache_root.into();
        std::fs::create_dir_all(&cache_root)
            .map_err(|e| CacheError::from_io(cache_root.display().to_string(), e))?;

        let mut manifest_file_names: Vec<String> = store.list_manifests().await?;
        manifest_file_names.sort();

        let ledger: DownloadLedger = DownloadLedger::load(&cache_root)?;
        if !ledger.file_exists() && has_unledgered_files(&cache_root) {
            warn!(
                cache_root = %cache_root.display(),
                "found pre-existing data files but no download ledger; these files \
                 will be re-downloaded on access unless the ledger is rebuilt with \
                 construct_local_manifest()"
            );
        }

        Ok(Self {
            cache_root,
            store,
            manifest_file_names,
            current_manifest: None,
            current_manifest_name: None,
            ledger,
            last_warned_latest: None,
        })
    }

    /// The cache directory path.
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// The remote store this cache fetches from.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Sorted names of every manifest published in the remote store.
    pub fn manifest_file_names(&self) -> &[String] {
        &self.manifest_file_names
    }

    /// The name of the currently loaded manifest, if any.
    pub fn current_manifest(&self) -> Option<&str> {
        self.current_manifest_name.as_deref()
    }

    /// The latest manifest published in the remote store.
    pub fn latest_manifest_file(&self) -> Option<&String> {
        latest_manifest(&self.manifest_file_names)
    }

    /// Sorted names of the manifests already downloaded to disk.
    pub fn list_all_downloaded_manifests(&self) -> Vec<String> {
        discover_local_manifests(&self.cache_root)
    }

    /// The latest manifest already downloaded to disk.
    pub fn latest_downloaded_manifest_file(&self) -> Option<String> {
        self.list_all_downloaded_manifests().into_iter().max()
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

    /// Load a manifest by name, fetching it from the remote store if it is
    /// not on disk yet.
    ///
    /// Loading anything other than the latest published manifest logs a
    /// staleness warning, once per latest release per session.
    ///
    /// # Errors
    /// `CacheError::UnknownManifest` if `name` is not among the published
    /// manifests; the error lists the valid names.
    pub async fn load_manifest(&mut self, name: &str) -> Result<(), CacheError> {
        if !self.manifest_file_names.iter().any(|n| n == name) {
            return Err(CacheError::UnknownManifest {
                name: name.to_string(),
                valid_names: self.manifest_file_names.clone(),
            });
        }

        if let Some(latest) = self.latest_manifest_file().cloned() {
            if name != latest && self.last_warned_latest.as_deref() != Some(latest.as_str()) {
                warn!(
                    requested = name,
                    latest = %latest,
                    "loading an outdated manifest; a newer data release is available"
                );
                self.last_warned_latest = Some(latest);
            }
        }

        self.fetch_manifest_if_missing(name).await?;
        let manifest: Manifest = read_manifest_file(&self.cache_root, name)?;
        self.current_manifest = Some(manifest);
        self.current_manifest_name = Some(name.to_string());
        save_last_used(&self.cache_root, name);
        Ok(())
    }

    /// Load the manifest recorded as last used, falling back to the latest
    /// published manifest when no usable record exists.
    pub async fn load_last_manifest(&mut self) -> Result<(), CacheError> {
        let marker_path: PathBuf = self.cache_root.join(LAST_USED_FILE_NAME);
        let recorded: Option<String> = std::fs::read_to_string(&marker_path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let Some(name) = recorded else {
            return self.load_latest_manifest().await;
        };

        if !self.manifest_file_names.iter().any(|n| n == &name) {
            warn!(
                recorded = %name,
                "last-used manifest is no longer published; loading the latest instead"
            );
            return self.load_latest_manifest().await;
        }

        self.load_manifest(&name).await
    }

    /// Load the latest manifest published in the remote store.
    ///
    /// If a manifest has already been downloaded and the remote latest is
    /// newer, warns that previously-downloaded files may be superseded.
    ///
    /// # Errors
    /// `CacheError::NoManifestsPublished` if the store lists no manifests.
    pub async fn load_latest_manifest(&mut self) -> Result<(), CacheError> {
        let latest: String = self
            .latest_manifest_file()
            .cloned()
            .ok_or(CacheError::NoManifestsPublished)?;

        if let Some(downloaded) = self.latest_downloaded_manifest_file() {
            if downloaded != latest {
                warn!(
                    newest_on_disk = %downloaded,
                    latest = %latest,
                    "the latest release is newer than any manifest on disk; files \
                     from older releases may be downloaded again under new paths"
                );
            }
        }

        self.load_manifest(&latest).await
    }

    /// Resolve a file identifier against the loaded manifest without
    /// downloading anything. Returns the descriptor only; whether a trusted
    /// copy is on disk is decided by [`Self::download_file`].
    pub fn get_file_attributes(
        &self,
        directory: &str,
        file_name: &str,
    ) -> Result<CacheFileAttributes, CacheError> {
        Ok(self.manifest()?.get_file_attributes(directory, file_name)?)
    }

    /// Download one file, or return its path immediately if a verified copy
    /// is already on disk.
    ///
    /// A file that is on disk but has no matching ledger entry is treated as
    /// untrusted (a crashed download may have left partial bytes) and is
    /// re-downloaded. Each attempt streams the object to its destination and
    /// verifies the MD5 digest against the manifest; a mismatch deletes the
    /// corrupt copy and retries, up to [`MAX_DOWNLOAD_ATTEMPTS`] attempts.
    ///
    /// # Arguments
    /// * `directory` - Dataset directory the file belongs to
    /// * `file_name` - File identifier (`tag` or `tag/variant`)
    /// * `opts` - Force and hash-check switches
    /// * `progress` - Optional per-transfer progress callback
    ///
    /// # Returns
    /// The local path of the verified file.
    pub async fn download_file(
        &mut self,
        directory: &str,
        file_name: &str,
        opts: DownloadOptions,
        progress: Option<&dyn ProgressCallback<TransferProgress>>,
    ) -> Result<PathBuf, CacheError> {
        let attributes: CacheFileAttributes = self.get_file_attributes(directory, file_name)?;
        self.download_by_attributes(&attributes, opts, progress)
            .await?;
        Ok(attributes.local_path)
    }

    /// Download every file of one kind in a dataset directory.
    ///
    /// Transfers run sequentially; the first fatal error propagates and
    /// already-downloaded files are kept.
    ///
    /// # Returns
    /// The local paths of all verified files, in listing order.
    pub async fn download_directory(
        &mut self,
        directory: &str,
        kind: DataKind,
        opts: DownloadOptions,
        progress: Option<&dyn ProgressCallback<TransferProgress>>,
    ) -> Result<Vec<PathBuf>, CacheError> {
        let file_names: Vec<String> = self.manifest()?.list_files(directory, kind)?;
        let mut local_paths: Vec<PathBuf> = Vec::with_capacity(file_names.len());
        for file_name in &file_names {
            let local_path: PathBuf = self
                .download_file(directory, file_name, opts, progress)
                .await?;
            local_paths.push(local_path);
        }
        Ok(local_paths)
    }

    /// Compare two manifests by name, fetching either from the remote store
    /// if it is not on disk. Neither manifest needs to be the currently
    /// loaded one, and the loaded manifest is left untouched.
    ///
    /// # Arguments
    /// * `newer_name` - Name of the newer manifest
    /// * `older_name` - Name of the older manifest
    pub async fn compare_manifests(
        &mut self,
        newer_name: &str,
        older_name: &str,
    ) -> Result<ManifestComparison, CacheError> {
        let newer: Manifest = self.read_manifest_by_name(newer_name).await?;
        let older: Manifest = self.read_manifest_by_name(older_name).await?;
        Ok(compare_documents(&newer, &older)?)
    }

    /// Rebuild the download ledger by re-hashing every data file under the
    /// cache root. Recovery path for a deleted or lost ledger: afterwards,
    /// files whose bytes still match their manifest hash are trusted again.
    ///
    /// # Returns
    /// The number of files hashed into the rebuilt ledger.
    pub fn construct_local_manifest(&mut self) -> Result<usize, CacheError> {
        let mut entries: BTreeMap<String, String> = BTreeMap::new();
        for entry in WalkDir::new(&self.cache_root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            if !is_data_file(entry.path()) {
                continue;
            }
            let file_hash: String = hash_file(entry.path())
                .map_err(|e| CacheError::from_io(entry.path().display().to_string(), e))?;
            entries.insert(entry.path().display().to_string(), file_hash);
        }
        let count: usize = entries.len();
        self.ledger.replace_all(entries)?;
        Ok(count)
    }

    async fn download_by_attributes(
        &mut self,
        attributes: &CacheFileAttributes,
        opts: DownloadOptions,
        progress: Option<&dyn ProgressCallback<TransferProgress>>,
    ) -> Result<(), CacheError> {
        let local_path: &Path = &attributes.local_path;

        if opts.force {
            self.ledger.remove(local_path)?;
        }

        if file_exists(local_path)? {
            if self.ledger.is_verified(local_path, &attributes.file_hash) {
                debug!(path = %local_path.display(), "verified copy already on disk");
                return Ok(());
            }
            // Present but unverified (or force). Partial bytes from a crashed
            // transfer must not survive into the retry loop.
            debug!(
                path = %local_path.display(),
                "file on disk is not ledger-verified; re-downloading"
            );
            self.ledger.remove(local_path)?;
            std::fs::remove_file(local_path)
                .map_err(|e| CacheError::from_io(local_path.display().to_string(), e))?;
        }

        ensure_parent_dir(local_path)?;

        for attempt in 1..=MAX_DOWNLOAD_ATTEMPTS {
            debug!(
                key = %attributes.relative_path,
                attempt,
                "downloading object"
            );
            self.store
                .download_object(&attributes.relative_path, local_path, progress)
                .await?;

            if opts.skip_hash_check {
                self.ledger.record(local_path, &attributes.file_hash)?;
                return Ok(());
            }

            let actual_hash: String = hash_file(local_path)
                .map_err(|e| CacheError::from_io(local_path.display().to_string(), e))?;
            if actual_hash == attributes.file_hash {
                self.ledger.record(local_path, &attributes.file_hash)?;
                return Ok(());
            }

            debug!(
                key = %attributes.relative_path,
                attempt,
                expected = %attributes.file_hash,
                actual = %actual_hash,
                "hash mismatch; deleting corrupt copy"
            );
            std::fs::remove_file(local_path)
                .map_err(|e| CacheError::from_io(local_path.display().to_string(), e))?;
        }

        Err(CacheError::DownloadFailed {
            file: attributes.relative_path.clone(),
            attempts: MAX_DOWNLOAD_ATTEMPTS,
        })
    }

    async fn fetch_manifest_if_missing(&mut self, name: &str) -> Result<(), CacheError> {
        let manifest_path: PathBuf = self.cache_root.join(name);
        if manifest_path.is_file() {
            return Ok(());
        }
        let bytes: Vec<u8> = self.store.get_manifest(name).await?;
        ensure_parent_dir(&manifest_path)?;
        std::fs::write(&manifest_path, bytes)
            .map_err(|e| CacheError::from_io(manifest_path.display().to_string(), e))
    }

    async fn read_manifest_by_name(&mut self, name: &str) -> Result<Manifest, CacheError> {
        if !self.manifest_file_names.iter().any(|n| n == name) {
            return Err(CacheError::UnknownManifest {
                name: name.to_string(),
                valid_names: self.manifest_file_names.clone(),
            });
        }
        self.fetch_manifest_if_missing(name).await?;
        read_manifest_file(&self.cache_root, name)
    }
}

/// Create the parent directory chain for a destination file.
///
/// # Errors
/// `CacheError::NotADirectory` if an existing path component is not a
/// directory.
fn ensure_parent_dir(local_path: &Path) -> Result<(), CacheError> {
    let Some(parent) = local_path.parent() else {
        return Ok(());
    };
    for ancestor in parent.ancestors() {
        if ancestor.exists() && !ancestor.is_dir() {
            return Err(CacheError::NotADirectory {
                path: ancestor.display().to_string(),
            });
        }
    }
    std::fs::create_dir_all(parent)
        .map_err(|e| CacheError::from_io(parent.display().to_string(), e))
}

/// Whether a path under the cache root holds dataset bytes rather than
/// cache bookkeeping (manifests, the ledger, the last-used marker).
fn is_data_file(path: &Path) -> bool {
    if path.extension().is_some_and(|ext| ext == "json") {
        return false;
    }
    !path
        .file_name()
        .is_some_and(|name| name == LEDGER_FILE_NAME || name == LAST_USED_FILE_NAME)
}

fn has_unledgered_files(cache_root: &Path) -> bool {
    WalkDir::new(cache_root)
        .into_iter()
        .filter_map(Result::ok)
        .any(|e| e.file_type().is_file() && is_data_file(e.path()))
}
