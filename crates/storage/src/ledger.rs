//! Durable record of verified downloads.
//!
//! The ledger distinguishes "file bytes present on disk" from "file bytes
//! present on disk AND verified downloaded by this cache". A half-written
//! file left behind by a crashed download must not be trusted, so trust is
//! ledger-gated rather than existence-gated.
//!
//! On disk the ledger is a JSON object mapping absolute local paths to the
//! MD5 hash each file was verified against, written with sorted keys. It is
//! persisted immediately after every mutation so a crash never loses trust
//! state. The write is a plain read-modify-write with no locking: concurrent
//! cache instances sharing one cache root are unsupported.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::CacheError;

/// File name of the ledger, co-located with the cache root.
pub const LEDGER_FILE_NAME: &str = "_downloaded_data.json";

/// Mapping of absolute local paths to verified content hashes.
#[derive(Debug)]
pub struct DownloadLedger {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl DownloadLedger {
    /// Load the ledger beside a cache root, or start empty if no ledger
    /// file exists yet.
    ///
    /// # Arguments
    /// * `cache_root` - The cache directory the ledger belongs to
    pub fn load(cache_root: &Path) -> Result<Self, CacheError> {
        let path: PathBuf = cache_root.join(LEDGER_FILE_NAME);
        let entries: BTreeMap<String, String> = if path.is_file() {
            let bytes: Vec<u8> = std::fs::read(&path)
                .map_err(|e| CacheError::from_io(path.display().to_string(), e))?;
            serde_json::from_slice(&bytes).map_err(|e| CacheError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    /// Whether a ledger file existed on disk when this ledger was loaded
    /// or was persisted since.
    pub fn file_exists(&self) -> bool {
        self.path.is_file()
    }

    /// Whether `local_path` is recorded as verified with exactly `hash`.
    pub fn is_verified(&self, local_path: &Path, hash: &str) -> bool {
        self.entries
            .get(&local_path.display().to_string())
            .is_some_and(|recorded| recorded == hash)
    }

    /// Record a verified download and persist immediately.
    ///
    /// # Arguments
    /// * `local_path` - Absolute path of the verified file
    /// * `hash` - The content hash the file was verified against
    pub fn record(&mut self, local_path: &Path, hash: &str) -> Result<(), CacheError> {
        let key: String = local_path.display().to_string();
        if self.entries.get(&key).map(String::as_str) == Some(hash) {
            // Already logged; nothing to do.
            return Ok(());
        }
        self.entries.insert(key, hash.to_string());
        self.persist()
    }

    /// Drop a path from the ledger (if present) and persist.
    pub fn remove(&mut self, local_path: &Path) -> Result<(), CacheError> {
        let key: String = local_path.display().to_string();
        if self.entries.remove(&key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    /// Replace the entire ledger contents and persist. Used when
    /// reconstructing the ledger by re-hashing files already on disk.
    pub fn replace_all(&mut self, entries: BTreeMap<String, String>) -> Result<(), CacheError> {
        self.entries = entries;
        self.persist()
    }

    /// Number of recorded downloads.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) -> Result<(), CacheError> {
        // BTreeMap serializes with sorted keys, keeping the file diffable.
        let json: String = serde_json::to_string_pretty(&self.entries).map_err(|e| {
            CacheError::Io {
                path: self.path.display().to_string(),
                message: e.to_string(),
            }
        })?;
        std::fs::write(&self.path, json)
            .map_err(|e| CacheError::from_io(self.path.display().to_string(), e))
    }
}
