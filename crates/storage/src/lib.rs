//! Cache orchestration over a remote object store.
//!
//! This crate provides the storage layer of the atlas data cache:
//!
//! - [`RemoteStore`]: the backend interface a cache is parameterized over
//! - [`LocalCache`]: read-only access to an already-populated cache directory
//! - [`CloudCache`]: download-capable cache with a verified-download ledger,
//!   staleness advisories, and a bounded retry protocol
//! - [`DownloadLedger`]: the durable record of verified downloads

pub mod cloud;
pub mod error;
pub mod ledger;
pub mod local;
pub mod names;
pub mod traits;

pub use cloud::{CloudCache, DownloadOptions, MAX_DOWNLOAD_ATTEMPTS};
pub use error::CacheError;
pub use ledger::{DownloadLedger, LEDGER_FILE_NAME};
pub use local::{FilePathResult, LocalCache, LAST_USED_FILE_NAME};
pub use names::{latest_manifest, MANIFEST_FILE_NAME, MANIFEST_PREFIX};
pub use traits::{RemoteStore, StoreError};
