//! Shared utilities for atlas-data-cache.
//!
//! This crate provides common functionality used across all atlas-data-cache
//! crates:
//! - Content-hash computation (MD5, the hash recorded in release manifests)
//! - Human-readable byte-size formatting
//! - Generic progress callback trait

pub mod hash;
pub mod progress;
pub mod size;

// Re-export commonly used items at crate root
pub use hash::{hash_bytes, hash_file, Md5Hasher};
pub use progress::{progress_fn, FnProgress, NoOpProgress, ProgressCallback, TransferProgress};
pub use size::format_directory_size;
