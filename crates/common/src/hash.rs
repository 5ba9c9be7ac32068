//! Content-hash computation utilities.
//!
//! Release manifests record an MD5 hex digest for every published file. MD5
//! is used here as an integrity check against truncated or corrupted
//! transfers, not as a security primitive.

use std::io::Read;
use std::path::Path;

use md5::{Digest, Md5};

/// Read buffer size for file hashing (1 MB, amortizes I/O overhead).
const HASH_BLOCK_SIZE: usize = 1024 * 1024;

/// Compute the MD5 hash of a byte slice.
///
/// # Arguments
/// * `data` - Bytes to hash
///
/// # Returns
/// 32-character lowercase hex string (128 bits).
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher: Md5Hasher = Md5Hasher::new();
    hasher.update(data);
    hasher.finish_hex()
}

/// Compute the MD5 hash of a file.
///
/// Reads the file in fixed-size blocks to avoid loading the entire file
/// into memory.
///
/// # Arguments
/// * `path` - Path to the file to hash
///
/// # Returns
/// 32-character lowercase hex string (128 bits).
///
/// # Errors
/// Returns error if the file cannot be read.
pub fn hash_file(path: &Path) -> Result<String, std::io::Error> {
    let mut file: std::fs::File = std::fs::File::open(path)?;
    let mut hasher: Md5Hasher = Md5Hasher::new();
    let mut buffer: Vec<u8> = vec![0u8; HASH_BLOCK_SIZE];

    loop {
        let bytes_read: usize = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finish_hex())
}

/// Streaming hasher for incremental MD5 hashing.
///
/// Use this when hashing data incrementally, such as while writing
/// a download stream to disk.
pub struct Md5Hasher {
    inner: Md5,
}

impl Md5Hasher {
    /// Create a new streaming hasher.
    pub fn new() -> Self {
        Self { inner: Md5::new() }
    }

    /// Update the hasher with additional data.
    ///
    /// # Arguments
    /// * `data` - Bytes to add to the hash computation
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the hash as a 32-char hex string.
    pub fn finish_hex(self) -> String {
        let digest = self.inner.finalize();
        let mut out: String = String::with_capacity(32);
        for byte in digest {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }
}

impl Default for Md5Hasher {
    fn default() -> Self {
        Self::new()
    }
}
