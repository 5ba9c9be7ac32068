//! Manifest naming conventions.
//!
//! Manifests live under a fixed object-store prefix as
//! `releases/<version>/manifest.json`, where `<version>` is a zero-padded
//! `YYYYMMDD` date. Because the format is fixed-width, lexicographic
//! ordering of names equals date ordering; "latest" is simply the maximum.

use std::path::Path;

/// Object-store prefix all manifests live under.
pub const MANIFEST_PREFIX: &str = "releases/";

/// File name of a manifest inside its version directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// The lexicographically-latest name in a list of manifest names.
pub fn latest_manifest(names: &[String]) -> Option<&String> {
    names.iter().max()
}

/// Enumerate the manifests already on disk under a cache root.
///
/// Looks for `releases/*/manifest.json` and returns the matching names
/// (relative to the cache root), sorted.
pub fn discover_local_manifests(cache_root: &Path) -> Vec<String> {
    let releases_dir = cache_root.join(MANIFEST_PREFIX);
    let Ok(entries) = std::fs::read_dir(&releases_dir) else {
        return Vec::new();
    };

    let mut output: Vec<String> = Vec::new();
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let manifest_path = entry.path().join(MANIFEST_FILE_NAME);
        if !manifest_path.is_file() {
            continue;
        }
        if let Some(version) = entry.file_name().to_str() {
            output.push(format!("{MANIFEST_PREFIX}{version}/{MANIFEST_FILE_NAME}"));
        }
    }
    output.sort();
    output
}
