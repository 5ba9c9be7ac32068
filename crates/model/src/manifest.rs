//! Deserialization and lookup for one release manifest document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use atlas_cache_common::format_directory_size;

use crate::attributes::CacheFileAttributes;
use crate::error::ManifestError;
use crate::kind::DataKind;

/// Wire format of one published file inside a manifest.
#[derive(Debug, Clone, Deserialize)]
struct FileRecord {
    version: String,
    relative_path: String,
    url: String,
    size: u64,
    file_hash: String,
}

/// A tag entry is either a single file (direct `files` map keyed by file
/// type) or a set of named variants, each with its own `files` map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FileEntry {
    Single {
        files: BTreeMap<String, FileRecord>,
    },
    Variants(BTreeMap<String, VariantEntry>),
}

#[derive(Debug, Clone, Deserialize)]
struct VariantEntry {
    files: BTreeMap<String, FileRecord>,
}

/// Top-level manifest document.
#[derive(Debug, Deserialize)]
struct ManifestDocument {
    version: String,
    resource_uri: String,
    /// Only the directory names are queried; the per-directory descriptors
    /// are carried opaquely.
    directory_listing: BTreeMap<String, serde_json::Value>,
    file_listing: BTreeMap<String, BTreeMap<String, BTreeMap<String, FileEntry>>>,
}

/// One immutable snapshot of one release manifest.
///
/// Holds the deserialized document plus the cache root used to assign local
/// paths to file descriptors. Never mutated after construction; a cache
/// replaces its `Manifest` wholesale when a different version is loaded.
#[derive(Debug)]
pub struct Manifest {
    cache_root: PathBuf,
    document: ManifestDocument,
    directory_list: Vec<String>,
}

impl Manifest {
    /// Parse a manifest from raw JSON bytes.
    ///
    /// # Arguments
    /// * `cache_root` - Directory local copies of files are stored under
    /// * `bytes` - The manifest JSON document
    ///
    /// # Errors
    /// `ManifestError::Malformed` if the document does not deserialize.
    pub fn from_json_bytes(cache_root: &Path, bytes: &[u8]) -> Result<Self, ManifestError> {
        let document: ManifestDocument =
            serde_json::from_slice(bytes).map_err(|e| ManifestError::Malformed {
                message: e.to_string(),
            })?;

        let mut directory_list: Vec<String> =
            document.directory_listing.keys().cloned().collect();
        directory_list.sort();

        Ok(Self {
            cache_root: cache_root.to_path_buf(),
            document,
            directory_list,
        })
    }

    /// The version of the dataset this manifest describes (`YYYYMMDD`).
    pub fn version(&self) -> &str {
        &self.document.version
    }

    /// The URI of the dataset this manifest describes.
    pub fn resource_uri(&self) -> &str {
        &self.document.resource_uri
    }

    /// All directories that are part of this release, lexicographically
    /// sorted.
    pub fn list_directories(&self) -> &[String] {
        &self.directory_list
    }

    /// List the file identifiers available under a directory for one data
    /// kind.
    ///
    /// Identifiers are either a bare tag (single-variant file) or
    /// `tag/variant` for multi-variant files. The result is sorted and
    /// duplicate-free.
    ///
    /// # Errors
    /// - `DirectoryNotFound` if the directory is not in this release.
    /// - `DataTypeNotInDirectory` if the kind's subtree is absent or empty;
    ///   an empty listing is never returned.
    pub fn list_files(
        &self,
        directory: &str,
        kind: DataKind,
    ) -> Result<Vec<String>, ManifestError> {
        let directory_data = self.directory_files(directory)?;

        let subtree: &BTreeMap<String, FileEntry> =
            directory_data
                .get(kind.as_str())
                .ok_or_else(|| ManifestError::DataTypeNotInDirectory {
                    directory: directory.to_string(),
                    kind: kind.to_string(),
                })?;

        let mut output: Vec<String> = Vec::new();
        for (tag, entry) in subtree {
            match entry {
                FileEntry::Single { .. } => output.push(tag.clone()),
                FileEntry::Variants(variants) => {
                    output.extend(variants.keys().map(|v| format!("{tag}/{v}")));
                }
            }
        }
        output.sort();
        output.dedup();

        if output.is_empty() {
            return Err(ManifestError::DataTypeNotInDirectory {
                directory: directory.to_string(),
                kind: kind.to_string(),
            });
        }
        Ok(output)
    }

    /// Resolve a file identifier to its descriptor.
    ///
    /// `file_name` is parsed on the first `/` to separate the tag from an
    /// optional variant. Every kind subtree under the directory is searched
    /// for the tag; a direct `files` map resolves immediately, otherwise the
    /// requested variant is matched.
    ///
    /// # Errors
    /// - `AmbiguousFile` if the entry has multiple variants and no variant
    ///   was requested; the error lists all valid `tag/variant` names.
    /// - `FileNotFound` if no tag matches anywhere under the directory.
    pub fn get_file_attributes(
        &self,
        directory: &str,
        file_name: &str,
    ) -> Result<CacheFileAttributes, ManifestError> {
        let (tag, variant) = match file_name.split_once('/') {
            Some((tag, variant)) => (tag, Some(variant)),
            None => (file_name, None),
        };

        let directory_data = self.directory_files(directory)?;

        for tags in directory_data.values() {
            let Some(entry) = tags.get(tag) else {
                continue;
            };
            match entry {
                FileEntry::Single { files } => {
                    return self.build_attributes(files);
                }
                FileEntry::Variants(variants) => match variant {
                    Some(requested) => {
                        if let Some(variant_entry) = variants.get(requested) {
                            return self.build_attributes(&variant_entry.files);
                        }
                        // Requested variant absent here; the tag may still
                        // resolve under another kind subtree.
                    }
                    None => {
                        let alternatives: Vec<String> =
                            variants.keys().map(|v| format!("{tag}/{v}")).collect();
                        return Err(ManifestError::AmbiguousFile {
                            file_name: file_name.to_string(),
                            directory: directory.to_string(),
                            alternatives,
                        });
                    }
                },
            }
        }

        Err(ManifestError::FileNotFound {
            file_name: file_name.to_string(),
            directory: directory.to_string(),
        })
    }

    /// Aggregate size in bytes of all files of one kind in a directory.
    pub fn get_directory_size_bytes(
        &self,
        directory: &str,
        kind: DataKind,
    ) -> Result<u64, ManifestError> {
        let file_list: Vec<String> = self.list_files(directory, kind)?;
        let mut total_size: u64 = 0;
        for file_name in &file_list {
            let attributes: CacheFileAttributes =
                self.get_file_attributes(directory, file_name)?;
            total_size += attributes.file_size;
        }
        Ok(total_size)
    }

    /// Aggregate size of all files of one kind in a directory, as a
    /// human-readable `"<value> GB"` / `"<value> MB"` string.
    pub fn get_directory_size(
        &self,
        directory: &str,
        kind: DataKind,
    ) -> Result<String, ManifestError> {
        let total_size: u64 = self.get_directory_size_bytes(directory, kind)?;
        Ok(format_directory_size(total_size))
    }

    fn directory_files(
        &self,
        directory: &str,
    ) -> Result<&BTreeMap<String, BTreeMap<String, FileEntry>>, ManifestError> {
        self.document
            .file_listing
            .get(directory)
            .ok_or_else(|| ManifestError::DirectoryNotFound {
                directory: directory.to_string(),
            })
    }

    /// Build a descriptor from a `files` map; the map holds a single entry
    /// keyed by file type.
    fn build_attributes(
        &self,
        files: &BTreeMap<String, FileRecord>,
    ) -> Result<CacheFileAttributes, ManifestError> {
        let (file_type, record) =
            files
                .iter()
                .next()
                .ok_or_else(|| ManifestError::Malformed {
                    message: "empty files map in manifest entry".to_string(),
                })?;

        Ok(CacheFileAttributes {
            url: record.url.clone(),
            version: record.version.clone(),
            file_size: record.size,
            local_path: self.cache_root.join(&record.relative_path),
            relative_path: record.relative_path.clone(),
            file_type: file_type.clone(),
            file_hash: record.file_hash.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_manifest_json() -> String {
        serde_json::json!({
            "version": "20230630",
            "resource_uri": "s3://test-bucket/",
            "directory_listing": {
                "WMB-10X": {"directories": {}},
                "Zhuang-C57BL6J": {"directories": {}}
            },
            "file_listing": {
                "WMB-10X": {
                    "metadata": {
                        "cell_metadata": {
                            "files": {
                                "csv": {
                                    "version": "20230630",
                                    "relative_path": "metadata/WMB-10X/20230630/cell_metadata.csv",
                                    "url": "https://test-bucket.s3.amazonaws.com/metadata/WMB-10X/20230630/cell_metadata.csv",
                                    "size": 5678,
                                    "file_hash": "abcd20230630"
                                }
                            }
                        }
                    },
                    "expression_matrices": {
                        "WMB-10Xv2-TH": {
                            "log2": {
                                "files": {
                                    "h5ad": {
                                        "version": "20230630",
                                        "relative_path": "expression_matrices/WMB-10X/20230630/WMB-10Xv2-TH-log2.h5ad",
                                        "url": "https://test-bucket.s3.amazonaws.com/expression_matrices/WMB-10X/20230630/WMB-10Xv2-TH-log2.h5ad",
                                        "size": 1073741824u64,
                                        "file_hash": "eeee20230630"
                                    }
                                }
                            },
                            "raw": {
                                "files": {
                                    "h5ad": {
                                        "version": "20230630",
                                        "relative_path": "expression_matrices/WMB-10X/20230630/WMB-10Xv2-TH-raw.h5ad",
                                        "url": "https://test-bucket.s3.amazonaws.com/expression_matrices/WMB-10X/20230630/WMB-10Xv2-TH-raw.h5ad",
                                        "size": 536870912u64,
                                        "file_hash": "ffff20230630"
                                    }
                                }
                            }
                        }
                    }
                },
                "Zhuang-C57BL6J": {
                    "metadata": {
                        "cell_metadata": {
                            "files": {
                                "csv": {
                                    "version": "20230630",
                                    "relative_path": "metadata/Zhuang-C57BL6J/20230630/cell_metadata.csv",
                                    "url": "https://test-bucket.s3.amazonaws.com/metadata/Zhuang-C57BL6J/20230630/cell_metadata.csv",
                                    "size": 314572800u64,
                                    "file_hash": "1234"
                                }
                            }
                        }
                    }
                }
            }
        })
        .to_string()
    }

    fn load() -> Manifest {
        Manifest::from_json_bytes(&PathBuf::from("/cache"), test_manifest_json().as_bytes())
            .unwrap()
    }

    #[test]
    fn test_malformed_document() {
        let result = Manifest::from_json_bytes(&PathBuf::from("/cache"), b"[1, 2, 3]");
        assert!(matches!(result, Err(ManifestError::Malformed { .. })));
    }

    #[test]
    fn test_version_and_uri() {
        let manifest: Manifest = load();
        assert_eq!(manifest.version(), "20230630");
        assert_eq!(manifest.resource_uri(), "s3://test-bucket/");
    }

    #[test]
    fn test_list_directories_sorted() {
        let manifest: Manifest = load();
        assert_eq!(manifest.list_directories(), ["WMB-10X", "Zhuang-C57BL6J"]);
    }

    #[test]
    fn test_list_files_single_variant() {
        let manifest: Manifest = load();
        let files: Vec<String> = manifest.list_files("WMB-10X", DataKind::Metadata).unwrap();
        assert_eq!(files, ["cell_metadata"]);
    }

    #[test]
    fn test_list_files_multi_variant() {
        let manifest: Manifest = load();
        let files: Vec<String> = manifest
            .list_files("WMB-10X", DataKind::ExpressionMatrices)
            .unwrap();
        assert_eq!(files, ["WMB-10Xv2-TH/log2", "WMB-10Xv2-TH/raw"]);
    }

    #[test]
    fn test_list_files_absent_kind_is_error_not_empty() {
        let manifest: Manifest = load();
        let result = manifest.list_files("Zhuang-C57BL6J", DataKind::ImageVolumes);
        assert!(matches!(
            result,
            Err(ManifestError::DataTypeNotInDirectory { .. })
        ));
    }

    #[test]
    fn test_list_files_unknown_directory() {
        let manifest: Manifest = load();
        let result = manifest.list_files("no-such-dir", DataKind::Metadata);
        assert!(matches!(result, Err(ManifestError::DirectoryNotFound { .. })));
    }

    #[test]
    fn test_get_file_attributes_single() {
        let manifest: Manifest = load();
        let attrs: CacheFileAttributes = manifest
            .get_file_attributes("WMB-10X", "cell_metadata")
            .unwrap();
        assert_eq!(attrs.file_type, "csv");
        assert_eq!(attrs.file_size, 5678);
        assert_eq!(attrs.file_hash, "abcd20230630");
        assert_eq!(
            attrs.local_path,
            PathBuf::from("/cache/metadata/WMB-10X/20230630/cell_metadata.csv")
        );
        assert_eq!(
            attrs.relative_path,
            "metadata/WMB-10X/20230630/cell_metadata.csv"
        );
    }

    #[test]
    fn test_get_file_attributes_variant() {
        let manifest: Manifest = load();
        let attrs: CacheFileAttributes = manifest
            .get_file_attributes("WMB-10X", "WMB-10Xv2-TH/raw")
            .unwrap();
        assert_eq!(attrs.file_hash, "ffff20230630");
        assert_eq!(attrs.file_size, 536870912);
    }

    #[test]
    fn test_get_file_attributes_ambiguous() {
        let manifest: Manifest = load();
        let result = manifest.get_file_attributes("WMB-10X", "WMB-10Xv2-TH");
        match result {
            Err(ManifestError::AmbiguousFile { alternatives, .. }) => {
                assert_eq!(alternatives, ["WMB-10Xv2-TH/log2", "WMB-10Xv2-TH/raw"]);
            }
            other => panic!("expected AmbiguousFile, got {other:?}"),
        }
    }

    #[test]
    fn test_get_file_attributes_not_found() {
        let manifest: Manifest = load();
        let result = manifest.get_file_attributes("WMB-10X", "no_such_file");
        assert!(matches!(result, Err(ManifestError::FileNotFound { .. })));
    }

    #[test]
    fn test_get_file_attributes_idempotent() {
        let manifest: Manifest = load();
        let first: CacheFileAttributes = manifest
            .get_file_attributes("WMB-10X", "WMB-10Xv2-TH/log2")
            .unwrap();
        let second: CacheFileAttributes = manifest
            .get_file_attributes("WMB-10X", "WMB-10Xv2-TH/log2")
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_directory_size_gigabytes() {
        let manifest: Manifest = load();
        // 1 GiB + 512 MiB of expression matrices
        let size: String = manifest
            .get_directory_size("WMB-10X", DataKind::ExpressionMatrices)
            .unwrap();
        assert_eq!(size, "1.5 GB");
    }

    #[test]
    fn test_directory_size_under_one_gigabyte_reports_megabytes() {
        let manifest: Manifest = load();
        // 300 MiB of metadata
        let size: String = manifest
            .get_directory_size("Zhuang-C57BL6J", DataKind::Metadata)
            .unwrap();
        assert_eq!(size, "300.0 MB");
    }
}
