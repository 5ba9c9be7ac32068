//! Comparison of two release manifests.
//!
//! Produces directory-level added/removed sets and, per data kind, the file
//! identifiers that were added, removed, or changed between two releases.
//! A file whose attributes changed without a version bump is reported as a
//! manifest error: the publishing convention is that any content change
//! must bump the version string.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::attributes::CacheFileAttributes;
use crate::error::ManifestError;
use crate::kind::DataKind;
use crate::manifest::Manifest;

/// Directories added or removed between two releases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryChanges {
    /// Directories present only in the newer manifest, sorted.
    pub new_dirs: Vec<String>,
    /// Directories present only in the older manifest, sorted.
    pub removed_dirs: Vec<String>,
}

/// File-level changes for one data kind.
///
/// File identifiers are qualified as `"directory: file"`. All lists are
/// lexicographically sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileChanges {
    /// Files present only in the newer manifest.
    pub new_files: Vec<String>,
    /// Files present only in the older manifest.
    pub removed_files: Vec<String>,
    /// Files present in both whose attributes and version both changed.
    pub changed_files: Vec<String>,
    /// Files present in both whose attributes changed while the version
    /// stayed the same; signals an authoring mistake in the published
    /// manifest.
    pub manifest_errors: Vec<String>,
}

/// Full comparison report between two release manifests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestComparison {
    pub directory_changes: DirectoryChanges,
    pub metadata: FileChanges,
    pub expression_matrices: FileChanges,
    pub image_volumes: FileChanges,
    pub mapmycells: FileChanges,
}

impl ManifestComparison {
    /// File changes for one data kind.
    pub fn for_kind(&self, kind: DataKind) -> &FileChanges {
        match kind {
            DataKind::Metadata => &self.metadata,
            DataKind::ExpressionMatrices => &self.expression_matrices,
            DataKind::ImageVolumes => &self.image_volumes,
            DataKind::MapMyCells => &self.mapmycells,
        }
    }
}

/// Compare two manifests, the newer one first.
///
/// # Arguments
/// * `newer` - The newer of the two manifests
/// * `older` - The older of the two manifests
///
/// # Errors
/// `ManifestError::ComparisonOrder` if `newer`'s version string does not
/// sort on or after `older`'s. Version ordering is plain string comparison,
/// valid because the `YYYYMMDD` format is fixed-width and zero-padded.
pub fn compare_manifests(
    newer: &Manifest,
    older: &Manifest,
) -> Result<ManifestComparison, ManifestError> {
    if newer.version() < older.version() {
        return Err(ManifestError::ComparisonOrder {
            newer_version: newer.version().to_string(),
            older_version: older.version().to_string(),
        });
    }

    let mut comparison: ManifestComparison = ManifestComparison {
        directory_changes: compare_directories(newer, older),
        ..Default::default()
    };

    for kind in DataKind::ALL {
        let changes: FileChanges = compare_files(newer, older, kind)?;
        match kind {
            DataKind::Metadata => comparison.metadata = changes,
            DataKind::ExpressionMatrices => comparison.expression_matrices = changes,
            DataKind::ImageVolumes => comparison.image_volumes = changes,
            DataKind::MapMyCells => comparison.mapmycells = changes,
        }
    }

    Ok(comparison)
}

fn compare_directories(newer: &Manifest, older: &Manifest) -> DirectoryChanges {
    let newer_dirs: BTreeSet<&String> = newer.list_directories().iter().collect();
    let older_dirs: BTreeSet<&String> = older.list_directories().iter().collect();

    DirectoryChanges {
        new_dirs: newer_dirs
            .difference(&older_dirs)
            .map(|d| (*d).clone())
            .collect(),
        removed_dirs: older_dirs
            .difference(&newer_dirs)
            .map(|d| (*d).clone())
            .collect(),
    }
}

fn compare_files(
    newer: &Manifest,
    older: &Manifest,
    kind: DataKind,
) -> Result<FileChanges, ManifestError> {
    let newer_files: BTreeSet<String> = qualified_files(newer, kind)?;
    let older_files: BTreeSet<String> = qualified_files(older, kind)?;

    let mut changes: FileChanges = FileChanges {
        new_files: newer_files.difference(&older_files).cloned().collect(),
        removed_files: older_files.difference(&newer_files).cloned().collect(),
        ..Default::default()
    };

    for qualified in newer_files.intersection(&older_files) {
        let Some((directory, file_name)) = qualified.split_once(": ") else {
            continue;
        };
        let newer_attrs: CacheFileAttributes = newer.get_file_attributes(directory, file_name)?;
        let older_attrs: CacheFileAttributes = older.get_file_attributes(directory, file_name)?;

        if newer_attrs == older_attrs {
            continue;
        }
        if newer_attrs.version == older_attrs.version {
            changes.manifest_errors.push(qualified.clone());
        } else {
            changes.changed_files.push(qualified.clone());
        }
    }
    changes.changed_files.sort();
    changes.manifest_errors.sort();

    Ok(changes)
}

/// All file identifiers of one kind across a manifest, qualified as
/// `"directory: file"`. Directories that do not publish the kind are
/// skipped.
fn qualified_files(manifest: &Manifest, kind: DataKind) -> Result<BTreeSet<String>, ManifestError> {
    let mut output: BTreeSet<String> = BTreeSet::new();
    for directory in manifest.list_directories() {
        match manifest.list_files(directory, kind) {
            Ok(files) => {
                output.extend(files.into_iter().map(|f| format!("{directory}: {f}")));
            }
            Err(ManifestError::DataTypeNotInDirectory { .. }) => continue,
            Err(other) => return Err(other),
        }
    }
    Ok(output)
}
