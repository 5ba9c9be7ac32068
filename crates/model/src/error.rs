//! Error types for manifest parsing and lookup.

use thiserror::Error;

/// Errors that can occur while parsing or querying a release manifest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// The manifest document could not be deserialized.
    #[error("Malformed manifest document: {message}")]
    Malformed { message: String },

    /// The requested directory is not part of this release.
    #[error("Directory {directory} not found in manifest")]
    DirectoryNotFound { directory: String },

    /// The requested data kind has no files in the directory. This is a
    /// normal state for directories that only publish some kinds, not a
    /// structural error.
    #[error("No {kind} files found in directory {directory}")]
    DataTypeNotInDirectory { directory: String, kind: String },

    /// No file with the requested tag exists anywhere under the directory.
    #[error("File {file_name} not found in directory {directory}")]
    FileNotFound {
        file_name: String,
        directory: String,
    },

    /// Multiple variants exist and the caller did not disambiguate.
    /// Recoverable by retrying with one of the listed qualified names.
    #[error(
        "File {file_name} found in directory {directory} but multiple \
         variants exist; specify the file name as one of {alternatives:?}"
    )]
    AmbiguousFile {
        file_name: String,
        directory: String,
        alternatives: Vec<String>,
    },

    /// `compare_manifests` was called with its arguments reversed.
    #[error(
        "Manifest comparison arguments out of order: version {newer_version} \
         does not sort on or after {older_version}"
    )]
    ComparisonOrder {
        newer_version: String,
        older_version: String,
    },
}
