//! Release manifest model for atlas-data-cache.
//!
//! A release manifest is a versioned JSON snapshot describing every directory
//! and file published for one dataset release. This crate deserializes one
//! manifest document and answers listing, lookup, and size queries against
//! it, plus computes the differences between two manifest versions.
//!
//! Each [`Manifest`] instance represents the data for one and only one
//! manifest document. Instances are immutable after construction.

mod attributes;
mod compare;
mod error;
mod kind;
mod manifest;

pub use attributes::CacheFileAttributes;
pub use compare::{compare_manifests, DirectoryChanges, FileChanges, ManifestComparison};
pub use error::ManifestError;
pub use kind::DataKind;
pub use manifest::Manifest;
