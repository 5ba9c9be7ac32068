//! The closed set of data kinds a release directory may publish.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the four data categories a directory may publish files under.
///
/// The set is closed: manifests never introduce kinds outside these four,
/// so lookups dispatch on this enum rather than raw strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// Tabular metadata files (cell annotations, cluster memberships).
    Metadata,
    /// Gene expression matrix files.
    ExpressionMatrices,
    /// Imaging volume files.
    ImageVolumes,
    /// MapMyCells mapping result files.
    #[serde(rename = "mapmycells")]
    MapMyCells,
}

impl DataKind {
    /// All kinds, in manifest key order.
    pub const ALL: [DataKind; 4] = [
        DataKind::Metadata,
        DataKind::ExpressionMatrices,
        DataKind::ImageVolumes,
        DataKind::MapMyCells,
    ];

    /// The key this kind uses inside a manifest's `file_listing` map.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Metadata => "metadata",
            DataKind::ExpressionMatrices => "expression_matrices",
            DataKind::ImageVolumes => "image_volumes",
            DataKind::MapMyCells => "mapmycells",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metadata" => Ok(DataKind::Metadata),
            "expression_matrices" => Ok(DataKind::ExpressionMatrices),
            "image_volumes" => Ok(DataKind::ImageVolumes),
            "mapmycells" => Ok(DataKind::MapMyCells),
            other => Err(format!("unknown data kind: {other}")),
        }
    }
}
