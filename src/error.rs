//! Error types for the label-to-property mapping engine
//!
//! Every error knows which stage of a conversion it belongs to so that
//! operator-facing messages can say where the run stopped.

use std::fmt;

use thiserror::Error;

use crate::properties::PropertyKind;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, MappingError>;

/// Conversion stage an error originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Catalog,
    Validation,
    Substitution,
    Io,
    Config,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Catalog => "catalog resolution",
            Stage::Validation => "validation",
            Stage::Substitution => "substitution",
            Stage::Io => "volume i/o",
            Stage::Config => "configuration",
        };
        f.write_str(name)
    }
}

/// Mapping engine errors
#[derive(Error, Debug)]
pub enum MappingError {
    /// Segmentation tool id is not in the catalog
    #[error("unknown segmentation tool '{0}'")]
    UnknownTool(String),

    /// Tool is known but the version has no catalog entry
    #[error("unsupported version '{version}' for tool '{tool}'")]
    UnsupportedToolVersion { tool: String, version: String },

    /// Property assignment to a label id outside the resolved catalog
    #[error("label id {0} is not part of the resolved catalog")]
    UnknownLabelId(u32),

    /// Voxels carry values that are not label ids of the catalog
    #[error("{count} voxel(s) carry values outside the label catalog (first: {first})")]
    InvalidVoxelValue { count: usize, first: f64 },

    /// Replacement chosen for invalid voxels is itself not a valid label
    #[error("replacement value {0} is not in the label catalog")]
    InvalidReplacement(f64),

    /// No literature value and no safe fallback for this tissue/property
    #[error("{kind} for tissue '{tissue}' is not supported yet")]
    UnsupportedPropertyForTissue { tissue: String, kind: PropertyKind },

    /// Standard deviation for Gaussian sampling is negative or not finite
    #[error("invalid standard deviation {std_dev} for tissue '{tissue}'")]
    InvalidStdDev { tissue: String, std_dev: f64 },

    /// A label catalog has to be resolved before this operation
    #[error("no label catalog has been resolved for this volume")]
    CatalogNotResolved,

    /// Two arrays that must share a shape do not
    #[error("shape mismatch: expected {expected} voxels, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Property tag could not be parsed
    #[error("unknown property kind '{0}'")]
    UnknownPropertyKind(String),

    /// NIfTI decoding or encoding failure
    #[error("nifti: {0}")]
    Nifti(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid options: {0}")]
    Config(#[from] serde_json::Error),
}

impl MappingError {
    /// Stage of the conversion that produced this error
    pub fn stage(&self) -> Stage {
        match self {
            MappingError::UnknownTool(_)
            | MappingError::UnsupportedToolVersion { .. }
            | MappingError::UnknownLabelId(_) => Stage::Catalog,
            MappingError::InvalidVoxelValue { .. }
            | MappingError::InvalidReplacement(_)
            | MappingError::ShapeMismatch { .. } => Stage::Validation,
            MappingError::UnsupportedPropertyForTissue { .. }
            | MappingError::CatalogNotResolved => Stage::Substitution,
            MappingError::Nifti(_) | MappingError::Io(_) => Stage::Io,
            MappingError::UnknownPropertyKind(_)
            | MappingError::InvalidStdDev { .. }
            | MappingError::Config(_) => Stage::Config,
        }
    }

    /// Message prefixed with the failing stage, for terminal output
    pub fn report(&self) -> String {
        format!("{} failed: {}", self.stage(), self)
    }
}
