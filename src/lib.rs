//! mrprop-core: label-to-property mapping for segmented volumes
//!
//! Converts a labeled segmentation into physical property maps
//! (susceptibility, relaxation, proton density, electrical properties) by
//! substituting every label id with a literature value, or with values sampled
//! around it.
//!
//! # Modules
//! - `properties`: per-tissue literature table
//! - `catalog`: per-tool, per-version label conventions
//! - `registry`: label records bound to tissue names
//! - `validate`: voxel integrity checks and correction policies
//! - `substitute`: piecewise substitution
//! - `stats`: region statistics
//! - `gaussian`: Gaussian-noise substitution
//! - `mapper`: one conversion request end to end
//! - `options`: conversion options
//! - `export`: per-tissue table
//! - `nifti_io`: NIfTI load/save

pub mod error;

// Tables
pub mod properties;
pub mod catalog;
pub mod registry;

// Volumes and mapping
pub mod volume;
pub mod validate;
pub mod substitute;
pub mod stats;
pub mod gaussian;
pub mod mapper;

// Configuration and output
pub mod options;
pub mod export;
pub mod nifti_io;

pub use catalog::{LabelCatalog, Tool, ToolCatalog};
pub use error::{MappingError, Result, Stage};
pub use gaussian::{GaussianMode, StdOverride};
pub use mapper::{ConversionOutput, VolumeMapper};
pub use options::ConversionOptions;
pub use properties::{PropertyKind, TissueProperties};
pub use registry::{LabelRecord, LabelRegistry};
pub use validate::{Correction, CorrectionPolicy, RejectInvalid, RemapInvalid, ZeroInvalid};
pub use volume::{LabelVolume, PropertyVolume};
