//! Conversion options
//!
//! Everything one conversion request needs besides the label volume. Options
//! can be built in code or loaded from a JSON file; absent fields take the
//! defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::gaussian::{GaussianMode, StdOverride};
use crate::properties::PropertyKind;

/// Parameters of one label-to-property conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionOptions {
    /// Segmentation tool id, e.g. `TotalSeg_CT`
    pub tool: String,
    /// Version tag under `tool`
    pub version: String,
    /// Property to map
    pub kind: PropertyKind,
    /// Subtracted from every susceptibility before mapping (ppm)
    pub reference_chi: Option<f64>,
    /// Sentinel susceptibility for the `custom_chi` tool (ppm)
    pub override_chi: Option<f64>,
    /// Sample values per tissue instead of a flat piecewise map
    pub gaussian: bool,
    pub gaussian_mode: GaussianMode,
    /// Seed for the run-scoped generator; entropy when absent
    pub seed: Option<u64>,
    pub std_overrides: Vec<StdOverride>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            tool: "TotalSeg_CT".to_string(),
            version: "v2".to_string(),
            kind: PropertyKind::Susceptibility,
            reference_chi: None,
            override_chi: None,
            gaussian: false,
            gaussian_mode: GaussianMode::AllRegions,
            seed: None,
            std_overrides: Vec::new(),
        }
    }
}

impl ConversionOptions {
    pub fn new(tool: &str, version: &str, kind: PropertyKind) -> Self {
        Self {
            tool: tool.to_string(),
            version: version.to_string(),
            kind,
            ..Self::default()
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
