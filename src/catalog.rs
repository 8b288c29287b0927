//! Segmentation tool catalog
//!
//! Maps the label ids written by a segmentation tool to a tissue name and a
//! susceptibility value (ppm). Each tool has a baseline table covering its
//! full label set; a version is the baseline plus an ordered list of named
//! overlays. Overlays are applied in order and later entries replace earlier
//! ones with the same id.
//!
//! Susceptibility references: bone, fat and soft tissue from Truong et al.
//! (MRI 2002;20:759); spinal cord white/gray matter from the Fourier-based
//! field estimation numerical model (WM -9.083, GM -9.03).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::{MappingError, Result};

/// Susceptibility assigned to the override sentinel when the caller gives none
pub const DEFAULT_OVERRIDE_CHI: f64 = 0.35;

/// Segmentation tools with a label convention in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// TotalSegmentator, CT task (117 classes)
    TotalSegCt,
    /// TotalSegmentator, MRI task (56 classes)
    TotalSegMri,
    /// ProCord MRI spinal cord segmentation (no versions mapped yet)
    ProCordMri,
    /// Head and neck phantom labels
    Charles,
    /// Charles layout with a caller-defined sinus susceptibility
    CustomChi,
}

impl Tool {
    pub const ALL: [Tool; 5] = [
        Tool::TotalSegCt,
        Tool::TotalSegMri,
        Tool::ProCordMri,
        Tool::Charles,
        Tool::CustomChi,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Tool::TotalSegCt => "TotalSeg_CT",
            Tool::TotalSegMri => "TotalSeg_MRI",
            Tool::ProCordMri => "ProCord_MRI",
            Tool::Charles => "charles",
            Tool::CustomChi => "custom_chi",
        }
    }

    pub fn from_id(id: &str) -> Option<Tool> {
        Tool::ALL.iter().copied().find(|t| t.id() == id)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Tool {
    type Err = MappingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Tool::from_id(s).ok_or_else(|| MappingError::UnknownTool(s.to_string()))
    }
}

/// (label id, structure name, tissue name, susceptibility)
type Row = (u32, &'static str, &'static str, f64);

/// Named set of additional or replaced labels
#[derive(Debug)]
pub struct Overlay {
    pub name: &'static str,
    rows: &'static [Row],
}

#[derive(Debug)]
struct VersionSpec {
    tag: &'static str,
    overlays: &'static [&'static Overlay],
}

#[derive(Debug)]
struct ToolSpec {
    baseline: &'static [Row],
    versions: &'static [VersionSpec],
    /// Label whose susceptibility comes from the caller
    override_label: Option<u32>,
}

/// One resolved label
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub label_id: u32,
    /// Class name used by the segmentation tool, empty for ad-hoc catalogs
    pub structure: String,
    pub tissue_name: String,
    pub susceptibility: f64,
}

/// Resolved label table for one (tool, version) selection
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCatalog {
    tool: String,
    version: String,
    entries: BTreeMap<u32, CatalogEntry>,
}

impl LabelCatalog {
    /// Build a catalog from `(label id, tissue name, susceptibility)` triples
    ///
    /// Later triples with the same id replace earlier ones.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u32, &'a str, f64)>,
    {
        let mut catalog = LabelCatalog {
            tool: "custom".to_string(),
            version: "adhoc".to_string(),
            entries: BTreeMap::new(),
        };
        for (label_id, tissue, chi) in entries {
            catalog.insert(CatalogEntry {
                label_id,
                structure: String::new(),
                tissue_name: tissue.to_string(),
                susceptibility: chi,
            });
        }
        catalog
    }

    /// Baseline rows, then each overlay in order; later rows win
    fn compose(tool: &str, version: &str, baseline: &[Row], overlays: &[&Overlay]) -> Self {
        let mut catalog = LabelCatalog {
            tool: tool.to_string(),
            version: version.to_string(),
            entries: BTreeMap::new(),
        };
        catalog.insert_rows(baseline);
        for overlay in overlays {
            catalog.insert_rows(overlay.rows);
        }
        catalog
    }

    fn insert_rows(&mut self, rows: &[Row]) {
        for &(label_id, structure, tissue, chi) in rows {
            self.insert(CatalogEntry {
                label_id,
                structure: structure.to_string(),
                tissue_name: tissue.to_string(),
                susceptibility: chi,
            });
        }
    }

    fn insert(&mut self, entry: CatalogEntry) {
        self.entries.insert(entry.label_id, entry);
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn get(&self, label_id: u32) -> Option<&CatalogEntry> {
        self.entries.get(&label_id)
    }

    pub fn contains(&self, label_id: u32) -> bool {
        self.entries.contains_key(&label_id)
    }

    /// Label id for a raw voxel value, if it names a catalog entry
    pub fn label_for_value(&self, value: f64) -> Option<u32> {
        label_id_of(value).filter(|id| self.contains(*id))
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace the tissue name and susceptibility of an existing label
    pub fn rebind(&mut self, label_id: u32, tissue: &str, chi: f64) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&label_id)
            .ok_or(MappingError::UnknownLabelId(label_id))?;
        entry.tissue_name = tissue.to_string();
        entry.susceptibility = chi;
        Ok(())
    }
}

/// Integer label id carried by a voxel value
///
/// Label volumes are stored as floating point; only non-negative integral
/// values can be label ids.
pub fn label_id_of(value: f64) -> Option<u32> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as u32)
    } else {
        None
    }
}

/// Declarative tool/version catalog
pub struct ToolCatalog;

impl ToolCatalog {
    /// Resolve the label table for a tool id and version tag
    ///
    /// `override_chi` is only used by tools with an override sentinel
    /// ([`Tool::CustomChi`]); without it the sentinel gets
    /// [`DEFAULT_OVERRIDE_CHI`].
    pub fn resolve(tool_id: &str, version: &str, override_chi: Option<f64>) -> Result<LabelCatalog> {
        let tool: Tool = tool_id.parse()?;
        let spec = tool_spec(tool);
        let version_spec = spec
            .versions
            .iter()
            .find(|v| v.tag == version)
            .ok_or_else(|| MappingError::UnsupportedToolVersion {
                tool: tool_id.to_string(),
                version: version.to_string(),
            })?;

        let mut catalog = LabelCatalog::compose(tool.id(), version, spec.baseline, version_spec.overlays);

        match (spec.override_label, override_chi) {
            (Some(label), chi) => {
                let chi = chi.unwrap_or_else(|| {
                    warn!(
                        "no override susceptibility given for {}, using default chi = {} ppm",
                        tool, DEFAULT_OVERRIDE_CHI
                    );
                    DEFAULT_OVERRIDE_CHI
                });
                if let Some(entry) = catalog.entries.get_mut(&label) {
                    entry.susceptibility = chi;
                }
            }
            (None, Some(chi)) => {
                warn!("tool {} has no override label, ignoring chi = {}", tool, chi);
            }
            (None, None) => {}
        }

        info!(
            "resolved {} {} with {} labels",
            catalog.tool,
            catalog.version,
            catalog.len()
        );
        Ok(catalog)
    }

    pub fn tools() -> &'static [Tool] {
        &Tool::ALL
    }

    /// Supported version tags of a tool, baseline first
    pub fn versions(tool: Tool) -> Vec<&'static str> {
        tool_spec(tool).versions.iter().map(|v| v.tag).collect()
    }

    /// Baseline version tag, `None` for tools without supported versions
    pub fn baseline_version(tool: Tool) -> Option<&'static str> {
        tool_spec(tool)
            .versions
            .iter()
            .find(|v| v.overlays.is_empty())
            .map(|v| v.tag)
    }

    /// Overlays composing a version, in application order
    pub fn overlays(tool: Tool, version: &str) -> Option<Vec<&'static str>> {
        tool_spec(tool)
            .versions
            .iter()
            .find(|v| v.tag == version)
            .map(|v| v.overlays.iter().map(|o| o.name).collect())
    }
}

fn tool_spec(tool: Tool) -> &'static ToolSpec {
    match tool {
        Tool::TotalSegCt => &TOTALSEG_CT,
        Tool::TotalSegMri => &TOTALSEG_MRI,
        Tool::ProCordMri => &PROCORD_MRI,
        Tool::Charles => &CHARLES,
        Tool::CustomChi => &CUSTOM_CHI,
    }
}

// ============================================================================
// Overlays
// ============================================================================

/// Subcutaneous and visceral fat, turning the CT labels into a whole body
///
/// Fat chi is a weighted average of 20% fat (-7.5), 40% muscle (-9.05) and
/// 40% soft tissue (-9.5).
const FAT: Overlay = Overlay {
    name: "fat",
    rows: &[(264, "body_fat", "fat", -8.92)],
};

/// Spinal canal split into cord and surrounding CSF
const SPINAL_CORD_CSF: Overlay = Overlay {
    name: "spinal_cord_csf",
    rows: &[
        (256, "spinal_cord", "spinal_cord", -9.055),
        (289, "spinal_csf", "sc_csf", -9.05),
    ],
};

/// CSF plus cord white/gray matter in place of the spinal canal
const CORD_WM_GM: Overlay = Overlay {
    name: "cord_wm_gm",
    rows: &[
        (289, "spinal_csf", "sc_csf", -9.05),
        (196, "spinal_cord_wm", "sc_wm", -9.083),
        (324, "spinal_cord_gm", "sc_gm", -9.03),
    ],
};

// ============================================================================
// Tools
// ============================================================================

const TOTALSEG_CT: ToolSpec = ToolSpec {
    baseline: TOTALSEG_CT_LABELS,
    versions: &[
        VersionSpec { tag: "v2", overlays: &[] },
        VersionSpec { tag: "mod0", overlays: &[&FAT] },
        VersionSpec { tag: "mod1", overlays: &[&FAT, &SPINAL_CORD_CSF] },
        VersionSpec { tag: "mod2", overlays: &[&FAT, &CORD_WM_GM] },
    ],
    override_label: None,
};

const TOTALSEG_MRI: ToolSpec = ToolSpec {
    baseline: TOTALSEG_MRI_LABELS,
    versions: &[VersionSpec { tag: "v1", overlays: &[] }],
    override_label: None,
};

const PROCORD_MRI: ToolSpec = ToolSpec {
    baseline: &[],
    versions: &[],
    override_label: None,
};

const CHARLES: ToolSpec = ToolSpec {
    baseline: CHARLES_LABELS,
    versions: &[VersionSpec { tag: "v1", overlays: &[] }],
    override_label: None,
};

const CUSTOM_CHI: ToolSpec = ToolSpec {
    baseline: CUSTOM_CHI_LABELS,
    versions: &[VersionSpec { tag: "v1", overlays: &[] }],
    override_label: Some(2),
};

// ============================================================================
// Baseline label tables
// ============================================================================

// Grouped by B0 impact: organs and soft tissue take the water value (-9.05),
// vessels and muscle the muscle/CSF mix (-9.04), bones -9.0.
const TOTALSEG_CT_LABELS: &[Row] = &[
    (0, "background", "air", 0.35),
    (1, "spleen", "spleen", -9.05),
    (2, "kidney_right", "kidney", -9.05),
    (3, "kidney_left", "kidney", -9.05),
    (4, "gallbladder", "organ", -9.05),
    (5, "liver", "liver", -9.05),
    (6, "stomach", "organ", -9.05),
    (7, "pancreas", "organ", -9.05),
    (8, "adrenal_gland_right", "gland", -9.05),
    (9, "adrenal_gland_left", "gland", -9.05),
    (10, "lung_upper_lobe_left", "lungs", 0.2),
    (11, "lung_lower_lobe_left", "lungs", 0.2),
    (12, "lung_upper_lobe_right", "lungs", 0.2),
    (13, "lung_middle_lobe_right", "lungs", 0.2),
    (14, "lung_lower_lobe_right", "lungs", 0.2),
    (15, "esophagus", "esophagus", -9.05),
    (16, "trachea", "trachea", 0.2),
    (17, "thyroid_gland", "gland", -9.05),
    (18, "small_bowel", "organ", -9.05),
    (19, "duodenum", "organ", -9.05),
    (20, "colon", "organ", -9.05),
    (21, "urinary_bladder", "organ", -9.05),
    (22, "prostate", "organ", -9.05),
    (23, "kidney_cyst_left", "kidney", -9.05),
    (24, "kidney_cyst_right", "kidney", -9.05),
    (25, "sacrum", "bone", -9.0),
    (26, "vertebrae_S1", "bone", -9.0),
    (27, "vertebrae_L5", "bone", -9.0),
    (28, "vertebrae_L4", "bone", -9.0),
    (29, "vertebrae_L3", "bone", -9.0),
    (30, "vertebrae_L2", "bone", -9.0),
    (31, "vertebrae_L1", "bone", -9.0),
    (32, "vertebrae_T12", "bone", -9.0),
    (33, "vertebrae_T11", "bone", -9.0),
    (34, "vertebrae_T10", "bone", -9.0),
    (35, "vertebrae_T9", "bone", -9.0),
    (36, "vertebrae_T8", "bone", -9.0),
    (37, "vertebrae_T7", "bone", -9.0),
    (38, "vertebrae_T6", "bone", -9.0),
    (39, "vertebrae_T5", "bone", -9.0),
    (40, "vertebrae_T4", "bone", -9.0),
    (41, "vertebrae_T3", "bone", -9.0),
    (42, "vertebrae_T2", "bone", -9.0),
    (43, "vertebrae_T1", "bone", -9.0),
    (44, "vertebrae_C7", "bone", -9.0),
    (45, "vertebrae_C6", "bone", -9.0),
    (46, "vertebrae_C5", "bone", -9.0),
    (47, "vertebrae_C4", "bone", -9.0),
    (48, "vertebrae_C3", "bone", -9.0),
    (49, "vertebrae_C2", "bone", -9.0),
    (50, "vertebrae_C1", "bone", -9.0),
    (51, "heart", "heart", -9.04),
    (52, "aorta", "extra", -9.04),
    (53, "pulmonary_vein", "extra", -9.04),
    (54, "brachiocephalic_trunk", "extra", -9.04),
    (55, "subclavian_artery_right", "extra", -9.04),
    (56, "subclavian_artery_left", "extra", -9.04),
    (57, "common_carotid_artery_right", "extra", -9.04),
    (58, "common_carotid_artery_left", "extra", -9.04),
    (59, "brachiocephalic_vein_left", "extra", -9.04),
    (60, "brachiocephalic_vein_right", "extra", -9.04),
    (61, "atrial_appendage_left", "extra", -9.04),
    (62, "superior_vena_cava", "extra", -9.04),
    (63, "inferior_vena_cava", "extra", -9.04),
    (64, "portal_vein_and_splenic_vein", "extra", -9.04),
    (65, "iliac_artery_left", "extra", -9.04),
    (66, "iliac_artery_right", "extra", -9.04),
    (67, "iliac_vena_left", "extra", -9.04),
    (68, "iliac_vena_right", "extra", -9.04),
    (69, "humerus_left", "bone", -9.0),
    (70, "humerus_right", "bone", -9.0),
    (71, "scapula_left", "bone", -9.0),
    (72, "scapula_right", "bone", -9.0),
    (73, "clavicula_left", "bone", -9.0),
    (74, "clavicula_right", "bone", -9.0),
    (75, "femur_left", "bone", -9.0),
    (76, "femur_right", "bone", -9.0),
    (77, "hip_left", "bone", -9.0),
    (78, "hip_right", "bone", -9.0),
    (79, "spinal_cord", "SpinalCanal", -9.055),
    (80, "gluteus_maximus_left", "extra", -9.04),
    (81, "gluteus_maximus_right", "extra", -9.04),
    (82, "gluteus_medius_left", "extra", -9.04),
    (83, "gluteus_medius_right", "extra", -9.04),
    (84, "gluteus_minimus_left", "extra", -9.04),
    (85, "gluteus_minimus_right", "extra", -9.04),
    (86, "autochthon_left", "extra", -9.04),
    (87, "autochthon_right", "extra", -9.04),
    (88, "iliopsoas_left", "extra", -9.04),
    (89, "iliopsoas_right", "extra", -9.04),
    (90, "brain", "brain", -9.04),
    (91, "skull", "bone", -9.0),
    (92, "rib_left_1", "bone", -9.0),
    (93, "rib_left_2", "bone", -9.0),
    (94, "rib_left_3", "bone", -9.0),
    (95, "rib_left_4", "bone", -9.0),
    (96, "rib_left_5", "bone", -9.0),
    (97, "rib_left_6", "bone", -9.0),
    (98, "rib_left_7", "bone", -9.0),
    (99, "rib_left_8", "bone", -9.0),
    (100, "rib_left_9", "bone", -9.0),
    (101, "rib_left_10", "bone", -9.0),
    (102, "rib_left_11", "bone", -9.0),
    (103, "rib_left_12", "bone", -9.0),
    (104, "rib_right_1", "bone", -9.0),
    (105, "rib_right_2", "bone", -9.0),
    (106, "rib_right_3", "bone", -9.0),
    (107, "rib_right_4", "bone", -9.0),
    (108, "rib_right_5", "bone", -9.0),
    (109, "rib_right_6", "bone", -9.0),
    (110, "rib_right_7", "bone", -9.0),
    (111, "rib_right_8", "bone", -9.0),
    (112, "rib_right_9", "bone", -9.0),
    (113, "rib_right_10", "bone", -9.0),
    (114, "rib_right_11", "bone", -9.0),
    (115, "rib_right_12", "bone", -9.0),
    (116, "sternum", "bone", -9.0),
    (117, "costal_cartilages", "bone", -9.0),
];

const TOTALSEG_MRI_LABELS: &[Row] = &[
    (0, "background", "air", 0.35),
    (1, "spleen", "spleen", -9.05),
    (2, "kidney_right", "kidney", -9.05),
    (3, "kidney_left", "kidney", -9.05),
    (4, "gallbladder", "organ", -9.05),
    (5, "liver", "liver", -9.05),
    (6, "stomach", "organ", -9.05),
    (7, "pancreas", "organ", -9.05),
    (8, "adrenal_gland_right", "gland", -9.05),
    (9, "adrenal_gland_left", "gland", -9.05),
    (10, "lung_left", "lungs", 0.2),
    (11, "lung_right", "lungs", 0.2),
    (12, "esophagus", "esophagus", -9.05),
    (13, "small_bowel", "organ", -9.05),
    (14, "duodenum", "organ", -9.05),
    (15, "colon", "organ", -9.05),
    (16, "urinary_bladder", "organ", -9.05),
    (17, "prostate", "organ", -9.05),
    (18, "sacrum", "bone", -9.0),
    (19, "vertebrae", "bone", -9.0),
    (20, "intervertebral_discs", "inter_vert_discs", -9.0),
    (21, "spinal_cord", "spinal_cord", -9.055),
    (22, "heart", "heart", -9.04),
    (23, "aorta", "extra", -9.04),
    (24, "inferior_vena_cava", "extra", -9.04),
    (25, "portal_vein_and_splenic_vein", "extra", -9.04),
    (26, "iliac_artery_left", "extra", -9.04),
    (27, "iliac_artery_right", "extra", -9.04),
    (28, "iliac_vena_left", "extra", -9.04),
    (29, "iliac_vena_right", "extra", -9.04),
    (30, "humerus_left", "bone", -9.0),
    (31, "humerus_right", "bone", -9.0),
    (32, "fibula", "bone", -9.0),
    (33, "tibia", "bone", -9.0),
    (34, "femur_left", "bone", -9.0),
    (35, "femur_right", "bone", -9.0),
    (36, "hip_left", "bone", -9.0),
    (37, "hip_right", "bone", -9.0),
    (38, "gluteus_maximus_left", "extra", -9.04),
    (39, "gluteus_maximus_right", "extra", -9.04),
    (40, "gluteus_medius_left", "extra", -9.04),
    (41, "gluteus_medius_right", "extra", -9.04),
    (42, "gluteus_minimus_left", "extra", -9.04),
    (43, "gluteus_minimus_right", "extra", -9.04),
    (44, "autochthon_left", "extra", -9.04),
    (45, "autochthon_right", "extra", -9.04),
    (46, "iliopsoas_left", "extra", -9.04),
    (47, "iliopsoas_right", "extra", -9.04),
    (48, "quadriceps_femoris_left", "extra", -9.04),
    (49, "quadriceps_femoris_right", "extra", -9.04),
    (50, "thigh_medial_compartment_left", "extra", -9.04),
    (51, "thigh_medial_compartment_right", "extra", -9.04),
    (52, "thigh_posterior_compartment_left", "extra", -9.04),
    (53, "thigh_posterior_compartment_right", "extra", -9.04),
    (54, "sartorius_left", "extra", -9.04),
    (55, "sartorius_right", "extra", -9.04),
    (56, "brain", "brain", -9.04),
];

const CHARLES_LABELS: &[Row] = &[
    (0, "background", "air", 0.35),
    (1, "body", "water", -9.05),
    (2, "sinus", "air", 0.35),
    (3, "ear_canal", "air", 0.35),
    (4, "trachea", "trachea", 0.2),
    (5, "lung_left", "lungs", 0.2),
    (6, "lung_right", "lungs", 0.2),
    (7, "skull", "bone", -11.5),
    (8, "eyes", "water", -9.05),
    (9, "vertebrae", "bone", -11.5),
    (10, "discs", "cartilage", -9.055),
];

const CUSTOM_CHI_LABELS: &[Row] = &[
    (0, "background", "air", 0.35),
    (1, "body", "water", -9.05),
    (2, "sinus", "sinus", DEFAULT_OVERRIDE_CHI),
    (3, "ear_canal", "air", 0.35),
    (4, "trachea", "trachea", 0.2),
    (5, "lung_left", "lungs", 0.2),
    (6, "lung_right", "lungs", 0.2),
    (7, "skull", "bone", -11.5),
    (8, "eyes", "water", -9.05),
    (9, "vertebrae", "bone", -11.5),
    (10, "discs", "cartilage", -9.055),
];
