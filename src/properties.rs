//! Tissue property table
//!
//! Literature values for relaxation (M0, T1, T2, T2*, PD), intra-tissue
//! signal dispersion and electrical properties at 3T and 7T, keyed by tissue
//! name. The table is plain data: adding or editing a tissue never touches
//! the mapping logic.
//!
//! Units: T1, T2 and T2* in ms, PD in percentage units relative to water
//! (water = 100), conductivity in S/m, permittivity relative. Electrical
//! values are taken at 127.74 MHz (3T) and 298.06 MHz (7T).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MappingError;

/// Physical property that can be mapped onto a label volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropertyKind {
    #[serde(rename = "sus")]
    Susceptibility,
    #[serde(rename = "m0")]
    M0,
    #[serde(rename = "t1")]
    T1,
    #[serde(rename = "t2")]
    T2,
    #[serde(rename = "t2s")]
    T2Star,
    #[serde(rename = "pd")]
    Pd,
    #[serde(rename = "perm3t")]
    Permittivity3T,
    #[serde(rename = "cond3t")]
    Conductivity3T,
    #[serde(rename = "perm7t")]
    Permittivity7T,
    #[serde(rename = "cond7t")]
    Conductivity7T,
}

impl PropertyKind {
    pub const ALL: [PropertyKind; 10] = [
        PropertyKind::Susceptibility,
        PropertyKind::M0,
        PropertyKind::T1,
        PropertyKind::T2,
        PropertyKind::T2Star,
        PropertyKind::Pd,
        PropertyKind::Permittivity3T,
        PropertyKind::Conductivity3T,
        PropertyKind::Permittivity7T,
        PropertyKind::Conductivity7T,
    ];

    /// Short tag used on the command line and in option files
    pub fn tag(self) -> &'static str {
        match self {
            PropertyKind::Susceptibility => "sus",
            PropertyKind::M0 => "m0",
            PropertyKind::T1 => "t1",
            PropertyKind::T2 => "t2",
            PropertyKind::T2Star => "t2s",
            PropertyKind::Pd => "pd",
            PropertyKind::Permittivity3T => "perm3t",
            PropertyKind::Conductivity3T => "cond3t",
            PropertyKind::Permittivity7T => "perm7t",
            PropertyKind::Conductivity7T => "cond7t",
        }
    }

    /// Default file stem for a volume of this kind
    pub fn file_stem(self) -> &'static str {
        match self {
            PropertyKind::Susceptibility => "sus_dist",
            PropertyKind::M0 => "m0_dist",
            PropertyKind::T1 => "t1_dist",
            PropertyKind::T2 => "t2_dist",
            PropertyKind::T2Star => "t2_star",
            PropertyKind::Pd => "pd_dist",
            PropertyKind::Permittivity3T => "perm_3T",
            PropertyKind::Conductivity3T => "cond_3T",
            PropertyKind::Permittivity7T => "perm_7T",
            PropertyKind::Conductivity7T => "cond_7T",
        }
    }

    /// Susceptibility is the only signed property
    pub fn is_signed(self) -> bool {
        self == PropertyKind::Susceptibility
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::Susceptibility => "Susceptibility",
            PropertyKind::M0 => "M0",
            PropertyKind::T1 => "T1",
            PropertyKind::T2 => "T2",
            PropertyKind::T2Star => "T2 star",
            PropertyKind::Pd => "Proton density",
            PropertyKind::Permittivity3T => "Permittivity @3T",
            PropertyKind::Conductivity3T => "Conductivity @3T",
            PropertyKind::Permittivity7T => "Permittivity @7T",
            PropertyKind::Conductivity7T => "Conductivity @7T",
        };
        f.write_str(name)
    }
}

impl FromStr for PropertyKind {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        PropertyKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| MappingError::UnknownPropertyKind(s.to_string()))
    }
}

/// Literature record for one tissue name
///
/// `None` means "no literature value", which is different from a measured
/// zero (air has T1 = 0.01 ms, conductivity 0 S/m).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TissueProperties {
    pub name: &'static str,
    pub m0: Option<f64>,
    pub t1: Option<f64>,
    pub t2: Option<f64>,
    pub t2star: Option<f64>,
    /// Never absent; tissues without a value carry 0
    pub pd: f64,
    /// Generic intra-tissue standard deviation used for Gaussian sampling
    pub std_dev: f64,
    pub permittivity_3t: Option<f64>,
    pub conductivity_3t: Option<f64>,
    pub permittivity_7t: Option<f64>,
    pub conductivity_7t: Option<f64>,
}

impl TissueProperties {
    /// Record returned for names outside the vocabulary
    pub const UNKNOWN: TissueProperties = TissueProperties::empty("");

    const fn empty(name: &'static str) -> Self {
        Self {
            name,
            m0: None,
            t1: None,
            t2: None,
            t2star: None,
            pd: 0.0,
            std_dev: 0.0,
            permittivity_3t: None,
            conductivity_3t: None,
            permittivity_7t: None,
            conductivity_7t: None,
        }
    }

    const fn relax(name: &'static str, t1: f64, t2: f64, t2star: f64, pd: f64) -> Self {
        Self {
            t1: Some(t1),
            t2: Some(t2),
            t2star: Some(t2star),
            pd,
            ..Self::empty(name)
        }
    }

    const fn std(self, std_dev: f64) -> Self {
        Self { std_dev, ..self }
    }

    const fn electrical(self, perm_3t: f64, cond_3t: f64, perm_7t: f64, cond_7t: f64) -> Self {
        Self {
            permittivity_3t: Some(perm_3t),
            conductivity_3t: Some(cond_3t),
            permittivity_7t: Some(perm_7t),
            conductivity_7t: Some(cond_7t),
            ..self
        }
    }

    /// Table value for a property kind
    ///
    /// Susceptibility is bound per label by the tool catalog, not per tissue,
    /// so it is always `None` here.
    pub fn value(&self, kind: PropertyKind) -> Option<f64> {
        match kind {
            PropertyKind::Susceptibility => None,
            PropertyKind::M0 => self.m0,
            PropertyKind::T1 => self.t1,
            PropertyKind::T2 => self.t2,
            PropertyKind::T2Star => self.t2star,
            PropertyKind::Pd => Some(self.pd),
            PropertyKind::Permittivity3T => self.permittivity_3t,
            PropertyKind::Conductivity3T => self.conductivity_3t,
            PropertyKind::Permittivity7T => self.permittivity_7t,
            PropertyKind::Conductivity7T => self.conductivity_7t,
        }
    }

    /// True for the all-absent record handed out for unknown names
    pub fn is_degraded(&self) -> bool {
        self.pd == 0.0
            && self.m0.is_none()
            && self.t1.is_none()
            && self.t2.is_none()
            && self.t2star.is_none()
    }
}

/// Tissue vocabulary
///
/// Sinus has no relaxation literature yet, only its electrical values
/// (modelled as 95% air, 5% soft tissue). Skull and eyes are electrical-only
/// entries for head phantoms.
pub(crate) const TISSUES: &[TissueProperties] = &[
    // Whole-body phantom tissues
    TissueProperties::relax("fat", 401.2, 129.3, 64.65, 20.0)
        .std(15.39)
        .electrical(48.17, 0.52, 44.25, 0.562),
    TissueProperties::relax("heart", 1215.67, 49.35, 25.195, 77.0).std(7.28),
    TissueProperties::relax("liver", 798.75, 33.0, 18.82, 70.0).std(7.41),
    TissueProperties::relax("pancreas", 797.55, 43.5, 21.1, 70.0).std(8.49),
    TissueProperties::relax("kidney", 1338.0, 86.835, 57.55, 82.0).std(7.17),
    TissueProperties::relax("brain", 1232.9, 82.9, 42.8, 74.5)
        .std(18.45)
        .electrical(79.80, 0.829, 59.8, 0.972),
    TissueProperties::relax("spleen", 1328.0, 60.9, 16.3, 75.0).std(8.08),
    TissueProperties::relax("cartilage", 1201.0, 43.225, 26.04, 70.0).std(5.16),
    TissueProperties::relax("bone_marrow", 586.0, 49.0, 24.5, 27.0).std(6.1),
    // Spinal cord
    TissueProperties::relax("sc_wm", 857.0, 73.0, 38.65, 70.0).std(1.0),
    TissueProperties::relax("sc_gm", 983.5, 76.0, 44.4, 80.0).std(1.0),
    TissueProperties::relax("sc_csf", 5128.0, 1419.84, 709.92, 100.0)
        .std(12.25)
        .electrical(84.1, 2.14, 72.8, 2.22),
    TissueProperties::relax("muscle", 1237.825, 36.1, 24.1, 45.0)
        .electrical(63.5, 0.719, 58.2, 0.77),
    TissueProperties::relax("bone", 223.0, 0.39, 1.16, 18.0)
        .std(5.42)
        .electrical(14.7, 0.0673, 13.4, 0.0825),
    TissueProperties::relax("v_bone", 618.5, 80.685, 40.3, 40.0).std(5.42),
    TissueProperties::relax("lungs", 1400.0, 35.5, 1.62, 15.0)
        .std(4.01)
        .electrical(29.5, 0.316, 24.8, 0.356),
    // Airway
    TissueProperties::relax("trachea", 1100.0, 40.0, 12.0, 5.0)
        .std(5.16)
        .electrical(50.6, 0.559, 45.3, 0.61),
    TissueProperties::relax("tr_cartilage", 1201.0, 43.225, 26.04, 70.0),
    TissueProperties::relax("tr_lumen", 0.01, 0.01, 0.01, 0.01),
    TissueProperties::relax("air", 0.01, 0.01, 0.01, 0.01)
        .std(2.78)
        .electrical(1.0, 0.0, 1.0, 0.0),
    // Blood carriers and muscle groups without their own label
    TissueProperties::relax("extra", 800.0, 50.0, 35.0, 50.0).std(7.45),
    // Other segmentation tools
    TissueProperties::relax("spinal_cord", 936.5, 76.75, 40.07, 60.0)
        .std(7.64)
        .electrical(44.1, 0.354, 36.9, 0.418),
    TissueProperties::relax("water", 2500.0, 275.0, 137.5, 100.0).std(10.29),
    TissueProperties::relax("CSF", 1953.0, 275.0, 137.5, 100.0).std(12.25),
    TissueProperties::relax("white_matter", 887.7, 65.4, 35.0, 70.0),
    TissueProperties::relax("gray_matter", 1446.1, 94.3, 48.0, 82.0),
    TissueProperties::relax("SpinalCanal", 993.0, 78.0, 39.0, 90.0).std(9.98),
    TissueProperties::relax("esophagus", 1000.0, 32.0, 17.0, 45.0).std(8.96),
    TissueProperties::relax("organ", 800.0, 40.0, 20.0, 65.0)
        .std(7.33)
        .electrical(89.7, 0.852, 70.6, 1.02),
    TissueProperties::relax("gland", 1600.0, 72.0, 36.0, 80.0).std(7.91),
    TissueProperties::relax("inter_vert_discs", 1201.0, 42.0, 26.0, 50.0)
        .electrical(52.9, 0.488, 46.8, 0.552),
    TissueProperties::empty("sinus")
        .std(4.26)
        .electrical(5.435, 0.0426, 4.48, 0.051),
    TissueProperties::empty("skull").electrical(14.7, 0.0673, 13.4, 0.0825),
    TissueProperties::empty("eyes").electrical(84.1, 2.14, 72.8, 2.22),
];

/// Strict lookup: `None` when the name is not in the vocabulary
pub fn find(name: &str) -> Option<&'static TissueProperties> {
    TISSUES.iter().find(|t| t.name == name)
}

/// Permissive lookup
///
/// Unknown names yield [`TissueProperties::UNKNOWN`] (PD = 0, everything
/// else absent). Use [`find`] or [`is_known`] to tell the two apart.
pub fn lookup(name: &str) -> TissueProperties {
    find(name).copied().unwrap_or(TissueProperties::UNKNOWN)
}

pub fn is_known(name: &str) -> bool {
    find(name).is_some()
}

/// All tissue names in table order
pub fn tissue_names() -> impl Iterator<Item = &'static str> {
    TISSUES.iter().map(|t| t.name)
}
