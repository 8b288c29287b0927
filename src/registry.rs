//! Label registry
//!
//! One [`LabelRecord`] per catalog label id. A record holds only the scalar
//! values resolved for its tissue name; the literature table itself stays in
//! [`crate::properties`] and is never copied per label.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{info, warn};

use crate::catalog::LabelCatalog;
use crate::error::{MappingError, Result};
use crate::properties::{self, PropertyKind, TissueProperties};

/// Resolved properties of one label id
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRecord {
    pub label_id: u32,
    pub tissue_name: Option<String>,
    pub susceptibility: Option<f64>,
    pub m0: Option<f64>,
    pub t1: Option<f64>,
    pub t2: Option<f64>,
    pub t2star: Option<f64>,
    pub pd: f64,
    pub std_dev: f64,
    pub permittivity_3t: Option<f64>,
    pub conductivity_3t: Option<f64>,
    pub permittivity_7t: Option<f64>,
    pub conductivity_7t: Option<f64>,
    /// Whether the tissue name matched the property table
    pub known_tissue: bool,
}

impl LabelRecord {
    pub fn new(label_id: u32) -> Self {
        Self {
            label_id,
            tissue_name: None,
            susceptibility: None,
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
            known_tissue: false,
        }
    }

    /// Bind a tissue name and pull its values from the property table
    ///
    /// Names outside the vocabulary leave every value absent and PD at 0.
    pub fn set_name(&mut self, name: &str) {
        let props = properties::find(name);
        let t = props.copied().unwrap_or(TissueProperties::UNKNOWN);
        self.tissue_name = Some(name.to_string());
        self.known_tissue = props.is_some();
        self.m0 = t.m0;
        self.t1 = t.t1;
        self.t2 = t.t2;
        self.t2star = t.t2star;
        self.pd = t.pd;
        self.std_dev = t.std_dev;
        self.permittivity_3t = t.permittivity_3t;
        self.conductivity_3t = t.conductivity_3t;
        self.permittivity_7t = t.permittivity_7t;
        self.conductivity_7t = t.conductivity_7t;
    }

    pub fn set_susceptibility(&mut self, chi: f64) {
        self.susceptibility = Some(chi);
    }

    /// Raw value for a property kind, `None` when there is no value
    pub fn value(&self, kind: PropertyKind) -> Option<f64> {
        match kind {
            PropertyKind::Susceptibility => self.susceptibility,
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

    pub fn name(&self) -> &str {
        self.tissue_name.as_deref().unwrap_or("")
    }
}

impl fmt::Display for LabelRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Label(id={}, name={}, chi={:?}, M0={:?}, T1={:?}, T2={:?}, T2*={:?}, PD={})",
            self.label_id,
            self.name(),
            self.susceptibility,
            self.m0,
            self.t1,
            self.t2,
            self.t2star,
            self.pd
        )
    }
}

/// Records for every label id of one resolved catalog
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRegistry {
    records: BTreeMap<u32, LabelRecord>,
}

impl LabelRegistry {
    /// Create and bind one record per catalog label
    ///
    /// With `reference_chi`, every susceptibility is shifted by
    /// `-reference_chi` before being stored.
    pub fn group(catalog: &LabelCatalog, reference_chi: Option<f64>) -> Result<Self> {
        let mut registry = LabelRegistry {
            records: catalog.ids().map(|id| (id, LabelRecord::new(id))).collect(),
        };

        if let Some(reference) = reference_chi {
            info!("re-baselining susceptibilities against chi = {} ppm", reference);
        }

        for entry in catalog.iter() {
            registry.set_name(entry.label_id, &entry.tissue_name)?;
            let chi = match reference_chi {
                Some(reference) => entry.susceptibility - reference,
                None => entry.susceptibility,
            };
            registry.set_susceptibility(entry.label_id, chi)?;
        }

        for name in registry.degraded_tissues() {
            warn!("tissue '{}' is not in the property table, its properties are zero", name);
        }
        Ok(registry)
    }

    pub fn set_name(&mut self, label_id: u32, name: &str) -> Result<()> {
        self.get_mut(label_id)?.set_name(name);
        Ok(())
    }

    pub fn set_susceptibility(&mut self, label_id: u32, chi: f64) -> Result<()> {
        self.get_mut(label_id)?.set_susceptibility(chi);
        Ok(())
    }

    pub fn get(&self, label_id: u32) -> Option<&LabelRecord> {
        self.records.get(&label_id)
    }

    fn get_mut(&mut self, label_id: u32) -> Result<&mut LabelRecord> {
        self.records
            .get_mut(&label_id)
            .ok_or(MappingError::UnknownLabelId(label_id))
    }

    pub fn contains(&self, label_id: u32) -> bool {
        self.records.contains_key(&label_id)
    }

    /// Records ordered by label id
    pub fn iter(&self) -> impl Iterator<Item = &LabelRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct tissue names that did not match the property table
    pub fn degraded_tissues(&self) -> Vec<String> {
        self.records
            .values()
            .filter(|r| !r.known_tissue)
            .filter_map(|r| r.tissue_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_catalog() -> LabelCatalog {
        LabelCatalog::from_entries([(0, "air", 0.35), (1, "bone", -9.0), (7, "mystery", -9.04)])
    }

    #[test]
    fn test_group_binds_every_label() {
        let reg = LabelRegistry::group(&small_catalog(), None).unwrap();
        assert_eq!(reg.len(), 3);

        let bone = reg.get(1).unwrap();
        assert_eq!(bone.name(), "bone");
        assert_eq!(bone.susceptibility, Some(-9.0));
        assert_eq!(bone.t1, Some(223.0));
        assert_eq!(bone.pd, 18.0);
        assert!(bone.known_tissue);
    }

    #[test]
    fn test_unknown_tissue_is_degraded() {
        let reg = LabelRegistry::group(&small_catalog(), None).unwrap();
        let rec = reg.get(7).unwrap();
        assert!(!rec.known_tissue);
        assert_eq!(rec.pd, 0.0);
        assert!(rec.t2star.is_none());
        assert_eq!(rec.susceptibility, Some(-9.04));
        assert_eq!(reg.degraded_tissues(), vec!["mystery".to_string()]);
    }

    #[test]
    fn test_reference_chi_shift() {
        let reg = LabelRegistry::group(&small_catalog(), Some(-9.05)).unwrap();
        let air = reg.get(0).unwrap().susceptibility.unwrap();
        let bone = reg.get(1).unwrap().susceptibility.unwrap();
        assert!((air - 9.40).abs() < 1e-12, "air shifted to {}", air);
        assert!((bone - 0.05).abs() < 1e-12, "bone shifted to {}", bone);
    }

    #[test]
    fn test_unknown_label_id_fails() {
        let mut reg = LabelRegistry::group(&small_catalog(), None).unwrap();
        assert!(matches!(reg.set_name(3, "fat"), Err(MappingError::UnknownLabelId(3))));
        assert!(matches!(
            reg.set_susceptibility(99, 0.0),
            Err(MappingError::UnknownLabelId(99))
        ));
    }

    #[test]
    fn test_rename_replaces_values() {
        let mut rec = LabelRecord::new(4);
        rec.set_name("fat");
        assert_eq!(rec.permittivity_3t, Some(48.17));
        rec.set_name("nothing");
        assert!(rec.permittivity_3t.is_none());
        assert_eq!(rec.pd, 0.0);
        assert!(!rec.known_tissue);
    }

    #[test]
    fn test_display() {
        let reg = LabelRegistry::group(&small_catalog(), None).unwrap();
        let text = reg.get(1).unwrap().to_string();
        assert!(text.contains("id=1") && text.contains("name=bone"), "{}", text);
    }
}
