//! Voxel integrity validation and correction
//!
//! A label volume can only be converted when every voxel value is a label
//! id of the resolved catalog. [`validate`] scans the whole volume and
//! collects every violation; [`apply_corrections`] then asks a
//! [`CorrectionPolicy`] what to do with each one.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::catalog::LabelCatalog;
use crate::error::{MappingError, Result};
use crate::volume::LabelVolume;

/// A voxel whose value is not a catalog label id
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    /// Flat (Fortran-order) index
    pub index: usize,
    /// Voxel coordinates, indexed from (0, 0, 0)
    pub coords: (usize, usize, usize),
    pub value: f64,
}

/// Outcome of a full validation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Distinct offending values, ascending
    pub fn distinct_values(&self) -> Vec<f64> {
        let mut values: Vec<f64> = self.violations.iter().map(|v| v.value).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup_by(|a, b| a.total_cmp(b).is_eq());
        values
    }

    /// Error to return when the violations are left unresolved
    pub fn to_error(&self) -> Option<MappingError> {
        self.violations.first().map(|first| MappingError::InvalidVoxelValue {
            count: self.violations.len(),
            first: first.value,
        })
    }

    /// Fail unless the volume is clean
    pub fn ensure_clean(&self) -> Result<()> {
        match self.to_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Scan every voxel against the catalog
///
/// Never stops at the first violation.
pub fn validate(volume: &LabelVolume, catalog: &LabelCatalog) -> ValidationReport {
    let violations: Vec<Violation> = volume
        .data
        .iter()
        .enumerate()
        .filter(|&(_, &v)| catalog.label_for_value(v).is_none())
        .map(|(index, &value)| Violation {
            index,
            coords: volume.coords(index),
            value,
        })
        .collect();

    for v in &violations {
        debug!("pixel with wrong value {} located at {:?}", v.value, v.coords);
    }
    if violations.is_empty() {
        info!("input has correct pixel integrity");
    } else {
        warn!("{} voxel(s) carry values outside the label catalog", violations.len());
    }
    ValidationReport { violations }
}

/// What to do with one invalid voxel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Set the voxel to 0
    Zero,
    /// Set the voxel to another label id, which must be in the catalog
    Remap(u32),
    /// Stop the conversion
    Abort,
}

/// Decides how invalid voxels are resolved
///
/// Interactive front ends implement this with an operator prompt; batch runs
/// use one of the fixed policies below.
pub trait CorrectionPolicy {
    fn decide(&mut self, violation: &Violation, catalog: &LabelCatalog) -> Correction;
}

impl<F> CorrectionPolicy for F
where
    F: FnMut(&Violation, &LabelCatalog) -> Correction,
{
    fn decide(&mut self, violation: &Violation, catalog: &LabelCatalog) -> Correction {
        self(violation, catalog)
    }
}

/// Zero out every invalid voxel
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroInvalid;

impl CorrectionPolicy for ZeroInvalid {
    fn decide(&mut self, _violation: &Violation, _catalog: &LabelCatalog) -> Correction {
        Correction::Zero
    }
}

/// Remap every invalid voxel to one label, aborting if that label is invalid
#[derive(Debug, Clone, Copy)]
pub struct RemapInvalid(pub u32);

impl CorrectionPolicy for RemapInvalid {
    fn decide(&mut self, _violation: &Violation, catalog: &LabelCatalog) -> Correction {
        if catalog.contains(self.0) {
            Correction::Remap(self.0)
        } else {
            Correction::Abort
        }
    }
}

/// Refuse to correct anything
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectInvalid;

impl CorrectionPolicy for RejectInvalid {
    fn decide(&mut self, _violation: &Violation, _catalog: &LabelCatalog) -> Correction {
        Correction::Abort
    }
}

/// Result of applying a correction policy
#[derive(Debug, Clone, PartialEq)]
pub struct Corrected {
    pub volume: LabelVolume,
    /// Number of voxels that were rewritten
    pub changed: usize,
}

impl Corrected {
    /// The corrected volume, when it differs from the input and should be
    /// persisted as a separate artifact
    pub fn corrected_volume(&self) -> Option<&LabelVolume> {
        (self.changed > 0).then_some(&self.volume)
    }
}

/// Apply `policy` to every violation of `report`
///
/// The input volume is left untouched. A remap target outside the catalog
/// fails with [`MappingError::InvalidReplacement`]; an abort fails with
/// [`MappingError::InvalidVoxelValue`].
pub fn apply_corrections<P: CorrectionPolicy + ?Sized>(
    volume: &LabelVolume,
    catalog: &LabelCatalog,
    report: &ValidationReport,
    policy: &mut P,
) -> Result<Corrected> {
    let mut corrected = volume.clone();
    let mut changed = 0;

    for violation in &report.violations {
        match policy.decide(violation, catalog) {
            Correction::Zero => {
                corrected.data[violation.index] = 0.0;
                changed += 1;
            }
            Correction::Remap(label) => {
                if !catalog.contains(label) {
                    return Err(MappingError::InvalidReplacement(label as f64));
                }
                corrected.data[violation.index] = label as f64;
                changed += 1;
            }
            Correction::Abort => {
                return Err(report.to_error().unwrap_or(MappingError::InvalidVoxelValue {
                    count: 1,
                    first: violation.value,
                }));
            }
        }
    }

    if changed > 0 {
        info!("corrected {} voxel(s); corrected volume available for saving", changed);
    }
    Ok(Corrected { volume: corrected, changed })
}

/// Distinct label ids present in a volume, skipping invalid values
pub fn present_labels(volume: &LabelVolume, catalog: &LabelCatalog) -> BTreeSet<u32> {
    volume
        .data
        .iter()
        .filter_map(|&v| catalog.label_for_value(v))
        .collect()
}
