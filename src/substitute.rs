//! Piecewise label-to-property substitution
//!
//! Every voxel takes the value of its label's record. Missing values are
//! replaced per property:
//! - susceptibility: the water value, since unlabelled organs are mostly water
//! - T2*: a small positive floor so downstream signal models never divide by 0
//! - everything else: 0

use std::collections::BTreeMap;

use crate::catalog::label_id_of;
use crate::error::{MappingError, Result};
use crate::properties::PropertyKind;
use crate::registry::{LabelRecord, LabelRegistry};
use crate::volume::{LabelVolume, PropertyVolume};

/// Susceptibility of water (ppm), used for labels without a value
pub const WATER_CHI: f64 = -9.05;

/// T2* (ms) used for labels without a value
pub const T2STAR_FLOOR: f64 = 0.001;

/// Value written for `kind` on voxels of `record`
pub fn piecewise_value(record: &LabelRecord, kind: PropertyKind) -> f64 {
    let raw = record.value(kind);
    match kind {
        PropertyKind::Susceptibility => raw.unwrap_or(WATER_CHI),
        PropertyKind::T2Star => raw.unwrap_or(T2STAR_FLOOR),
        _ => raw.unwrap_or(0.0),
    }
}

/// Piecewise value per label id
pub fn value_table(registry: &LabelRegistry, kind: PropertyKind) -> BTreeMap<u32, f64> {
    registry
        .iter()
        .map(|r| (r.label_id, piecewise_value(r, kind)))
        .collect()
}

/// Map every voxel of `volume` to its label's value for `kind`
///
/// The volume must have been validated: a voxel without a record fails with
/// [`MappingError::InvalidVoxelValue`].
pub fn substitute(
    volume: &LabelVolume,
    registry: &LabelRegistry,
    kind: PropertyKind,
) -> Result<PropertyVolume> {
    let table = value_table(registry, kind);
    let mut out = PropertyVolume::zeros_like(volume, kind);

    for (dst, &v) in out.data.iter_mut().zip(volume.data.iter()) {
        *dst = label_id_of(v)
            .and_then(|id| table.get(&id))
            .copied()
            .ok_or(MappingError::InvalidVoxelValue { count: 1, first: v })?;
    }
    Ok(out)
}
