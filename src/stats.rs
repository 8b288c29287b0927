//! Region statistics

use std::collections::BTreeMap;

use crate::catalog::LabelCatalog;
use crate::volume::LabelVolume;

/// Voxel count per tissue name
///
/// Labels sharing a tissue name are aggregated. Values that are not catalog
/// label ids are skipped; validate first.
pub fn count_regions(volume: &LabelVolume, catalog: &LabelCatalog) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (id, n) in count_labels(volume, catalog) {
        if let Some(entry) = catalog.get(id) {
            *counts.entry(entry.tissue_name.clone()).or_insert(0) += n;
        }
    }
    counts
}

/// Voxel count per label id
pub fn count_labels(volume: &LabelVolume, catalog: &LabelCatalog) -> BTreeMap<u32, usize> {
    let mut counts = BTreeMap::new();
    for &v in &volume.data {
        if let Some(id) = catalog.label_for_value(v) {
            *counts.entry(id).or_insert(0) += 1;
        }
    }
    counts
}
