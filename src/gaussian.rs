//! Gaussian-noise substitution
//!
//! Emulates intra-tissue variability. For every label present in the volume
//! a pool of `region_counts[tissue]` values is drawn from
//! N(piecewise value, sigma), where sigma is a per-(property, tissue)
//! override or the tissue's generic standard deviation. Each voxel then takes
//! one value drawn with replacement from its label's pool, so the noise has
//! no spatial structure within a region.
//!
//! Properties other than susceptibility are physically non-negative and
//! sampled values are folded to their absolute value.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::label_id_of;
use crate::error::{MappingError, Result};
use crate::properties::PropertyKind;
use crate::registry::LabelRegistry;
use crate::substitute::{piecewise_value, WATER_CHI};
use crate::volume::{LabelVolume, PropertyVolume};

/// Tissues sampled by [`GaussianMode::spinal_cord`]
pub const SPINAL_CORD_TISSUES: [&str; 2] = ["sc_wm", "sc_gm"];

/// Which tissues receive sampled values
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaussianMode {
    /// Every tissue is sampled
    #[default]
    AllRegions,
    /// Only the named tissues are sampled, the rest keep piecewise values
    Restricted(Vec<String>),
}

impl GaussianMode {
    /// Texture restricted to the spinal cord white and gray matter
    pub fn spinal_cord() -> Self {
        GaussianMode::Restricted(SPINAL_CORD_TISSUES.iter().map(|s| s.to_string()).collect())
    }

    pub fn includes(&self, tissue: &str) -> bool {
        match self {
            GaussianMode::AllRegions => true,
            GaussianMode::Restricted(names) => names.iter().any(|n| n == tissue),
        }
    }
}

/// Standard deviation for one (property, tissue) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdOverride {
    pub kind: PropertyKind,
    pub tissue: String,
    pub std_dev: f64,
}

fn std_for(overrides: &[StdOverride], kind: PropertyKind, tissue: &str, generic: f64) -> f64 {
    overrides
        .iter()
        .find(|o| o.kind == kind && o.tissue == tissue)
        .map_or(generic, |o| o.std_dev)
}

/// Sampled property volume plus the tissues that could not be sampled
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianOutput {
    pub volume: PropertyVolume,
    /// (tissue, property) pairs without a literature value; their voxels
    /// keep the piecewise fallback
    pub unsupported: Vec<(String, PropertyKind)>,
}

impl GaussianOutput {
    pub fn unsupported_errors(&self) -> Vec<MappingError> {
        self.unsupported
            .iter()
            .map(|(tissue, kind)| MappingError::UnsupportedPropertyForTissue {
                tissue: tissue.clone(),
                kind: *kind,
            })
            .collect()
    }
}

enum Pool {
    Flat(f64),
    Sampled(Vec<f64>),
}

/// Draw `n` values from N(mean, std_dev)
///
/// Unsigned properties are folded to `|x|`. `std_dev` must be finite and
/// non-negative.
pub fn sample_values<R: Rng + ?Sized>(
    mean: f64,
    std_dev: f64,
    n: usize,
    kind: PropertyKind,
    rng: &mut R,
) -> std::result::Result<Vec<f64>, rand_distr::NormalError> {
    if !(std_dev.is_finite() && std_dev >= 0.0) {
        return Err(rand_distr::NormalError::BadVariance);
    }
    let normal = Normal::new(mean, std_dev)?;
    Ok((0..n)
        .map(|_| {
            let x = normal.sample(rng);
            if kind.is_signed() { x } else { x.abs() }
        })
        .collect())
}

/// Gaussian substitution of `kind` over a validated label volume
///
/// `region_counts` comes from [`crate::stats::count_regions`] on the same
/// volume. A (tissue, property) pair without a literature value is reported
/// in [`GaussianOutput::unsupported`] and does not stop the other tissues;
/// susceptibility falls back to the water value instead.
pub fn substitute_gaussian<R: Rng + ?Sized>(
    volume: &LabelVolume,
    registry: &LabelRegistry,
    region_counts: &BTreeMap<String, usize>,
    kind: PropertyKind,
    mode: &GaussianMode,
    overrides: &[StdOverride],
    rng: &mut R,
) -> Result<GaussianOutput> {
    let present: BTreeSet<u32> = volume.data.iter().filter_map(|&v| label_id_of(v)).collect();

    let mut pools: BTreeMap<u32, Pool> = BTreeMap::new();
    let mut unsupported: Vec<(String, PropertyKind)> = Vec::new();

    for id in present {
        let Some(record) = registry.get(id) else {
            return Err(MappingError::InvalidVoxelValue { count: 1, first: id as f64 });
        };
        let tissue = record.name();
        let flat = piecewise_value(record, kind);

        if !mode.includes(tissue) {
            pools.insert(id, Pool::Flat(flat));
            continue;
        }

        let mean = match record.value(kind) {
            Some(v) => v,
            None if kind == PropertyKind::Susceptibility => WATER_CHI,
            None => {
                if !unsupported.iter().any(|(t, _)| t == tissue) {
                    warn!("gaussian {} for tissue '{}' is not supported yet", kind, tissue);
                    unsupported.push((tissue.to_string(), kind));
                }
                pools.insert(id, Pool::Flat(flat));
                continue;
            }
        };

        let std_dev = std_for(overrides, kind, tissue, record.std_dev);
        let n = region_counts.get(tissue).copied().unwrap_or(0).max(1);
        let samples = sample_values(mean, std_dev, n, kind, rng).map_err(|_| {
            MappingError::InvalidStdDev { tissue: tissue.to_string(), std_dev }
        })?;
        debug!("label {} ({}): {} samples, mean {}, std {}", id, tissue, n, mean, std_dev);
        pools.insert(id, Pool::Sampled(samples));
    }

    let mut out = PropertyVolume::zeros_like(volume, kind);
    for (dst, &v) in out.data.iter_mut().zip(volume.data.iter()) {
        let pool = label_id_of(v)
            .and_then(|id| pools.get(&id))
            .ok_or(MappingError::InvalidVoxelValue { count: 1, first: v })?;
        *dst = match pool {
            Pool::Flat(value) => *value,
            Pool::Sampled(samples) => samples[rng.gen_range(0..samples.len())],
        };
    }

    Ok(GaussianOutput { volume: out, unsupported })
}
