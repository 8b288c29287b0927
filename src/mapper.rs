//! Volume mapper
//!
//! Owns one label volume and, once a catalog has been resolved, the label
//! registry derived from it. A mapper serves a single conversion: resolve,
//! validate, correct, then substitute.
//!
//! # Example
//!
//! ```ignore
//! let mut mapper = VolumeMapper::new(volume);
//! mapper.resolve("TotalSeg_CT", "mod2", None, None)?;
//! mapper.correct(&mut ZeroInvalid)?;
//! let chi = mapper.substitute(PropertyKind::Susceptibility)?;
//! ```

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::catalog::{LabelCatalog, ToolCatalog};
use crate::error::{MappingError, Result};
use crate::export::{susceptibility_table, TissueRow};
use crate::gaussian::{self, GaussianMode, GaussianOutput, StdOverride};
use crate::options::ConversionOptions;
use crate::properties::PropertyKind;
use crate::registry::{LabelRecord, LabelRegistry};
use crate::stats;
use crate::substitute;
use crate::validate::{self, CorrectionPolicy, ValidationReport};
use crate::volume::{LabelVolume, PropertyVolume};

/// A resolved catalog and the registry grouped from it
#[derive(Debug, Clone)]
pub struct Resolution {
    pub catalog: LabelCatalog,
    pub registry: LabelRegistry,
    /// Susceptibility subtracted from every catalog value
    pub reference_chi: Option<f64>,
}

/// Everything one conversion hands to the persistence layer
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub property: PropertyVolume,
    /// Present only when at least one voxel was corrected
    pub corrected: Option<LabelVolume>,
    pub table: Vec<TissueRow>,
    /// Tissue names that did not match the property table
    pub degraded_tissues: Vec<String>,
    /// (tissue, property) pairs Gaussian mode could not sample
    pub unsupported: Vec<(String, PropertyKind)>,
}

#[derive(Debug, Clone)]
pub struct VolumeMapper {
    volume: LabelVolume,
    resolution: Option<Resolution>,
}

impl VolumeMapper {
    pub fn new(volume: LabelVolume) -> Self {
        Self { volume, resolution: None }
    }

    pub fn volume(&self) -> &LabelVolume {
        &self.volume
    }

    pub fn into_volume(self) -> LabelVolume {
        self.volume
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Resolve the catalog for `(tool, version)` and group the registry
    ///
    /// Replaces any earlier resolution.
    pub fn resolve(
        &mut self,
        tool: &str,
        version: &str,
        override_chi: Option<f64>,
        reference_chi: Option<f64>,
    ) -> Result<&LabelRegistry> {
        let catalog = ToolCatalog::resolve(tool, version, override_chi)?;
        self.install(catalog, reference_chi)
    }

    /// Use an already built catalog
    pub fn install(&mut self, catalog: LabelCatalog, reference_chi: Option<f64>) -> Result<&LabelRegistry> {
        let registry = LabelRegistry::group(&catalog, reference_chi)?;
        let resolution = self.resolution.insert(Resolution { catalog, registry, reference_chi });
        Ok(&resolution.registry)
    }

    fn resolution(&self) -> Result<&Resolution> {
        self.resolution.as_ref().ok_or(MappingError::CatalogNotResolved)
    }

    pub fn catalog(&self) -> Result<&LabelCatalog> {
        Ok(&self.resolution()?.catalog)
    }

    pub fn registry(&self) -> Result<&LabelRegistry> {
        Ok(&self.resolution()?.registry)
    }

    /// Records ordered by label id
    pub fn labels(&self) -> Result<impl Iterator<Item = &LabelRecord>> {
        Ok(self.registry()?.iter())
    }

    /// Re-bind one label of the current resolution to another tissue
    ///
    /// `chi` is an absolute value; the resolution's reference is subtracted
    /// like it is for every other label.
    pub fn manual_label(&mut self, label_id: u32, name: &str, chi: f64) -> Result<()> {
        let resolution = self.resolution.as_mut().ok_or(MappingError::CatalogNotResolved)?;
        resolution.catalog.rebind(label_id, name, chi)?;
        resolution.registry.set_name(label_id, name)?;
        let shifted = chi - resolution.reference_chi.unwrap_or(0.0);
        resolution.registry.set_susceptibility(label_id, shifted)?;
        info!("label {} re-bound to '{}' (chi = {})", label_id, name, chi);
        Ok(())
    }

    pub fn validate(&self) -> Result<ValidationReport> {
        Ok(validate::validate(&self.volume, self.catalog()?))
    }

    /// Validate and resolve every violation through `policy`
    ///
    /// On success the mapper continues with the corrected volume, which is
    /// also returned when any voxel changed so it can be saved separately.
    pub fn correct<P: CorrectionPolicy + ?Sized>(&mut self, policy: &mut P) -> Result<Option<LabelVolume>> {
        let catalog = self.catalog()?;
        let report = validate::validate(&self.volume, catalog);
        if report.is_clean() {
            return Ok(None);
        }
        let fixed = validate::apply_corrections(&self.volume, catalog, &report, policy)?;
        let changed = fixed.corrected_volume().cloned();
        self.volume = fixed.volume;
        Ok(changed)
    }

    /// Voxel count per tissue name
    pub fn count_regions(&self) -> Result<BTreeMap<String, usize>> {
        Ok(stats::count_regions(&self.volume, self.catalog()?))
    }

    /// Piecewise map of `kind`
    pub fn substitute(&self, kind: PropertyKind) -> Result<PropertyVolume> {
        self.validate()?.ensure_clean()?;
        substitute::substitute(&self.volume, self.registry()?, kind)
    }

    /// Gaussian map of `kind`, drawing from `rng`
    pub fn substitute_gaussian<R: Rng + ?Sized>(
        &self,
        kind: PropertyKind,
        mode: &GaussianMode,
        overrides: &[StdOverride],
        rng: &mut R,
    ) -> Result<GaussianOutput> {
        self.validate()?.ensure_clean()?;
        let counts = self.count_regions()?;
        gaussian::substitute_gaussian(&self.volume, self.registry()?, &counts, kind, mode, overrides, rng)
    }

    /// Per-tissue susceptibility rows of the current resolution
    pub fn susceptibility_table(&self) -> Result<Vec<TissueRow>> {
        Ok(susceptibility_table(self.registry()?))
    }

    /// Run one full conversion request
    pub fn convert<P: CorrectionPolicy + ?Sized>(
        &mut self,
        options: &ConversionOptions,
        policy: &mut P,
    ) -> Result<ConversionOutput> {
        self.convert_with(options, policy, |_| Ok(()))
    }

    /// Like [`convert`](Self::convert), handing a corrected volume to
    /// `on_corrected` before any substitution runs
    ///
    /// An error from `on_corrected` stops the conversion.
    pub fn convert_with<P, F>(
        &mut self,
        options: &ConversionOptions,
        policy: &mut P,
        mut on_corrected: F,
    ) -> Result<ConversionOutput>
    where
        P: CorrectionPolicy + ?Sized,
        F: FnMut(&LabelVolume) -> Result<()>,
    {
        self.resolve(&options.tool, &options.version, options.override_chi, options.reference_chi)?;
        let corrected = self.correct(policy)?;
        if let Some(volume) = &corrected {
            on_corrected(volume)?;
        }

        let (property, unsupported) = if options.gaussian {
            let mut rng = match options.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let out = self.substitute_gaussian(
                options.kind,
                &options.gaussian_mode,
                &options.std_overrides,
                &mut rng,
            )?;
            (out.volume, out.unsupported)
        } else {
            (self.substitute(options.kind)?, Vec::new())
        };

        let registry = self.registry()?;
        info!("{} map ready ({} voxels)", options.kind, property.data.len());
        Ok(ConversionOutput {
            property,
            corrected,
            table: susceptibility_table(registry),
            degraded_tissues: registry.degraded_tissues(),
            unsupported,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{RejectInvalid, ZeroInvalid};

    fn two_label_volume() -> LabelVolume {
        LabelVolume::from_nested(&[
            vec![vec![0.0, 0.0], vec![1.0, 1.0]],
            vec![vec![0.0, 0.0], vec![1.0, 1.0]],
        ])
        .unwrap()
    }

    fn air_bone() -> LabelCatalog {
        LabelCatalog::from_entries([(0, "air", 0.35), (1, "bone", -9.0)])
    }

    #[test]
    fn test_unresolved_mapper_refuses_work() {
        let mapper = VolumeMapper::new(two_label_volume());
        assert!(!mapper.is_resolved());
        assert!(matches!(mapper.substitute(PropertyKind::Pd), Err(MappingError::CatalogNotResolved)));
        assert!(matches!(mapper.count_regions(), Err(MappingError::CatalogNotResolved)));
        assert!(matches!(mapper.validate(), Err(MappingError::CatalogNotResolved)));
    }

    #[test]
    fn test_substitute_after_install() {
        let mut mapper = VolumeMapper::new(two_label_volume());
        mapper.install(air_bone(), None).unwrap();
        let out = mapper.substitute(PropertyKind::Susceptibility).unwrap();
        for (label, value) in mapper.volume().data.iter().zip(&out.data) {
            let expected = if *label == 0.0 { 0.35 } else { -9.0 };
            assert_eq!(*value, expected);
        }
    }

    #[test]
    fn test_invalid_voxels_block_substitution() {
        let mut vol = two_label_volume();
        vol.data[5] = 9.0;
        let mut mapper = VolumeMapper::new(vol);
        mapper.install(air_bone(), None).unwrap();
        assert!(matches!(
            mapper.substitute(PropertyKind::T1),
            Err(MappingError::InvalidVoxelValue { count: 1, .. })
        ));
        assert!(mapper.correct(&mut RejectInvalid).is_err());

        let corrected = mapper.correct(&mut ZeroInvalid).unwrap();
        assert_eq!(corrected.map(|v| v.data[5]), Some(0.0));
        assert!(mapper.substitute(PropertyKind::T1).is_ok());
        // nothing left to correct
        assert!(mapper.correct(&mut RejectInvalid).unwrap().is_none());
    }

    #[test]
    fn test_manual_label() {
        let mut mapper = VolumeMapper::new(two_label_volume());
        assert!(matches!(mapper.manual_label(1, "fat", -8.92), Err(MappingError::CatalogNotResolved)));
        mapper.install(air_bone(), None).unwrap();
        mapper.manual_label(1, "fat", -8.92).unwrap();

        let rec = mapper.registry().unwrap().get(1).unwrap();
        assert_eq!(rec.name(), "fat");
        assert_eq!(rec.t1, Some(401.2));
        assert_eq!(mapper.count_regions().unwrap().get("fat"), Some(&4));
        assert!(matches!(mapper.manual_label(7, "fat", 0.0), Err(MappingError::UnknownLabelId(7))));

        let ids: Vec<u32> = mapper.labels().unwrap().map(|r| r.label_id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_manual_label_follows_reference_chi() {
        let mut mapper = VolumeMapper::new(two_label_volume());
        mapper.install(air_bone(), Some(-9.05)).unwrap();
        mapper.manual_label(1, "fat", -8.92).unwrap();

        let chi = mapper.registry().unwrap().get(1).unwrap().susceptibility.unwrap();
        assert!((chi - 0.13).abs() < 1e-12, "re-bound chi {}", chi);
        assert_eq!(mapper.catalog().unwrap().get(1).unwrap().susceptibility, -8.92);
        let air = mapper.registry().unwrap().get(0).unwrap().susceptibility.unwrap();
        assert!((air - 9.40).abs() < 1e-12);
    }

    #[test]
    fn test_corrected_volume_survives_failed_substitution() {
        let mut vol = LabelVolume::uniform((2, 2, 2), 25.0);
        vol.data[3] = 999.0;
        let mut opts = ConversionOptions::new("TotalSeg_CT", "v2", PropertyKind::T1);
        opts.gaussian = true;
        opts.seed = Some(4);
        opts.std_overrides = vec![StdOverride {
            kind: PropertyKind::T1,
            tissue: "bone".into(),
            std_dev: f64::INFINITY,
        }];

        let mut saved = Vec::new();
        let mut mapper = VolumeMapper::new(vol);
        let err = mapper
            .convert_with(&opts, &mut ZeroInvalid, |v| {
                saved.push(v.clone());
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidStdDev { .. }));
        assert_eq!(saved.len(), 1, "corrected volume handed out before substitution");
        assert_eq!(saved[0].data[3], 0.0);
    }

    #[test]
    fn test_failing_hook_stops_conversion() {
        let mut vol = LabelVolume::uniform((2, 1, 1), 25.0);
        vol.data[1] = 0.5;
        let opts = ConversionOptions::new("TotalSeg_CT", "v2", PropertyKind::Pd);
        let mut mapper = VolumeMapper::new(vol);
        let result = mapper.convert_with(&opts, &mut ZeroInvalid, |_| {
            Err(MappingError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        });
        assert!(matches!(result, Err(MappingError::Io(_))));

        // clean volumes never call the hook
        let mut clean = VolumeMapper::new(LabelVolume::uniform((2, 1, 1), 25.0));
        let mut calls = 0;
        clean
            .convert_with(&opts, &mut RejectInvalid, |_| {
                calls += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_convert_piecewise() {
        let mut mapper = VolumeMapper::new(LabelVolume::uniform((2, 2, 2), 25.0));
        let opts = ConversionOptions::new("TotalSeg_CT", "v2", PropertyKind::T2Star);
        let out = mapper.convert(&opts, &mut RejectInvalid).unwrap();
        let bone_t2s = mapper.registry().unwrap().get(25).unwrap().t2star.unwrap();
        assert!(out.property.data.iter().all(|&v| v == bone_t2s));
        assert!(out.corrected.is_none());
        assert!(out.degraded_tissues.is_empty());
        assert!(!out.table.is_empty());
    }

    #[test]
    fn test_convert_unsupported_version() {
        let mut mapper = VolumeMapper::new(LabelVolume::uniform((1, 1, 1), 0.0));
        let opts = ConversionOptions::new("TotalSeg_CT", "v9", PropertyKind::Susceptibility);
        let err = mapper.convert(&opts, &mut RejectInvalid).unwrap_err();
        assert!(err.report().starts_with("catalog resolution failed"), "{}", err.report());
        assert!(!mapper.is_resolved());
    }

    #[test]
    fn test_convert_gaussian_is_seeded() {
        let run = || {
            let mut mapper = VolumeMapper::new(LabelVolume::uniform((3, 3, 3), 25.0));
            let mut opts = ConversionOptions::new("TotalSeg_CT", "v2", PropertyKind::Pd);
            opts.gaussian = true;
            opts.seed = Some(99);
            mapper.convert(&opts, &mut RejectInvalid).unwrap().property
        };
        let a = run();
        assert_eq!(a, run());
        assert!(a.data.iter().all(|&v| v >= 0.0));
    }
}
