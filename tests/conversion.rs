//! End-to-end conversion tests

mod common;

use proptest::prelude::*;

use mrprop_core::catalog::DEFAULT_OVERRIDE_CHI;
use mrprop_core::export::{write_csv, CSV_HEADER};
use mrprop_core::nifti_io::{load_label_volume, save_label_volume, save_property_volume, CORRECTED_LABELS_FILE};
use mrprop_core::properties::{self, lookup};
use mrprop_core::substitute::{T2STAR_FLOOR, WATER_CHI};
use mrprop_core::validate::{Correction, Violation};
use mrprop_core::{
    ConversionOptions, LabelCatalog, LabelVolume, MappingError, PropertyKind, RejectInvalid,
    RemapInvalid, Stage, ToolCatalog, VolumeMapper, ZeroInvalid,
};

#[test]
fn test_air_bone_susceptibility() {
    let volume = LabelVolume::from_nested(&[
        vec![vec![0.0, 0.0], vec![1.0, 1.0]],
        vec![vec![0.0, 0.0], vec![1.0, 1.0]],
    ])
    .unwrap();
    let mut mapper = VolumeMapper::new(volume.clone());
    mapper
        .install(LabelCatalog::from_entries([(0, "air", 0.35), (1, "bone", -9.0)]), None)
        .unwrap();

    let chi = mapper.substitute(PropertyKind::Susceptibility).unwrap();
    for i in 0..2 {
        for j in 0..2 {
            for k in 0..2 {
                let expected = if volume.get(i, j, k) == 0.0 { 0.35 } else { -9.0 };
                assert_eq!(chi.get(i, j, k), expected, "voxel ({}, {}, {})", i, j, k);
            }
        }
    }
}

#[test]
fn test_sinus_t2star_uses_floor() {
    let mut mapper = VolumeMapper::new(LabelVolume::uniform((3, 3, 3), 2.0));
    let opts = ConversionOptions::new("custom_chi", "v1", PropertyKind::T2Star);
    let out = mapper.convert(&opts, &mut RejectInvalid).unwrap();
    assert!(
        out.property.data.iter().all(|&v| v == T2STAR_FLOOR),
        "sinus T2* must be the floor, not zero"
    );
}

#[test]
fn test_custom_chi_override_and_fallback() {
    let volume = LabelVolume::uniform((2, 2, 2), 2.0);

    let mut opts = ConversionOptions::new("custom_chi", "v1", PropertyKind::Susceptibility);
    opts.override_chi = Some(-4.2);
    let out = VolumeMapper::new(volume.clone()).convert(&opts, &mut RejectInvalid).unwrap();
    assert!(out.property.data.iter().all(|&v| v == -4.2));

    opts.override_chi = None;
    let out = VolumeMapper::new(volume).convert(&opts, &mut RejectInvalid).unwrap();
    assert!(out.property.data.iter().all(|&v| v == DEFAULT_OVERRIDE_CHI));
}

#[test]
fn test_reference_chi_rebaselines_map() {
    let mut opts = ConversionOptions::new("TotalSeg_CT", "v2", PropertyKind::Susceptibility);
    opts.reference_chi = Some(WATER_CHI);
    let out = VolumeMapper::new(LabelVolume::uniform((2, 2, 2), 25.0))
        .convert(&opts, &mut RejectInvalid)
        .unwrap();
    // bone -9.0 against water -9.05
    assert!(out.property.data.iter().all(|&v| (v - 0.05).abs() < 1e-12));
}

#[test]
fn test_invalid_voxel_is_flagged_and_blocks_conversion() {
    let mut volume = LabelVolume::uniform((4, 4, 4), 0.0);
    let idx = volume.index(1, 2, 3);
    volume.data[idx] = 500.0;

    let mut mapper = VolumeMapper::new(volume.clone());
    mapper.resolve("TotalSeg_CT", "v2", None, None).unwrap();
    let report = mapper.validate().unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.violations[0].coords, (1, 2, 3));
    assert_eq!(report.violations[0].value, 500.0);

    let opts = ConversionOptions::new("TotalSeg_CT", "v2", PropertyKind::Susceptibility);
    let err = VolumeMapper::new(volume).convert(&opts, &mut RejectInvalid).unwrap_err();
    assert!(matches!(err, MappingError::InvalidVoxelValue { count: 1, .. }));
    assert_eq!(err.stage(), Stage::Validation);
}

#[test]
fn test_remap_produces_corrected_volume() {
    let mut volume = LabelVolume::uniform((3, 3, 3), 25.0);
    volume.data[4] = 1.5;
    volume.data[9] = 900.0;

    let opts = ConversionOptions::new("TotalSeg_CT", "v2", PropertyKind::Pd);
    let out = VolumeMapper::new(volume)
        .convert(&opts, &mut RemapInvalid(25))
        .unwrap();
    let corrected = out.corrected.expect("corrected volume");
    assert_eq!(corrected.data[4], 25.0);
    assert_eq!(corrected.data[9], 25.0);
    assert!(out.property.data.iter().all(|&v| v == lookup("bone").pd));
}

#[test]
fn test_remap_to_invalid_label_aborts() {
    let mut volume = LabelVolume::uniform((2, 2, 2), 0.0);
    volume.data[0] = 7.5;
    let opts = ConversionOptions::new("charles", "v1", PropertyKind::Susceptibility);

    let err = VolumeMapper::new(volume.clone())
        .convert(&opts, &mut RemapInvalid(42))
        .unwrap_err();
    assert!(matches!(err, MappingError::InvalidVoxelValue { .. }));

    let mut per_voxel = |v: &Violation, _: &LabelCatalog| {
        if v.index == 0 { Correction::Remap(42) } else { Correction::Zero }
    };
    let err = VolumeMapper::new(volume).convert(&opts, &mut per_voxel).unwrap_err();
    assert!(matches!(err, MappingError::InvalidReplacement(v) if v == 42.0));
}

#[test]
fn test_unknown_tool_and_version() {
    let volume = LabelVolume::uniform((1, 1, 1), 0.0);
    let opts = ConversionOptions::new("FreeSurfer", "v1", PropertyKind::Susceptibility);
    let err = VolumeMapper::new(volume.clone()).convert(&opts, &mut ZeroInvalid).unwrap_err();
    assert!(matches!(err, MappingError::UnknownTool(_)));

    let opts = ConversionOptions::new("ProCord_MRI", "v1", PropertyKind::Susceptibility);
    let err = VolumeMapper::new(volume).convert(&opts, &mut ZeroInvalid).unwrap_err();
    assert!(matches!(err, MappingError::UnsupportedToolVersion { .. }));
    assert_eq!(err.stage(), Stage::Catalog);
}

#[test]
fn test_electrical_maps_for_mri_tool() {
    // label 21 is spinal_cord in TotalSeg_MRI
    let volume = LabelVolume::uniform((2, 2, 1), 21.0);
    for (kind, expected) in [
        (PropertyKind::Permittivity3T, 44.1),
        (PropertyKind::Conductivity3T, 0.354),
        (PropertyKind::Permittivity7T, 36.9),
        (PropertyKind::Conductivity7T, 0.418),
    ] {
        let opts = ConversionOptions::new("TotalSeg_MRI", "v1", kind);
        let out = VolumeMapper::new(volume.clone()).convert(&opts, &mut RejectInvalid).unwrap();
        assert!(out.property.data.iter().all(|&v| v == expected), "{} map", kind);
    }
}

#[test]
fn test_table_lists_each_tissue_once() {
    let opts = ConversionOptions::new("TotalSeg_CT", "mod2", PropertyKind::Susceptibility);
    let mut mapper = VolumeMapper::new(LabelVolume::uniform((2, 2, 2), 0.0));
    let out = mapper.convert(&opts, &mut RejectInvalid).unwrap();

    let mut names: Vec<&str> = out.table.iter().map(|r| r.name.as_str()).collect();
    let total = names.len();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), total, "tissue names must be unique");
    assert!(names.contains(&"sc_wm") && names.contains(&"fat"));
}

#[test]
fn test_files_end_to_end() {
    let dir = common::scratch_dir("e2e");
    let mut labels = common::spinal_phantom(10);
    labels.data[0] = 1000.0;
    let input = dir.join("labels.nii.gz");
    save_label_volume(&labels, &input).unwrap();

    let loaded = load_label_volume(&input).unwrap();
    assert_eq!(loaded.data, labels.data);

    let opts = ConversionOptions::new("TotalSeg_CT", "mod2", PropertyKind::Susceptibility);
    let out = VolumeMapper::new(loaded).convert(&opts, &mut ZeroInvalid).unwrap();

    let chi_path = save_property_volume(&out.property, &dir).unwrap();
    assert!(chi_path.ends_with("sus_dist.nii.gz"));
    let corrected = out.corrected.as_ref().expect("one voxel was zeroed");
    let corrected_path = dir.join(CORRECTED_LABELS_FILE);
    save_label_volume(corrected, &corrected_path).unwrap();
    assert_eq!(load_label_volume(&corrected_path).unwrap().data[0], 0.0);

    let csv_path = dir.join("tissues.csv");
    write_csv(&out.table, std::fs::File::create(&csv_path).unwrap()).unwrap();
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert!(csv.starts_with(CSV_HEADER));
    assert!(csv.contains(",sc_gm,-9.03"), "{}", csv);

    let chi = load_label_volume(&chi_path).unwrap();
    let wm = common::values_for_label(corrected, &chi.data, 196);
    assert!(!wm.is_empty());
    assert!(wm.iter().all(|&v| (v + 9.083).abs() < 1e-5));

    std::fs::remove_dir_all(&dir).ok();
}

fn supported_pairs() -> Vec<(&'static str, &'static str)> {
    ToolCatalog::tools()
        .iter()
        .flat_map(|&tool| {
            ToolCatalog::versions(tool)
                .into_iter()
                .map(move |version| (tool.id(), version))
        })
        .collect()
}

fn baseline_labels() -> Vec<(&'static str, u32)> {
    supported_pairs()
        .into_iter()
        .filter(|(tool, version)| {
            let tool = tool.parse().unwrap();
            ToolCatalog::baseline_version(tool) == Some(*version)
        })
        .flat_map(|(tool, version)| {
            let ids: Vec<u32> = ToolCatalog::resolve(tool, version, None).unwrap().ids().collect();
            ids.into_iter().map(move |id| (tool, id))
        })
        .collect()
}

proptest! {
    #[test]
    fn lookup_is_pure(name in prop::sample::select(properties::tissue_names().collect::<Vec<_>>())) {
        let first = lookup(name);
        let second = lookup(name);
        prop_assert_eq!(first, second);
        prop_assert!(properties::is_known(name));
    }

    #[test]
    fn versions_extend_their_baseline(pair in prop::sample::select(supported_pairs())) {
        let (tool_id, version) = pair;
        let tool = tool_id.parse().unwrap();
        let base_tag = ToolCatalog::baseline_version(tool).unwrap();
        let base = ToolCatalog::resolve(tool_id, base_tag, None).unwrap();
        let resolved = ToolCatalog::resolve(tool_id, version, None).unwrap();

        for id in base.ids() {
            prop_assert!(resolved.contains(id), "{} {} drops label {}", tool_id, version, id);
        }
        if version == base_tag {
            prop_assert_eq!(resolved.ids().collect::<Vec<_>>(), base.ids().collect::<Vec<_>>());
        }
    }

    #[test]
    fn uniform_volume_maps_to_its_susceptibility(pick in prop::sample::select(baseline_labels())) {
        let (tool_id, id) = pick;
        let tool = tool_id.parse().unwrap();
        let version = ToolCatalog::baseline_version(tool).unwrap();
        let mut mapper = VolumeMapper::new(LabelVolume::uniform((2, 3, 2), id as f64));
        mapper.resolve(tool_id, version, None, None).unwrap();

        let expected = mapper
            .registry()
            .unwrap()
            .get(id)
            .and_then(|r| r.susceptibility)
            .unwrap_or(WATER_CHI);
        let chi = mapper.substitute(PropertyKind::Susceptibility).unwrap();
        prop_assert!(chi.data.iter().all(|&v| v == expected));
    }
}
