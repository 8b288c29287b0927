//! Common test utilities for mrprop-core integration tests

#![allow(dead_code)]

use mrprop_core::LabelVolume;

/// Output values at every voxel whose label equals `label`
pub fn values_for_label(labels: &LabelVolume, output: &[f64], label: u32) -> Vec<f64> {
    labels
        .data
        .iter()
        .zip(output)
        .filter(|&(&l, _)| l == label as f64)
        .map(|(_, &v)| v)
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Synthetic spinal phantom on the TotalSeg_CT mod2 label set
///
/// Background air (0) with a vertebra block (27, vertebrae_L5) around a
/// cord made of white matter (196) with a gray matter core (324) and a CSF
/// ring (289). Fat (264) fills the first slab.
pub fn spinal_phantom(n: usize) -> LabelVolume {
    let mut vol = LabelVolume::uniform((n, n, n), 0.0);
    let c = n as f64 / 2.0;
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                let r = ((i as f64 + 0.5 - c).powi(2) + (j as f64 + 0.5 - c).powi(2)).sqrt();
                let label = if k == 0 {
                    264.0
                } else if r < n as f64 * 0.1 {
                    324.0
                } else if r < n as f64 * 0.2 {
                    196.0
                } else if r < n as f64 * 0.25 {
                    289.0
                } else if r < n as f64 * 0.4 {
                    27.0
                } else {
                    0.0
                };
                let idx = vol.index(i, j, k);
                vol.data[idx] = label;
            }
        }
    }
    vol
}

/// Scratch directory unique to this test process
pub fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("mrprop_it_{}_{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}
