//! Label and property volumes
//!
//! Both containers store voxels as a flat buffer in Fortran (column-major)
//! order to match NIfTI convention: index = x + y*nx + z*nx*ny. The affine
//! is carried through untouched so outputs line up with the input image.

use crate::error::{MappingError, Result};
use crate::properties::PropertyKind;

/// 4x4 identity affine, row-major
pub const IDENTITY_AFFINE: [f64; 16] = [
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
];

/// Segmentation volume: one label id per voxel, stored as f64
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVolume {
    pub data: Vec<f64>,
    /// Dimensions (nx, ny, nz)
    pub dims: (usize, usize, usize),
    /// Voxel sizes in mm
    pub voxel_size: (f64, f64, f64),
    /// Affine transformation matrix (4x4, row-major)
    pub affine: [f64; 16],
}

impl LabelVolume {
    /// Wrap a Fortran-ordered buffer
    pub fn new(
        data: Vec<f64>,
        dims: (usize, usize, usize),
        voxel_size: (f64, f64, f64),
        affine: [f64; 16],
    ) -> Result<Self> {
        let expected = dims.0 * dims.1 * dims.2;
        if data.len() != expected {
            return Err(MappingError::ShapeMismatch { expected, actual: data.len() });
        }
        Ok(Self { data, dims, voxel_size, affine })
    }

    /// Build from nested `[x][y][z]` arrays with unit voxels and identity affine
    pub fn from_nested(values: &[Vec<Vec<f64>>]) -> Result<Self> {
        let nx = values.len();
        let ny = values.first().map_or(0, |plane| plane.len());
        let nz = values
            .first()
            .and_then(|plane| plane.first())
            .map_or(0, |row| row.len());

        let mut data = vec![0.0; nx * ny * nz];
        for (i, plane) in values.iter().enumerate() {
            if plane.len() != ny {
                return Err(MappingError::ShapeMismatch { expected: ny, actual: plane.len() });
            }
            for (j, row) in plane.iter().enumerate() {
                if row.len() != nz {
                    return Err(MappingError::ShapeMismatch { expected: nz, actual: row.len() });
                }
                for (k, &v) in row.iter().enumerate() {
                    data[i + j * nx + k * nx * ny] = v;
                }
            }
        }
        Self::new(data, (nx, ny, nz), (1.0, 1.0, 1.0), IDENTITY_AFFINE)
    }

    /// Volume filled with a single label
    pub fn uniform(dims: (usize, usize, usize), label: f64) -> Self {
        Self {
            data: vec![label; dims.0 * dims.1 * dims.2],
            dims,
            voxel_size: (1.0, 1.0, 1.0),
            affine: IDENTITY_AFFINE,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat index of voxel (i, j, k)
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        let (nx, ny, _) = self.dims;
        i + j * nx + k * nx * ny
    }

    /// Voxel coordinates of a flat index
    pub fn coords(&self, idx: usize) -> (usize, usize, usize) {
        let (nx, ny, _) = self.dims;
        (idx % nx, (idx / nx) % ny, idx / (nx * ny))
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[self.index(i, j, k)]
    }
}

/// Derived property map, shape-identical to its source label volume
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyVolume {
    pub kind: PropertyKind,
    pub data: Vec<f64>,
    pub dims: (usize, usize, usize),
    pub voxel_size: (f64, f64, f64),
    pub affine: [f64; 16],
}

impl PropertyVolume {
    /// Zero-initialised map with the geometry of `labels`
    pub fn zeros_like(labels: &LabelVolume, kind: PropertyKind) -> Self {
        Self {
            kind,
            data: vec![0.0; labels.len()],
            dims: labels.dims,
            voxel_size: labels.voxel_size,
            affine: labels.affine,
        }
    }

    /// Default output file name, e.g. `sus_dist.nii.gz`
    pub fn default_file_name(&self) -> String {
        format!("{}.nii.gz", self.kind.file_stem())
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        let (nx, ny, _) = self.dims;
        self.data[i + j * nx + k * nx * ny]
    }
}
