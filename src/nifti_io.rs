//! NIfTI volume I/O
//!
//! Label volumes are read from `.nii` or `.nii.gz` (gzip is detected from
//! the magic bytes, not the extension). Property maps and corrected label
//! volumes are written as single-file NIfTI-1 with float32 voxels, carrying
//! the source affine in the sform rows.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{Array, Axis};
use nifti::volume::ndarray::IntoNdArray;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject};
use tracing::{debug, info};

use crate::error::{MappingError, Result};
use crate::volume::{LabelVolume, PropertyVolume};

/// File name used for a corrected label volume
pub const CORRECTED_LABELS_FILE: &str = "corrected_pixels.nii.gz";

const HEADER_SIZE: usize = 348;
const VOX_OFFSET: usize = 352;

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// Short description of a raw header, appended to decode errors
fn header_summary(bytes: &[u8]) -> String {
    if bytes.len() < HEADER_SIZE {
        return format!("{} bytes, header needs {}", bytes.len(), HEADER_SIZE);
    }
    let sizeof_hdr = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let magic = String::from_utf8_lossy(&bytes[344..348]).to_string();
    let datatype = i16::from_le_bytes([bytes[70], bytes[71]]);
    format!("sizeof_hdr={}, magic='{}', datatype={}", sizeof_hdr, magic, datatype)
}

/// Decode a label volume from NIfTI bytes
///
/// Only the first 3D volume is kept when the file has extra dimensions.
pub fn read_label_volume(bytes: &[u8]) -> Result<LabelVolume> {
    let obj: InMemNiftiObject = if is_gzip(bytes) {
        InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes))).map_err(|e| {
            let mut raw = Vec::new();
            let detail = match std::io::Read::read_to_end(&mut GzDecoder::new(Cursor::new(bytes)), &mut raw) {
                Ok(_) => header_summary(&raw),
                Err(_) => "corrupt gzip stream".to_string(),
            };
            MappingError::Nifti(format!("failed to read gzipped volume: {} ({})", e, detail))
        })?
    } else {
        InMemNiftiObject::from_reader(Cursor::new(bytes)).map_err(|e| {
            MappingError::Nifti(format!("failed to read volume: {} ({})", e, header_summary(bytes)))
        })?
    };

    let header = obj.header();
    if header.dim[0] < 3 {
        return Err(MappingError::Nifti(format!(
            "expected a 3D label volume, got {}D",
            header.dim[0]
        )));
    }
    let voxel_size = (
        header.pixdim[1] as f64,
        header.pixdim[2] as f64,
        header.pixdim[3] as f64,
    );
    let affine = get_affine(header);

    let array: Array<f64, _> = obj
        .into_volume()
        .into_ndarray()
        .map_err(|e| MappingError::Nifti(format!("failed to convert voxels: {}", e)))?;
    if array.ndim() < 3 {
        return Err(MappingError::Nifti(format!("expected a 3D array, got {}D", array.ndim())));
    }
    let mut view = array.view();
    while view.ndim() > 3 {
        let last = view.ndim() - 1;
        if view.len_of(Axis(last)) == 0 {
            return Err(MappingError::Nifti(format!("dimension {} of the volume is empty", last + 1)));
        }
        view = view.index_axis_move(Axis(last), 0);
    }
    let (nx, ny, nz) = (view.shape()[0], view.shape()[1], view.shape()[2]);

    let mut data = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                data.push(view[[i, j, k]]);
            }
        }
    }

    debug!("decoded label volume {}x{}x{}", nx, ny, nz);
    LabelVolume::new(data, (nx, ny, nz), voxel_size, affine)
}

/// Read a label volume from disk
pub fn load_label_volume(path: &Path) -> Result<LabelVolume> {
    let bytes = std::fs::read(path)?;
    let volume = read_label_volume(&bytes)?;
    info!(
        "loaded {} ({}x{}x{})",
        path.display(),
        volume.dims.0,
        volume.dims.1,
        volume.dims.2
    );
    Ok(volume)
}

/// Affine from the sform rows, or a voxel-size diagonal without sform
fn get_affine(header: &NiftiHeader) -> [f64; 16] {
    if header.sform_code > 0 {
        let x = &header.srow_x;
        let y = &header.srow_y;
        let z = &header.srow_z;
        [
            x[0] as f64, x[1] as f64, x[2] as f64, x[3] as f64,
            y[0] as f64, y[1] as f64, y[2] as f64, y[3] as f64,
            z[0] as f64, z[1] as f64, z[2] as f64, z[3] as f64,
            0.0, 0.0, 0.0, 1.0,
        ]
    } else {
        [
            header.pixdim[1] as f64, 0.0, 0.0, 0.0,
            0.0, header.pixdim[2] as f64, 0.0, 0.0,
            0.0, 0.0, header.pixdim[3] as f64, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }
}

/// Encode voxels as an uncompressed NIfTI-1 image
pub fn encode_nifti(
    data: &[f64],
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
) -> Result<Vec<u8>> {
    let (nx, ny, nz) = dims;
    let dim_of = |n: usize| {
        i16::try_from(n).map_err(|_| MappingError::Nifti(format!("dimension {} exceeds NIfTI-1 limit", n)))
    };
    let dim: [i16; 8] = [3, dim_of(nx)?, dim_of(ny)?, dim_of(nz)?, 1, 1, 1, 1];
    if data.len() != nx * ny * nz {
        return Err(MappingError::ShapeMismatch { expected: nx * ny * nz, actual: data.len() });
    }

    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(&(HEADER_SIZE as i32).to_le_bytes());
    for (i, &d) in dim.iter().enumerate() {
        let offset = 40 + i * 2;
        header[offset..offset + 2].copy_from_slice(&d.to_le_bytes());
    }
    // FLOAT32, 32 bits
    header[70..72].copy_from_slice(&16i16.to_le_bytes());
    header[72..74].copy_from_slice(&32i16.to_le_bytes());

    let pixdim: [f32; 8] = [
        1.0,
        voxel_size.0 as f32,
        voxel_size.1 as f32,
        voxel_size.2 as f32,
        1.0, 1.0, 1.0, 1.0,
    ];
    for (i, &p) in pixdim.iter().enumerate() {
        let offset = 76 + i * 4;
        header[offset..offset + 4].copy_from_slice(&p.to_le_bytes());
    }
    header[108..112].copy_from_slice(&(VOX_OFFSET as f32).to_le_bytes());
    header[112..116].copy_from_slice(&1.0f32.to_le_bytes());
    header[116..120].copy_from_slice(&0.0f32.to_le_bytes());

    // sform_code = 1 (scanner anat), rows at 280, 296, 312
    header[254..256].copy_from_slice(&1i16.to_le_bytes());
    for row in 0..3 {
        for col in 0..4 {
            let offset = 280 + row * 16 + col * 4;
            header[offset..offset + 4].copy_from_slice(&(affine[row * 4 + col] as f32).to_le_bytes());
        }
    }
    header[344..348].copy_from_slice(b"n+1\0");

    let mut buffer = Vec::with_capacity(VOX_OFFSET + data.len() * 4);
    buffer.write_all(&header)?;
    // empty extension block
    buffer.write_all(&[0u8; 4])?;
    for &v in data {
        buffer.write_all(&(v as f32).to_le_bytes())?;
    }
    Ok(buffer)
}

/// Encode, compressing when `path` ends in `.nii.gz`, and write to disk
fn write_nifti(
    path: &Path,
    data: &[f64],
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
    affine: &[f64; 16],
) -> Result<()> {
    let raw = encode_nifti(data, dims, voxel_size, affine)?;
    let bytes = if path.to_string_lossy().ends_with(".nii.gz") {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        encoder.finish()?
    } else {
        raw
    };
    std::fs::write(path, bytes)?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Save a property map under `dir` with its default file name
///
/// Returns the written path.
pub fn save_property_volume(volume: &PropertyVolume, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(volume.default_file_name());
    save_property_volume_to(volume, &path)?;
    Ok(path)
}

/// Save a property map at an explicit `path`
pub fn save_property_volume_to(volume: &PropertyVolume, path: &Path) -> Result<()> {
    write_nifti(path, &volume.data, volume.dims, volume.voxel_size, &volume.affine)
}

/// Save a label volume at `path`
pub fn save_label_volume(volume: &LabelVolume, path: &Path) -> Result<()> {
    write_nifti(path, &volume.data, volume.dims, volume.voxel_size, &volume.affine)
}
