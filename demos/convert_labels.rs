//! Convert a label NIfTI into a property map
//!
//! Usage: cargo run --release --example convert_labels -- <labels.nii.gz> <out_dir> [options.json] [output.nii.gz]
//!
//! Invalid voxels are resolved interactively on the console. The corrected
//! label volume is saved before any property is substituted.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Instant;

use mrprop_core::export::save_csv;
use mrprop_core::nifti_io::{
    load_label_volume, save_label_volume, save_property_volume, save_property_volume_to, CORRECTED_LABELS_FILE,
};
use mrprop_core::validate::{Correction, CorrectionPolicy, Violation};
use mrprop_core::{ConversionOptions, LabelCatalog, MappingError, VolumeMapper};

/// Asks the operator about every invalid voxel
struct ConsolePolicy;

impl ConsolePolicy {
    fn read_line() -> Option<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;
        Some(line.trim().to_string())
    }
}

impl CorrectionPolicy for ConsolePolicy {
    fn decide(&mut self, violation: &Violation, catalog: &LabelCatalog) -> Correction {
        print!(
            "pixel with wrong value {} at {:?}: delete [Y] or remap [n]? ",
            violation.value, violation.coords
        );
        io::stdout().flush().ok();
        let Some(answer) = Self::read_line() else {
            return Correction::Abort;
        };
        if answer.is_empty() || answer.eq_ignore_ascii_case("y") {
            return Correction::Zero;
        }

        print!("new label id: ");
        io::stdout().flush().ok();
        match Self::read_line().and_then(|s| s.parse::<u32>().ok()) {
            Some(id) if catalog.contains(id) => Correction::Remap(id),
            _ => {
                println!("not a label of {} {}, aborting", catalog.tool(), catalog.version());
                Correction::Abort
            }
        }
    }
}

fn run(
    input: &Path,
    output_dir: &Path,
    output_name: Option<&str>,
    options: &ConversionOptions,
) -> Result<(), MappingError> {
    std::fs::create_dir_all(output_dir)?;

    let start = Instant::now();
    let labels = load_label_volume(input)?;
    let (nx, ny, nz) = labels.dims;
    let (vsx, vsy, vsz) = labels.voxel_size;
    println!("[INFO] Volume: {}x{}x{}, Voxel: {:.2}x{:.2}x{:.2} mm", nx, ny, nz, vsx, vsy, vsz);

    let mut mapper = VolumeMapper::new(labels);
    let out = mapper.convert_with(options, &mut ConsolePolicy, |corrected| {
        let path = output_dir.join(CORRECTED_LABELS_FILE);
        save_label_volume(corrected, &path)?;
        println!("[INFO] Saved corrected labels to {}", path.display());
        Ok(())
    })?;

    for record in mapper.labels()? {
        println!("{}", record);
    }
    for (tissue, kind) in &out.unsupported {
        println!("[WARN] Gaussian {} for {} coming soon, kept piecewise value", kind, tissue);
    }
    for tissue in &out.degraded_tissues {
        println!("[WARN] No literature values for '{}'", tissue);
    }

    let path = match output_name {
        Some(name) => {
            let path = output_dir.join(name);
            save_property_volume_to(&out.property, &path)?;
            path
        }
        None => save_property_volume(&out.property, output_dir)?,
    };
    let csv = save_csv(&out.table, output_dir)?;
    println!("[INFO] Susceptibility table: {}", csv.display());

    println!("[INFO] Wrote {} in {:.2?}", path.display(), start.elapsed());
    Ok(())
}

fn main() -> Result<(), String> {
    tracing_subscriber::fmt().with_target(false).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        return Err(format!(
            "usage: {} <labels.nii[.gz]> <out_dir> [options.json] [output.nii[.gz]]",
            args[0]
        ));
    }
    let options = match args.get(3) {
        Some(path) => ConversionOptions::from_json_file(Path::new(path)).map_err(|e| e.report())?,
        None => ConversionOptions::default(),
    };

    let output_name = args.get(4).map(String::as_str);
    run(Path::new(&args[1]), Path::new(&args[2]), output_name, &options).map_err(|e| e.report())
}
