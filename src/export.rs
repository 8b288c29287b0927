//! Per-tissue susceptibility table
//!
//! One row per tissue name present in the resolved registry, written next to
//! the property map for bookkeeping.

use std::collections::BTreeSet;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::registry::LabelRegistry;

/// CSV header
pub const CSV_HEADER: &str = "Label ID,Name,Susceptibility";

/// File name of the table written next to a property map
pub const SUSCEPTIBILITY_TABLE_FILE: &str = "susceptibility_values.csv";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TissueRow {
    pub label_id: u32,
    pub name: String,
    pub susceptibility: f64,
}

/// First label id of each tissue name, in label order
///
/// Records without a name or susceptibility are left out.
pub fn susceptibility_table(registry: &LabelRegistry) -> Vec<TissueRow> {
    let mut seen = BTreeSet::new();
    registry
        .iter()
        .filter_map(|r| {
            let name = r.tissue_name.as_deref().filter(|n| !n.is_empty())?;
            let chi = r.susceptibility?;
            Some((r.label_id, name, chi))
        })
        .filter(|&(_, name, _)| seen.insert(name.to_string()))
        .map(|(label_id, name, susceptibility)| TissueRow {
            label_id,
            name: name.to_string(),
            susceptibility,
        })
        .collect()
}

pub fn write_csv<W: Write>(rows: &[TissueRow], mut writer: W) -> Result<()> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for row in rows {
        writeln!(writer, "{},{},{}", row.label_id, row.name, row.susceptibility)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the table as `dir/susceptibility_values.csv`
pub fn save_csv(rows: &[TissueRow], dir: &Path) -> Result<PathBuf> {
    let path = dir.join(SUSCEPTIBILITY_TABLE_FILE);
    write_csv(rows, BufWriter::new(std::fs::File::create(&path)?))?;
    Ok(path)
}
