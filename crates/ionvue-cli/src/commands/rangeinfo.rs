//! Summarise a range file.

use anyhow::{Context, Result};
use ionvue_ranges::RangeFile;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct IonReport {
    short_name: String,
    long_name: String,
    colour: String,
    ranges: usize,
}

#[derive(Serialize)]
struct RangeReport {
    file: String,
    format: String,
    ions: Vec<IonReport>,
    num_ranges: usize,
    warnings: Vec<String>,
}

pub fn run(file: &Path, json: bool) -> Result<()> {
    let (table, format) = RangeFile::open_guess_format(file)
        .with_context(|| format!("loading {}", file.display()))?;

    let report = RangeReport {
        file: file.display().to_string(),
        format: format!("{format:?}"),
        ions: table
            .ions()
            .iter()
            .enumerate()
            .map(|(i, ion)| IonReport {
                short_name: ion.short_name.clone(),
                long_name: ion.long_name.clone(),
                colour: ion.colour.to_hex(),
                ranges: table.num_ranges_of_ion(i),
            })
            .collect(),
        num_ranges: table.num_ranges(),
        warnings: table.warnings().to_vec(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("File:   {}", report.file);
        println!("Format: {}", report.format);
        println!("Ions:   {}", report.ions.len());
        for ion in &report.ions {
            println!(
                "  {:<10} {:<16} #{} ({} ranges)",
                ion.short_name, ion.long_name, ion.colour, ion.ranges
            );
        }
        println!("Ranges: {}", report.num_ranges);
        for warning in &report.warnings {
            println!("Warning: {warning}");
        }
    }
    Ok(())
}
