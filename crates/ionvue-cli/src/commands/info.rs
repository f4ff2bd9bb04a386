//! Summarise a POS dataset.

use anyhow::{Context, Result};
use ionvue_core::ion::bound_cube_of;
use ionvue_core::RefreshContext;
use ionvue_io::{load_pos, PosColumnMap};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct DatasetReport {
    file: String,
    records: usize,
    bounds_min: [f32; 3],
    bounds_max: [f32; 3],
    mass_min: f32,
    mass_max: f32,
    mass_mean: f32,
}

pub fn run(file: &Path, json: bool) -> Result<()> {
    let ions = load_pos(file, &PosColumnMap::default(), &RefreshContext::new())
        .with_context(|| format!("loading {}", file.display()))?;

    let bounds = bound_cube_of(&ions);
    let (mut mass_min, mut mass_max, mut mass_sum) = (f32::INFINITY, f32::NEG_INFINITY, 0.0f64);
    for ion in &ions {
        mass_min = mass_min.min(ion.mass_to_charge);
        mass_max = mass_max.max(ion.mass_to_charge);
        mass_sum += ion.mass_to_charge as f64;
    }
    let report = DatasetReport {
        file: file.display().to_string(),
        records: ions.len(),
        bounds_min: [
            bounds.min_corner().x,
            bounds.min_corner().y,
            bounds.min_corner().z,
        ],
        bounds_max: [
            bounds.max_corner().x,
            bounds.max_corner().y,
            bounds.max_corner().z,
        ],
        mass_min,
        mass_max,
        mass_mean: (mass_sum / ions.len().max(1) as f64) as f32,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("File:    {}", report.file);
        println!("Records: {}", report.records);
        println!(
            "Bounds:  ({:.2}, {:.2}, {:.2}) .. ({:.2}, {:.2}, {:.2}) nm",
            report.bounds_min[0],
            report.bounds_min[1],
            report.bounds_min[2],
            report.bounds_max[0],
            report.bounds_max[1],
            report.bounds_max[2],
        );
        println!(
            "Mass:    {:.3} .. {:.3} amu/e (mean {:.3})",
            report.mass_min, report.mass_max, report.mass_mean
        );
    }
    Ok(())
}
