//! Convert a range file between dialects.

use anyhow::{Context, Result};
use ionvue_ranges::{RangeFile, RangeFormat};
use std::path::Path;

pub fn run(input: &Path, output: &Path) -> Result<()> {
    let (table, from) = RangeFile::open_guess_format(input)
        .with_context(|| format!("loading {}", input.display()))?;
    let to = RangeFormat::from_extension(output);
    table
        .write_file(output, to)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Converted {} ({from:?}) -> {} ({to:?}): {} ions, {} ranges",
        input.display(),
        output.display(),
        table.num_ions(),
        table.num_ranges()
    );
    Ok(())
}
