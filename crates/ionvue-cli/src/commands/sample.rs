//! Uniformly sample a POS file to a fixed record count.

use anyhow::{Context, Result};
use ionvue_core::RefreshContext;
use ionvue_io::{load_pos_sampled, write_pos, PosColumnMap};
use std::path::Path;

pub fn run(input: &Path, output: &Path, count: usize) -> Result<()> {
    let ions = load_pos_sampled(input, &PosColumnMap::default(), count, &RefreshContext::new())
        .with_context(|| format!("loading {}", input.display()))?;
    write_pos(output, &ions).with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Wrote {} of the input records to {}",
        ions.len(),
        output.display()
    );
    Ok(())
}
