//! Summarise a saved analysis state file.

use anyhow::{Context, Result};
use ionvue_filters::analyse::analyse_tree;
use ionvue_session::persist::load_state;
use ionvue_session::AnalysisState;
use std::path::Path;

pub fn run(file: &Path) -> Result<()> {
    let mut state = AnalysisState::new();
    let warnings =
        load_state(&mut state, file, false).with_context(|| format!("loading {}", file.display()))?;

    println!("File:     {}", file.display());
    println!("Filters:  {}", state.tree.len());
    for id in state.tree.depth_first_ids() {
        let filter = state.tree.filter(id).expect("enumerated id");
        let label = if filter.user_string().is_empty() {
            filter.filter_type().type_string()
        } else {
            filter.user_string()
        };
        println!("  {label}");
    }
    println!("Stashes:  {}", state.stashes().len());
    for name in state.stash_names() {
        println!("  {name}");
    }
    println!("Cameras:  {}", state.cameras().len());

    for warning in warnings {
        println!("Warning: {warning}");
    }
    for advisory in analyse_tree(&state.tree) {
        println!("Advisory: {advisory:?}");
    }
    Ok(())
}
