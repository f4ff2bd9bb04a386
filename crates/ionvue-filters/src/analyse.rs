//! Pre-refresh tree analysis.
//!
//! Purely advisory: walks the tree without refreshing anything, carrying
//! the accumulated emit and block masks down each root-to-node path, and
//! reports two classes of likely mistakes. Neither warning stops a
//! refresh.

use crate::filter::FilterType;
use crate::stream::StreamMask;
use crate::tree::{FilterTree, NodeId};

/// Advisory warning classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeWarning {
    /// The child cannot see anything useful: it uses nothing the path
    /// above can deliver, or it blocks everything arriving while using
    /// none of it.
    DeadPair { parent: NodeId, child: NodeId },
    /// A density- or concentration-sensitive analyser sits below a
    /// sampling filter with no intervening range filter to restore
    /// species identity; its absolute numbers will be biased.
    PossiblyBiasedDensity { sampler: NodeId, analyser: NodeId },
}

/// Filters whose output is a sampled subset of their input.
fn is_sampling(kind: FilterType) -> bool {
    matches!(kind, FilterType::Downsample)
}

/// Filters producing densities or concentrations from absolute counts.
fn is_density_sensitive(kind: FilterType) -> bool {
    matches!(
        kind,
        FilterType::SpatialAnalysis | FilterType::Voxelise | FilterType::CompositionProfile
    )
}

/// Walk the tree and collect advisories.
pub fn analyse_tree(tree: &FilterTree) -> Vec<TreeWarning> {
    let mut warnings = Vec::new();
    for &root in tree.roots() {
        walk(
            tree,
            root,
            None,
            StreamMask::empty(),
            None,
            &mut warnings,
        );
    }
    warnings
}

fn walk(
    tree: &FilterTree,
    id: NodeId,
    parent: Option<NodeId>,
    upstream_emit: StreamMask,
    sampler_above: Option<NodeId>,
    warnings: &mut Vec<TreeWarning>,
) {
    let Some(filter) = tree.filter(id) else { return };
    let use_mask = filter.use_mask();
    let kind = filter.filter_type();

    if let Some(parent) = parent {
        let starved = !use_mask.is_empty() && (use_mask & upstream_emit).is_empty();
        let smothering =
            use_mask.is_empty() && !upstream_emit.is_empty() && filter.block_mask().contains(upstream_emit);
        if starved || smothering {
            warnings.push(TreeWarning::DeadPair { parent, child: id });
        }
    }

    if let Some(sampler) = sampler_above {
        if is_density_sensitive(kind) {
            warnings.push(TreeWarning::PossiblyBiasedDensity {
                sampler,
                analyser: id,
            });
        }
    }

    // Range classification below the sampler restores species identity;
    // the bias advisory stops propagating past it.
    let sampler_below = if is_sampling(kind) {
        Some(id)
    } else if kind == FilterType::RangeFile {
        None
    } else {
        sampler_above
    };

    let downstream_emit =
        (upstream_emit & !filter.block_mask()) | filter.emit_mask();
    for &child in tree.children(id) {
        walk(tree, child, Some(id), downstream_emit, sampler_below, warnings);
    }
}
