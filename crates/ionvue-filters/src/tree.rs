//! The filter tree: topology, per-node caches and the refresh scheduler.
//!
//! Nodes live in a slot arena and own their filters; ids stay stable
//! until a node is removed. The scheduler walks each root depth first,
//! reusing valid caches and recomputing everything below the first dirty
//! node. Frames travel as shared payloads, so supplying a cached output
//! costs reference counts only.
//!
//! Error policy: a failing node is reported and its subtree walk carries
//! on with whatever frames passed through; a cancellation unwinds the
//! whole traversal.

use crate::filter::Filter;
use crate::stream::{types_present, Frame, StreamMask};
use ionvue_core::{RefreshContext, RefreshError, SelectionBinding};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Stable handle to a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("No such filter node")]
    InvalidNode,

    #[error("Reparenting would create a cycle")]
    WouldCreateCycle,
}

struct Node {
    filter: Box<dyn Filter>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    cache_enabled: bool,
    cache: Option<Vec<Frame>>,
    cache_bytes: usize,
}

/// Everything one refresh traversal produced.
#[derive(Default)]
pub struct RefreshOutput {
    /// Per-node output frames, in traversal order.
    pub outputs: Vec<(NodeId, Vec<Frame>)>,
    /// Console messages accumulated per node.
    pub consoles: Vec<(NodeId, Vec<String>)>,
    /// Nodes whose refresh failed, with the failure. Siblings still ran.
    pub errors: Vec<(NodeId, RefreshError)>,
    /// Selection devices: bindings on draw primitives, per owning node.
    pub devices: Vec<(NodeId, SelectionBinding)>,
}

/// Assumed machine RAM for the percent-based cache budget.
const ASSUMED_TOTAL_RAM: usize = 8 * 1024 * 1024 * 1024;

pub struct FilterTree {
    slots: Vec<Option<Node>>,
    roots: Vec<NodeId>,
    cache_budget_bytes: usize,
    cache_used_bytes: usize,
}

impl Default for FilterTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterTree {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            roots: Vec::new(),
            cache_budget_bytes: ASSUMED_TOTAL_RAM / 2,
            cache_used_bytes: 0,
        }
    }

    // --- topology ---

    /// Insert `filter` under `parent`, or as a new root.
    pub fn add_filter(
        &mut self,
        filter: Box<dyn Filter>,
        parent: Option<NodeId>,
    ) -> Result<NodeId, TreeError> {
        if let Some(p) = parent {
            self.node(p)?;
        }
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(Node {
            filter,
            parent,
            children: Vec::new(),
            cache_enabled: true,
            cache: None,
            cache_bytes: 0,
        }));
        match parent {
            Some(p) => self.node_mut(p).expect("checked above").children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    /// Remove a node and its whole subtree.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<(), TreeError> {
        let parent = self.node(id)?.parent;
        match parent {
            Some(p) => {
                let siblings = &mut self.node_mut(p)?.children;
                siblings.retain(|&c| c != id);
            }
            None => self.roots.retain(|&r| r != id),
        }
        for node_id in self.subtree_ids(id) {
            if let Some(node) = self.slots[node_id.0 as usize].take() {
                self.cache_used_bytes -= node.cache_bytes;
            }
        }
        Ok(())
    }

    /// Move a subtree under a new parent (or to root level). Rejected
    /// when the destination lies inside the moved subtree.
    pub fn reparent(&mut self, id: NodeId, new_parent: Option<NodeId>) -> Result<(), TreeError> {
        self.node(id)?;
        if let Some(np) = new_parent {
            self.node(np)?;
            if self.subtree_ids(id).contains(&np) {
                return Err(TreeError::WouldCreateCycle);
            }
        }
        let old_parent = self.node(id)?.parent;
        match old_parent {
            Some(p) => self.node_mut(p)?.children.retain(|&c| c != id),
            None => self.roots.retain(|&r| r != id),
        }
        self.node_mut(id)?.parent = new_parent;
        match new_parent {
            Some(p) => self.node_mut(p)?.children.push(id),
            None => self.roots.push(id),
        }
        // The subtree now sees different upstream data.
        self.clear_cache(id);
        Ok(())
    }

    /// Deep-copy a subtree under `new_parent`; caches are not copied.
    pub fn copy_subtree(
        &mut self,
        id: NodeId,
        new_parent: Option<NodeId>,
    ) -> Result<NodeId, TreeError> {
        let cloned_filter = self.node(id)?.filter.clone_uncached();
        let new_id = self.add_filter(cloned_filter, new_parent)?;
        let children = self.node(id)?.children.clone();
        for child in children {
            self.copy_subtree(child, Some(new_id))?;
        }
        Ok(new_id)
    }

    /// Graft every root of `other` under `parent` in this tree.
    pub fn add_filter_tree(
        &mut self,
        other: FilterTree,
        parent: Option<NodeId>,
    ) -> Result<Vec<NodeId>, TreeError> {
        let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();
        let mut new_roots = Vec::new();
        for id in other.depth_first_ids() {
            let node = other.slots[id.0 as usize].as_ref().expect("id enumerated");
            let new_parent = match node.parent {
                Some(p) => Some(*mapping.get(&p).expect("parents precede children")),
                None => parent,
            };
            let new_id = self.add_filter(node.filter.clone_uncached(), new_parent)?;
            if node.parent.is_none() {
                new_roots.push(new_id);
            }
            mapping.insert(id, new_id);
        }
        Ok(new_roots)
    }

    pub fn swap(&mut self, other: &mut FilterTree) {
        std::mem::swap(self, other);
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.roots.clear();
        self.cache_used_bytes = 0;
    }

    // --- queries ---

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slots
            .get(id.0 as usize)
            .is_some_and(|slot| slot.is_some())
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slots[id.0 as usize]
            .as_ref()
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.0 as usize].as_ref()?.parent
    }

    pub fn filter(&self, id: NodeId) -> Option<&dyn Filter> {
        self.slots
            .get(id.0 as usize)?
            .as_ref()
            .map(|n| n.filter.as_ref())
    }

    /// Pre-order depth-first enumeration over every root.
    pub fn depth_first_ids(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.len());
        for &root in &self.roots {
            self.collect_subtree(root, &mut out);
        }
        out
    }

    /// Pre-order enumeration of one subtree.
    pub fn subtree_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_subtree(id, &mut out);
        out
    }

    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if !self.contains(id) {
            return;
        }
        out.push(id);
        let children = self.children(id).to_vec();
        for child in children {
            self.collect_subtree(child, out);
        }
    }

    pub fn max_depth(&self) -> usize {
        fn depth_of(tree: &FilterTree, id: NodeId) -> usize {
            1 + tree
                .children(id)
                .iter()
                .map(|&c| depth_of(tree, c))
                .max()
                .unwrap_or(0)
        }
        self.roots
            .iter()
            .map(|&r| depth_of(self, r))
            .max()
            .unwrap_or(0)
    }

    pub fn nodes_of_type(&self, kind: crate::filter::FilterType) -> Vec<NodeId> {
        self.depth_first_ids()
            .into_iter()
            .filter(|&id| {
                self.filter(id)
                    .is_some_and(|f| f.filter_type() == kind)
            })
            .collect()
    }

    fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.slots
            .get(id.0 as usize)
            .and_then(|s| s.as_ref())
            .ok_or(TreeError::InvalidNode)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.slots
            .get_mut(id.0 as usize)
            .and_then(|s| s.as_mut())
            .ok_or(TreeError::InvalidNode)
    }

    // --- filter mutation, cache-aware ---

    /// Set a property; on an output-changing edit the node's subtree
    /// caches are dropped. Returns whether an update is needed.
    pub fn set_filter_property(
        &mut self,
        id: NodeId,
        key: &str,
        value: &str,
    ) -> Result<bool, crate::filter::PropertyError> {
        let node = match self.node_mut(id) {
            Ok(n) => n,
            Err(_) => return Err(crate::filter::PropertyError::UnknownKey(key.to_string())),
        };
        let needs_update = node.filter.set_property(key, value)?;
        if needs_update {
            self.clear_cache(id);
        }
        Ok(needs_update)
    }

    pub fn set_user_string(&mut self, id: NodeId, s: &str) -> Result<(), TreeError> {
        self.node_mut(id)?.filter.set_user_string(s);
        Ok(())
    }

    /// Route an actuated selection binding to its owning filter.
    pub fn dispatch_binding(
        &mut self,
        id: NodeId,
        binding: SelectionBinding,
        value: crate::filter::BindingValue,
    ) -> Result<bool, TreeError> {
        let changed = self.node_mut(id)?.filter.set_prop_from_binding(binding, value);
        if changed {
            self.clear_cache(id);
        }
        Ok(changed)
    }

    // --- caching ---

    pub fn set_cache_enabled(&mut self, id: NodeId, enabled: bool) -> Result<(), TreeError> {
        let node = self.node_mut(id)?;
        node.cache_enabled = enabled;
        if !enabled {
            self.drop_node_cache(id);
        }
        Ok(())
    }

    /// Budget as a percentage of (assumed) machine RAM.
    pub fn set_cache_percent(&mut self, percent: u32) {
        self.cache_budget_bytes =
            (ASSUMED_TOTAL_RAM / 100).saturating_mul(percent.min(100) as usize);
        if self.cache_used_bytes > self.cache_budget_bytes {
            self.purge_caches();
        }
    }

    pub fn cache_used_bytes(&self) -> usize {
        self.cache_used_bytes
    }

    /// Invalidate one node's cache and every descendant's.
    pub fn clear_cache(&mut self, id: NodeId) {
        for node_id in self.subtree_ids(id) {
            self.drop_node_cache(node_id);
        }
    }

    pub fn purge_caches(&mut self) {
        for id in self.depth_first_ids() {
            self.drop_node_cache(id);
        }
    }

    /// Invalidate every node of one filter kind, descendants included.
    pub fn clear_cache_by_type(&mut self, kind: crate::filter::FilterType) {
        for id in self.nodes_of_type(kind) {
            self.clear_cache(id);
        }
    }

    fn drop_node_cache(&mut self, id: NodeId) {
        if let Ok(node) = self.node_mut(id) {
            if node.cache.take().is_some() {
                let freed = node.cache_bytes;
                node.cache_bytes = 0;
                self.cache_used_bytes -= freed;
            }
        }
    }

    fn cache_valid(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.cache.is_some() && !n.filter.monitor_stale())
            .unwrap_or(false)
    }

    /// Minimal set of nodes a top-down walk must recompute: every dirty
    /// node whose ancestors are all clean. Purely informational; the
    /// scheduler derives the same behaviour from cache validity.
    pub fn refresh_start_nodes(&self) -> Vec<NodeId> {
        let mut starts = Vec::new();
        let mut stack: Vec<NodeId> = self.roots.clone();
        while let Some(id) = stack.pop() {
            if !self.cache_valid(id) {
                starts.push(id);
            } else {
                stack.extend(self.children(id).iter().copied());
            }
        }
        starts.sort();
        starts
    }

    // --- refresh ---

    /// Run the whole tree. Individual node failures are collected in the
    /// output; only cancellation aborts the traversal.
    pub fn refresh(&mut self, ctx: &RefreshContext) -> Result<RefreshOutput, RefreshError> {
        let mut output = RefreshOutput::default();
        let total = self.len().max(1);
        let mut visited = 0usize;

        let roots = self.roots.clone();
        for root in roots {
            self.refresh_node(root, Vec::new(), ctx, &mut output, &mut visited, total)?;
        }
        ctx.progress.set_total_progress(100);
        Ok(output)
    }

    #[allow(clippy::too_many_arguments)]
    fn refresh_node(
        &mut self,
        id: NodeId,
        inputs: Vec<Frame>,
        ctx: &RefreshContext,
        output: &mut RefreshOutput,
        visited: &mut usize,
        total: usize,
    ) -> Result<(), RefreshError> {
        *visited += 1;
        ctx.progress
            .set_total_progress((*visited * 100 / total) as u32);
        {
            let node = self.node(id).map_err(|_| RefreshError::ReadFail)?;
            let label = if node.filter.user_string().is_empty() {
                node.filter.filter_type().type_string().to_string()
            } else {
                node.filter.user_string().to_string()
            };
            ctx.progress.set_current_filter(&label);
        }

        let outputs = if self.cache_valid(id) {
            self.node(id)
                .expect("validated")
                .cache
                .clone()
                .expect("cache present")
        } else {
            let mut console = Vec::new();
            let emit_mask;
            let refreshed = {
                let node = self.node_mut(id).map_err(|_| RefreshError::ReadFail)?;
                emit_mask = node.filter.emit_mask();
                node.filter.refresh(&inputs, ctx, &mut console)
            };
            if !console.is_empty() {
                output.consoles.push((id, console));
            }
            match refreshed {
                Ok(mut frames) => {
                    debug_assert!(
                        types_present(&frames) & !emit_mask == StreamMask::empty(),
                        "filter emitted outside its emit mask"
                    );
                    for frame in &mut frames {
                        frame.producer = Some(id);
                    }
                    self.maybe_cache(id, &mut frames);
                    frames
                }
                Err(e) if e.is_abort() => return Err(e),
                Err(e) => {
                    warn!(node = id.0, error = %e, "filter refresh failed");
                    output.errors.push((id, e));
                    Vec::new()
                }
            }
        };

        // Selection devices ride on emitted draw primitives.
        for frame in &outputs {
            if let Some(draw) = frame.as_draw() {
                for prim in &draw.primitives {
                    if let Some(binding) = prim.binding {
                        output.devices.push((id, binding));
                    }
                }
            }
        }

        let child_inputs = self.child_inputs(id, &inputs, &outputs);
        output.outputs.push((id, outputs));

        let children = self.children(id).to_vec();
        for child in children {
            self.refresh_node(child, child_inputs.clone(), ctx, output, visited, total)?;
        }
        Ok(())
    }

    /// Fresh outputs, then the pass-through of inputs: blocked types
    /// never pass, and a used type is superseded whenever the node
    /// emitted frames of that type this refresh.
    fn child_inputs(&self, id: NodeId, inputs: &[Frame], outputs: &[Frame]) -> Vec<Frame> {
        let Ok(node) = self.node(id) else {
            return Vec::new();
        };
        let block = node.filter.block_mask();
        let use_mask = node.filter.use_mask();
        let emitted = types_present(outputs);

        let mut child_inputs = outputs.to_vec();
        for frame in inputs {
            let ty = frame.stream_type();
            if block.contains(ty) {
                continue;
            }
            if use_mask.contains(ty) && emitted.contains(ty) {
                continue;
            }
            child_inputs.push(frame.clone());
        }
        child_inputs
    }

    fn maybe_cache(&mut self, id: NodeId, frames: &mut [Frame]) {
        let budget = self.cache_budget_bytes;
        let used = self.cache_used_bytes;
        let Ok(node) = self.node_mut(id) else { return };
        if !node.cache_enabled {
            return;
        }
        let n_objects: usize = frames
            .iter()
            .map(|f| f.payload.num_basic_objects())
            .sum();
        let bytes = node.filter.num_bytes_for_cache(n_objects);
        if used + bytes > budget {
            debug!(node = id.0, bytes, "cache admission declined");
            return;
        }
        for frame in frames.iter_mut() {
            frame.cached = true;
        }
        node.cache = Some(frames.to_vec());
        node.cache_bytes = bytes;
        self.cache_used_bytes += bytes;
    }
}

impl Clone for FilterTree {
    /// Clones are rebuilt in a fresh arena with caches stripped.
    fn clone(&self) -> Self {
        let mut out = Self::new();
        out.cache_budget_bytes = self.cache_budget_bytes;
        let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();
        for id in self.depth_first_ids() {
            let node = self.slots[id.0 as usize].as_ref().expect("id enumerated");
            let parent = node.parent.map(|p| *mapping.get(&p).expect("pre-order"));
            let new_id = out
                .add_filter(node.filter.clone_uncached(), parent)
                .expect("parent exists in clone");
            mapping.insert(id, new_id);
        }
        out
    }
}
