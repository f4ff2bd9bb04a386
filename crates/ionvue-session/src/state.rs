//! The live session: tree, stashes, cameras, history.

use crate::camera::Camera;
use ionvue_core::ColourRGBAf;
use ionvue_filters::xml::XmlElem;
use ionvue_filters::FilterTree;
use std::collections::VecDeque;

/// Undo and redo stacks are bounded to this many whole-tree snapshots.
pub const UNDO_LIMIT: usize = 10;

/// Axis decoration visibility persisted with the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisMode {
    None,
    Centre,
    Origin,
}

impl AxisMode {
    pub fn as_value(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Centre => 1,
            Self::Origin => 2,
        }
    }

    pub fn from_value(v: u32) -> Self {
        match v {
            1 => Self::Centre,
            2 => Self::Origin,
            _ => Self::None,
        }
    }
}

/// How much of the session changed since the last save, monotonic. The
/// host uses it to decide whether closing deserves a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModifyLevel {
    None,
    View,
    Ancillary,
    Data,
}

/// The whole user-visible session.
pub struct AnalysisState {
    pub tree: FilterTree,
    /// Named snapshots of whole trees, kept alongside the active one.
    stashes: Vec<(String, FilterTree)>,
    cameras: Vec<Camera>,
    active_camera: usize,
    /// Host effect descriptions, round-tripped opaquely.
    pub effects: Vec<XmlElem>,
    pub background: ColourRGBAf,
    pub axis_mode: AxisMode,
    pub use_relative_paths: bool,
    pub working_dir: Option<String>,
    modify_level: ModifyLevel,
    undo_stack: VecDeque<FilterTree>,
    redo_stack: VecDeque<FilterTree>,
}

impl Default for AnalysisState {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisState {
    pub fn new() -> Self {
        Self {
            tree: FilterTree::new(),
            stashes: Vec::new(),
            cameras: vec![Camera::default()],
            active_camera: 0,
            effects: Vec::new(),
            background: ColourRGBAf::opaque(0.0, 0.0, 0.0),
            axis_mode: AxisMode::None,
            use_relative_paths: false,
            working_dir: None,
            modify_level: ModifyLevel::None,
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
        }
    }

    // --- modify level ---

    pub fn modify_level(&self) -> ModifyLevel {
        self.modify_level
    }

    /// Raise the modify level; it never goes back down except via
    /// [`Self::mark_saved`].
    pub fn touch(&mut self, level: ModifyLevel) {
        self.modify_level = self.modify_level.max(level);
    }

    pub fn mark_saved(&mut self) {
        self.modify_level = ModifyLevel::None;
    }

    // --- stashes ---

    pub fn stashes(&self) -> &[(String, FilterTree)] {
        &self.stashes
    }

    pub fn stash_names(&self) -> Vec<&str> {
        self.stashes.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Snapshot the current tree (caches stripped) under a name.
    pub fn add_stash(&mut self, name: impl Into<String>) {
        self.stashes.push((name.into(), self.tree.clone()));
        self.touch(ModifyLevel::Ancillary);
    }

    pub fn add_stash_tree(&mut self, name: impl Into<String>, tree: FilterTree) {
        self.stashes.push((name.into(), tree));
        self.touch(ModifyLevel::Ancillary);
    }

    pub fn remove_stash(&mut self, index: usize) -> Option<(String, FilterTree)> {
        if index >= self.stashes.len() {
            return None;
        }
        self.touch(ModifyLevel::Ancillary);
        Some(self.stashes.remove(index))
    }

    // --- cameras ---

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn active_camera(&self) -> usize {
        self.active_camera
    }

    pub fn add_camera(&mut self, camera: Camera) {
        self.cameras.push(camera);
        self.touch(ModifyLevel::View);
    }

    pub fn set_cameras(&mut self, cameras: Vec<Camera>, active: usize) {
        self.active_camera = active.min(cameras.len().saturating_sub(1));
        self.cameras = cameras;
    }

    pub fn set_active_camera(&mut self, index: usize) {
        if index < self.cameras.len() {
            self.active_camera = index;
            self.touch(ModifyLevel::View);
        }
    }

    // --- undo / redo ---

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Snapshot the tree before an output-changing edit. Clears redo.
    pub fn push_undo(&mut self) {
        if self.undo_stack.len() == UNDO_LIMIT {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(self.tree.clone());
        self.redo_stack.clear();
        self.touch(ModifyLevel::Data);
    }

    pub fn undo(&mut self) -> bool {
        let Some(prior) = self.undo_stack.pop_back() else {
            return false;
        };
        if self.redo_stack.len() == UNDO_LIMIT {
            self.redo_stack.pop_front();
        }
        let current = std::mem::replace(&mut self.tree, prior);
        self.redo_stack.push_back(current);
        self.touch(ModifyLevel::Data);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.redo_stack.pop_back() else {
            return false;
        };
        if self.undo_stack.len() == UNDO_LIMIT {
            self.undo_stack.pop_front();
        }
        let current = std::mem::replace(&mut self.tree, next);
        self.undo_stack.push_back(current);
        self.touch(ModifyLevel::Data);
        true
    }

    /// Set a filter property through the history machinery: a snapshot
    /// is pushed first whenever the edit invalidates output.
    pub fn set_filter_property(
        &mut self,
        node: ionvue_filters::NodeId,
        key: &str,
        value: &str,
    ) -> Result<bool, ionvue_filters::PropertyError> {
        // Probe on a throwaway clone to learn whether output changes,
        // so the undo snapshot still holds the pre-edit value.
        let mut probe = self.tree.clone();
        let probe_node = probe_equivalent(&self.tree, &probe, node);
        let needs_update = match probe_node {
            Some(pn) => probe.set_filter_property(pn, key, value)?,
            None => return Err(ionvue_filters::PropertyError::UnknownKey(key.to_string())),
        };
        if needs_update {
            self.push_undo();
        }
        self.tree.set_filter_property(node, key, value)
    }
}

/// Map a node id in `original` to the id of the same position in a fresh
/// clone (clones compact ids in depth-first order).
fn probe_equivalent(
    original: &FilterTree,
    clone: &FilterTree,
    node: ionvue_filters::NodeId,
) -> Option<ionvue_filters::NodeId> {
    let position = original.depth_first_ids().iter().position(|&id| id == node)?;
    clone.depth_first_ids().get(position).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ionvue_filters::filters::DownsampleFilter;

    fn state_with_node() -> (AnalysisState, ionvue_filters::NodeId) {
        let mut state = AnalysisState::new();
        let id = state
            .tree
            .add_filter(Box::new(DownsampleFilter::default()), None)
            .unwrap();
        (state, id)
    }

    #[test]
    fn test_undo_redo_restore_properties() {
        let (mut state, id) = state_with_node();
        state.set_filter_property(id, "fraction", "0.25").unwrap();
        state.set_filter_property(id, "fraction", "0.75").unwrap();

        let value_of = |tree: &FilterTree| {
            tree.filter(tree.depth_first_ids()[0])
                .unwrap()
                .properties()
                .iter()
                .find(|p| p.key == "fraction")
                .unwrap()
                .value
                .clone()
        };
        assert_eq!(value_of(&state.tree), "0.75");
        assert!(state.undo());
        assert_eq!(value_of(&state.tree), "0.25");
        assert!(state.undo());
        assert_eq!(value_of(&state.tree), "0.1");
        assert!(!state.undo());
        assert!(state.redo());
        assert!(state.redo());
        assert_eq!(value_of(&state.tree), "0.75");
        assert!(!state.redo());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let (mut state, id) = state_with_node();
        state.set_filter_property(id, "fraction", "0.3").unwrap();
        state.undo();
        assert!(state.can_redo());
        let id = state.tree.depth_first_ids()[0];
        state.set_filter_property(id, "fraction", "0.9").unwrap();
        assert!(!state.can_redo());
    }

    #[test]
    fn test_undo_stack_bounded() {
        let (mut state, id) = state_with_node();
        for i in 0..25 {
            let value = format!("0.{:02}", i + 1);
            state.set_filter_property(id, "fraction", &value).unwrap();
        }
        let mut undone = 0;
        while state.undo() {
            undone += 1;
        }
        assert_eq!(undone, UNDO_LIMIT);
    }

    #[test]
    fn test_modify_level_monotonic() {
        let mut state = AnalysisState::new();
        assert_eq!(state.modify_level(), ModifyLevel::None);
        state.touch(ModifyLevel::View);
        state.touch(ModifyLevel::Data);
        state.touch(ModifyLevel::View);
        assert_eq!(state.modify_level(), ModifyLevel::Data);
        state.mark_saved();
        assert_eq!(state.modify_level(), ModifyLevel::None);
    }

    #[test]
    fn test_stash_snapshot_is_independent() {
        let (mut state, id) = state_with_node();
        state.add_stash("before edit");
        state.set_filter_property(id, "fraction", "0.99").unwrap();
        let (_, stashed) = &state.stashes()[0];
        let stashed_value = stashed
            .filter(stashed.depth_first_ids()[0])
            .unwrap()
            .properties()
            .iter()
            .find(|p| p.key == "fraction")
            .unwrap()
            .value
            .clone();
        assert_eq!(stashed_value, "0.1");
    }
}
