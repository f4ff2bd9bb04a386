//! Session save/load round trips and merge semantics.

use ionvue_core::ColourRGBAf;
use ionvue_filters::filters::{
    BoundingBoxFilter, ClipFilter, DataFileKind, DataLoadFilter, DownsampleFilter,
};
use ionvue_filters::FilterTree;
use ionvue_session::persist::{load_state, save_state, SaveOptions, PACKAGE_DATA_DIR};
use ionvue_session::{AnalysisState, AxisMode, Camera};
use std::path::Path;

fn sample_state(data_file: &Path) -> AnalysisState {
    let mut state = AnalysisState::new();
    let mut load = DataLoadFilter::from_file(data_file, DataFileKind::Pos);
    load.set_sampling(false, 0);
    let load_id = state.tree.add_filter(Box::new(load), None).unwrap();
    state.tree.set_user_string(load_id, "main dataset").unwrap();
    let down = state
        .tree
        .add_filter(Box::new(DownsampleFilter::default()), Some(load_id))
        .unwrap();
    state
        .tree
        .add_filter(Box::new(BoundingBoxFilter::default()), Some(down))
        .unwrap();
    state
        .tree
        .set_filter_property(down, "fraction", "0.42")
        .unwrap();

    state.add_stash("experiment A");
    state.add_camera(Camera::named("side view"));
    state.background = ColourRGBAf::opaque(0.1, 0.2, 0.3);
    state.axis_mode = AxisMode::Origin;
    state
}

fn tree_signature(tree: &FilterTree) -> Vec<(String, String, Vec<(String, String)>, usize)> {
    tree.depth_first_ids()
        .into_iter()
        .map(|id| {
            let f = tree.filter(id).unwrap();
            (
                f.filter_type().type_string().to_string(),
                f.user_string().to_string(),
                f.properties()
                    .into_iter()
                    .map(|p| (p.key, p.value))
                    .collect(),
                tree.children(id).len(),
            )
        })
        .collect()
}

#[test]
fn test_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.pos");
    std::fs::write(&data, [0u8; 16]).unwrap();
    let state_path = dir.path().join("session.xml");

    let state = sample_state(&data);
    save_state(&state, &state_path, &SaveOptions::default()).unwrap();

    let mut reloaded = AnalysisState::new();
    let warnings = load_state(&mut reloaded, &state_path, false).unwrap();
    assert!(warnings.is_empty(), "{warnings:?}");

    assert_eq!(tree_signature(&reloaded.tree), tree_signature(&state.tree));
    assert_eq!(reloaded.stashes().len(), 1);
    assert_eq!(reloaded.stashes()[0].0, "experiment A");
    assert_eq!(
        tree_signature(&reloaded.stashes()[0].1),
        tree_signature(&state.stashes()[0].1)
    );
    assert_eq!(reloaded.cameras().len(), 2);
    assert_eq!(reloaded.cameras()[1].name, "side view");
    assert_eq!(reloaded.background, state.background);
    assert_eq!(reloaded.axis_mode, AxisMode::Origin);
}

#[test]
fn test_bad_root_and_bad_colour_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.xml");

    std::fs::write(&path, "<notastate/>").unwrap();
    assert!(load_state(&mut AnalysisState::new(), &path, false).is_err());

    std::fs::write(
        &path,
        r#"<threeDepictstate><backcolour r="2" g="0" b="0"/><filtertree/></threeDepictstate>"#,
    )
    .unwrap();
    assert!(load_state(&mut AnalysisState::new(), &path, false).is_err());
}

#[test]
fn test_newer_writer_version_is_warning_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.xml");
    std::fs::write(
        &path,
        r#"<threeDepictstate><writer version="99.0.0"/><backcolour r="0" g="0" b="0"/><showaxis value="0"/><filtertree/></threeDepictstate>"#,
    )
    .unwrap();
    let warnings = load_state(&mut AnalysisState::new(), &path, false).unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("newer"));
}

#[test]
fn test_merge_appends_and_dedups_names() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.pos");
    std::fs::write(&data, [0u8; 16]).unwrap();
    let state_path = dir.path().join("session.xml");

    let state = sample_state(&data);
    save_state(&state, &state_path, &SaveOptions::default()).unwrap();

    // Load into a session that already holds the same names.
    let mut target = sample_state(&data);
    let before_nodes = target.tree.len();
    let warnings = load_state(&mut target, &state_path, true).unwrap();
    assert!(warnings.is_empty(), "{warnings:?}");

    assert_eq!(target.tree.len(), before_nodes * 2);
    assert_eq!(target.tree.roots().len(), 2);

    let names = target.stash_names();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"experiment A"));
    assert!(names.contains(&"experiment A-merge"));

    // Non-default camera de-duplicated; default camera not duplicated.
    let camera_names: Vec<_> = target.cameras().iter().map(|c| c.name.as_str()).collect();
    assert!(camera_names.contains(&"side view"));
    assert!(camera_names.contains(&"side view-merge"));
    assert_eq!(
        camera_names.iter().filter(|n| **n == "Default").count(),
        1
    );
}

#[test]
fn test_relative_paths_resolve_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.pos");
    std::fs::write(&data, [0u8; 16]).unwrap();
    let state_path = dir.path().join("session.xml");

    let mut state = sample_state(&data);
    state.use_relative_paths = true;
    save_state(
        &state,
        &state_path,
        &SaveOptions {
            relative_paths: true,
            package: false,
        },
    )
    .unwrap();

    // The stored reference must not be absolute.
    let text = std::fs::read_to_string(&state_path).unwrap();
    assert!(text.contains(r#"<file value="data.pos"/>"#), "{text}");

    let mut reloaded = AnalysisState::new();
    load_state(&mut reloaded, &state_path, false).unwrap();
    let root = reloaded.tree.roots()[0];
    let file_prop = reloaded
        .tree
        .filter(root)
        .unwrap()
        .properties()
        .into_iter()
        .find(|p| p.key == "file")
        .unwrap();
    assert_eq!(Path::new(&file_prop.value), data);
}

#[test]
fn test_package_save_maps_data_files() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("my data file.pos");
    std::fs::write(&data, [0u8; 16]).unwrap();
    let state_path = dir.path().join("session.xml");

    let mut state = AnalysisState::new();
    let mut load = DataLoadFilter::from_file(&data, DataFileKind::Pos);
    load.set_sampling(false, 0);
    state.tree.add_filter(Box::new(load), None).unwrap();
    state
        .tree
        .add_filter(Box::new(ClipFilter::default()), Some(state.tree.roots()[0]))
        .unwrap();

    let mapping = save_state(
        &state,
        &state_path,
        &SaveOptions {
            relative_paths: false,
            package: true,
        },
    )
    .unwrap();

    assert_eq!(mapping.len(), 1);
    assert_eq!(mapping[0].0, data);
    let packaged = mapping[0].1.to_string_lossy();
    assert!(packaged.starts_with(PACKAGE_DATA_DIR));
    // Spaces sanitised away.
    assert!(!packaged.contains(' '));
    let text = std::fs::read_to_string(&state_path).unwrap();
    assert!(text.contains(&*packaged));
}
