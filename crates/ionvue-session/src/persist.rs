//! Session XML persistence: save, load, merge-load, package save.
//!
//! The document shape:
//!
//! ```text
//! <threeDepictstate>
//!   <writer version="..."/>
//!   <backcolour r="" g="" b=""/>
//!   <showaxis value=""/>
//!   <userelativepaths origworkdir=""/>      (optional)
//!   <filtertree> ... </filtertree>
//!   <cameras><active value=""/><camera .../>...</cameras>
//!   <stashedfilters><stash name=""><filtertree/></stash>...</stashedfilters>
//!   <effects> ... </effects>                (optional, opaque)
//! </threeDepictstate>
//! ```
//!
//! File references inside filters are stored unix-style; with relative
//! paths enabled they are rewritten against the save directory and
//! resolved back on load. A newer writer version is a warning, not an
//! error. Merge loads append and de-duplicate colliding stash and camera
//! names with `-merge` suffixes.

use crate::camera::{Camera, CameraProjection};
use crate::state::{AnalysisState, AxisMode};
use ionvue_core::{ColourRGBAf, Point3D};
use ionvue_filters::persist::{tree_from_xml, tree_to_xml, PersistError};
use ionvue_filters::xml::{XmlElem, XmlError};
use ionvue_filters::FilterTree;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Version stamped into saved state files.
pub const STATE_WRITER_VERSION: &str = "0.4.0";

const ROOT_TAG: &str = "threeDepictstate";
const MERGE_SUFFIX_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error(transparent)]
    Filters(#[from] PersistError),

    #[error("Not a state file (root tag is not {ROOT_TAG})")]
    BadRoot,

    #[error("Background colour out of range")]
    BadColour,

    #[error("Malformed state section: {0}")]
    Format(String),
}

/// Options controlling a save.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Rewrite file references relative to the save directory.
    pub relative_paths: bool,
    /// Package mode: file references are renamed into a local data
    /// directory; the returned mapping says what to copy where.
    pub package: bool,
}

/// Sanitised data directory used by package saves.
pub const PACKAGE_DATA_DIR: &str = "PackageData";

fn point_elem(name: &str, p: &Point3D) -> XmlElem {
    XmlElem::new(name).attr("x", p.x).attr("y", p.y).attr("z", p.z)
}

fn point_from(elem: &XmlElem) -> Option<Point3D> {
    Some(Point3D::new(
        elem.parse_attr("x")?,
        elem.parse_attr("y")?,
        elem.parse_attr("z")?,
    ))
}

fn camera_to_xml(camera: &Camera) -> XmlElem {
    let projection = match camera.projection {
        CameraProjection::Perspective { fov_deg } => XmlElem::new("projection")
            .attr("type", "perspective")
            .attr("fov", fov_deg),
        CameraProjection::Orthographic { scale } => XmlElem::new("projection")
            .attr("type", "orthographic")
            .attr("scale", scale),
    };
    XmlElem::new("camera")
        .attr("name", &camera.name)
        .child(point_elem("origin", &camera.origin))
        .child(point_elem("target", &camera.target))
        .child(point_elem("up", &camera.up))
        .child(projection)
}

fn camera_from_xml(elem: &XmlElem) -> Option<Camera> {
    let projection = elem.get_child("projection")?;
    let projection = match projection.get_attr("type")? {
        "perspective" => CameraProjection::Perspective {
            fov_deg: projection.parse_attr("fov")?,
        },
        "orthographic" => CameraProjection::Orthographic {
            scale: projection.parse_attr("scale")?,
        },
        _ => return None,
    };
    Some(Camera {
        name: elem.get_attr("name")?.to_string(),
        origin: point_from(elem.get_child("origin")?)?,
        target: point_from(elem.get_child("target")?)?,
        up: point_from(elem.get_child("up")?)?,
        projection,
    })
}

/// Walk filter elements rewriting each `<file value=""/>` reference.
fn rewrite_file_refs(elem: &mut XmlElem, rewrite: &mut dyn FnMut(&str) -> Option<String>) {
    for child in &mut elem.children {
        if child.name == "file" {
            if let Some((_, value)) = child.attrs.iter_mut().find(|(k, _)| k == "value") {
                if let Some(new) = rewrite(value) {
                    *value = new;
                }
            }
        }
        rewrite_file_refs(child, rewrite);
    }
}

fn to_unix_style(path: &str) -> String {
    path.replace(std::path::MAIN_SEPARATOR, "/")
}

fn from_unix_style(path: &str) -> PathBuf {
    PathBuf::from(path.replace('/', std::path::MAIN_SEPARATOR_STR))
}

/// File-safe leaf name for package mode.
fn sanitise_name(path: &str, taken: &[String]) -> String {
    let leaf = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    let safe: String = leaf
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if !taken.contains(&safe) {
        return safe;
    }
    for n in 1.. {
        let candidate = format!("{n}-{safe}");
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
    unreachable!()
}

fn state_to_xml(state: &AnalysisState) -> XmlElem {
    let mut root = XmlElem::new(ROOT_TAG)
        .child(XmlElem::new("writer").attr("version", STATE_WRITER_VERSION))
        .child(
            XmlElem::new("backcolour")
                .attr("r", state.background.r)
                .attr("g", state.background.g)
                .attr("b", state.background.b),
        )
        .child(XmlElem::value_elem("showaxis", state.axis_mode.as_value()));
    if state.use_relative_paths {
        let mut rel = XmlElem::new("userelativepaths");
        if let Some(dir) = &state.working_dir {
            rel = rel.attr("origworkdir", dir);
        }
        root = root.child(rel);
    }
    root = root.child(tree_to_xml(&state.tree));

    let mut cameras = XmlElem::new("cameras").child(XmlElem::value_elem(
        "active",
        state.active_camera(),
    ));
    for camera in state.cameras() {
        cameras = cameras.child(camera_to_xml(camera));
    }
    root = root.child(cameras);

    if !state.stashes().is_empty() {
        let mut stashes = XmlElem::new("stashedfilters");
        for (name, tree) in state.stashes() {
            stashes = stashes.child(XmlElem::new("stash").attr("name", name).child(tree_to_xml(tree)));
        }
        root = root.child(stashes);
    }
    if !state.effects.is_empty() {
        let mut effects = XmlElem::new("effects");
        for effect in &state.effects {
            effects = effects.child(effect.clone());
        }
        root = root.child(effects);
    }
    root
}

/// Save the session. In package mode the returned list maps original
/// file paths to their sanitised names under [`PACKAGE_DATA_DIR`]; the
/// caller is responsible for copying the data files.
pub fn save_state(
    state: &AnalysisState,
    path: &Path,
    options: &SaveOptions,
) -> Result<Vec<(PathBuf, PathBuf)>, SessionError> {
    let mut root = state_to_xml(state);
    let mut file_map: Vec<(PathBuf, PathBuf)> = Vec::new();

    if options.package {
        let mut taken: Vec<String> = Vec::new();
        rewrite_file_refs(&mut root, &mut |original| {
            if original.is_empty() {
                return None;
            }
            let safe = sanitise_name(original, &taken);
            taken.push(safe.clone());
            let packaged = format!("{PACKAGE_DATA_DIR}/{safe}");
            file_map.push((PathBuf::from(original), PathBuf::from(&packaged)));
            Some(packaged)
        });
    } else if options.relative_paths {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        rewrite_file_refs(&mut root, &mut |original| {
            let original_path = Path::new(original);
            original_path
                .strip_prefix(base)
                .ok()
                .map(|rel| to_unix_style(&rel.to_string_lossy()))
        });
    } else {
        rewrite_file_refs(&mut root, &mut |original| Some(to_unix_style(original)));
    }

    let doc = root.to_document()?;
    let stamped = doc.replacen(
        "?>\n",
        &format!(
            "?>\n<!-- ionvue state file, written {} -->\n",
            chrono::Local::now().to_rfc3339()
        ),
        1,
    );
    std::fs::write(path, stamped)?;
    Ok(file_map)
}

fn parse_version(v: &str) -> (u32, u32, u32) {
    let mut parts = v.split('.').map(|p| p.parse().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

/// Append `-merge` until the name is free, giving up (with a warning)
/// after a hundred tries.
fn dedup_name(name: &str, taken: &[String], warnings: &mut Vec<String>) -> String {
    if !taken.iter().any(|t| t == name) {
        return name.to_string();
    }
    let mut candidate = name.to_string();
    for _ in 0..MERGE_SUFFIX_LIMIT {
        candidate.push_str("-merge");
        if !taken.iter().any(|t| *t == candidate) {
            return candidate;
        }
    }
    warnings.push(format!(
        "Could not find a unique name for \"{name}\" while merging; keeping the duplicate"
    ));
    name.to_string()
}

/// Load a state file. With `merge` set the loaded content is appended to
/// the current session instead of replacing it. Returns non-fatal
/// warnings for the host console.
pub fn load_state(
    state: &mut AnalysisState,
    path: &Path,
    merge: bool,
) -> Result<Vec<String>, SessionError> {
    let text = std::fs::read_to_string(path)?;
    let root = XmlElem::parse_document(&text)?;
    if root.name != ROOT_TAG {
        return Err(SessionError::BadRoot);
    }
    let mut warnings = Vec::new();

    if let Some(writer) = root.get_child("writer") {
        if let Some(version) = writer.get_attr("version") {
            if parse_version(version) > parse_version(STATE_WRITER_VERSION) {
                warnings.push(format!(
                    "State file was written by a newer version ({version}); \
                     some settings may not be understood"
                ));
            }
        }
    }

    let colour_elem = root
        .get_child("backcolour")
        .ok_or_else(|| SessionError::Format("missing backcolour".to_string()))?;
    let background = ColourRGBAf::opaque(
        colour_elem.parse_attr("r").ok_or(SessionError::BadColour)?,
        colour_elem.parse_attr("g").ok_or(SessionError::BadColour)?,
        colour_elem.parse_attr("b").ok_or(SessionError::BadColour)?,
    );
    if !background.in_unit_range() {
        return Err(SessionError::BadColour);
    }

    let axis_mode = root
        .get_child("showaxis")
        .and_then(|e| e.parse_attr("value"))
        .map(AxisMode::from_value)
        .unwrap_or(AxisMode::None);

    let relative = root.get_child("userelativepaths");
    let use_relative_paths = relative.is_some();
    let working_dir = relative
        .and_then(|e| e.get_attr("origworkdir"))
        .map(str::to_string);

    // Resolve stored (unix-style, possibly relative) file references to
    // native absolute paths before handing the tree to its readers.
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let resolve = |elem: &XmlElem| -> XmlElem {
        let mut elem = elem.clone();
        rewrite_file_refs(&mut elem, &mut |stored| {
            let native = from_unix_style(stored);
            let resolved = if native.is_relative() && use_relative_paths {
                base.join(&native)
            } else {
                native
            };
            Some(resolved.to_string_lossy().into_owned())
        });
        elem
    };

    let tree_elem = root
        .get_child("filtertree")
        .ok_or_else(|| SessionError::Format("missing filtertree".to_string()))?;
    let loaded_tree = tree_from_xml(&resolve(tree_elem))?;

    let mut loaded_cameras = Vec::new();
    let mut active = 0usize;
    if let Some(cameras) = root.get_child("cameras") {
        active = cameras.child_value("active").unwrap_or(0);
        for camera in cameras.get_children("camera") {
            loaded_cameras.push(
                camera_from_xml(camera)
                    .ok_or_else(|| SessionError::Format("bad camera".to_string()))?,
            );
        }
    }

    let mut loaded_stashes: Vec<(String, FilterTree)> = Vec::new();
    if let Some(stashes) = root.get_child("stashedfilters") {
        for stash in stashes.get_children("stash") {
            let name = stash
                .get_attr("name")
                .ok_or_else(|| SessionError::Format("stash without name".to_string()))?;
            let tree_elem = stash
                .get_child("filtertree")
                .ok_or_else(|| SessionError::Format("stash without tree".to_string()))?;
            loaded_stashes.push((name.to_string(), tree_from_xml(&resolve(tree_elem))?));
        }
    }

    let loaded_effects: Vec<XmlElem> = root
        .get_child("effects")
        .map(|e| e.children.clone())
        .unwrap_or_default();

    if merge {
        state
            .tree
            .add_filter_tree(loaded_tree, None)
            .map_err(PersistError::from)?;
        let mut stash_names: Vec<String> =
            state.stashes().iter().map(|(n, _)| n.clone()).collect();
        for (name, tree) in loaded_stashes {
            let unique = dedup_name(&name, &stash_names, &mut warnings);
            stash_names.push(unique.clone());
            state.add_stash_tree(unique, tree);
        }
        let mut camera_names: Vec<String> =
            state.cameras().iter().map(|c| c.name.clone()).collect();
        for mut camera in loaded_cameras {
            if !camera.is_default_named() {
                camera.name = dedup_name(&camera.name, &camera_names, &mut warnings);
                camera_names.push(camera.name.clone());
                state.add_camera(camera);
            }
        }
        state.effects.extend(loaded_effects);
    } else {
        *state = AnalysisState::new();
        state.tree = loaded_tree;
        if loaded_cameras.is_empty() {
            loaded_cameras.push(Camera::default());
        }
        state.set_cameras(loaded_cameras, active);
        for (name, tree) in loaded_stashes {
            state.add_stash_tree(name, tree);
        }
        state.effects = loaded_effects;
        state.background = background;
        state.axis_mode = axis_mode;
        state.use_relative_paths = use_relative_paths;
        state.working_dir = working_dir;
        state.mark_saved();
    }

    if !warnings.is_empty() {
        warn!(count = warnings.len(), "state load produced warnings");
    }
    Ok(warnings)
}
