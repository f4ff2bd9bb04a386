//! Tree topology, caching and scheduler behaviour.

use ionvue_core::{IonHit, Point3D, RefreshContext};
use ionvue_filters::filters::{
    BoundingBoxFilter, ClipFilter, ClipPrimitive, DataLoadFilter, DownsampleFilter,
};
use ionvue_filters::{FilterTree, Frame, StreamMask, TreeError};
use ionvue_io::write_pos;
use std::path::Path;
use std::sync::Arc;

fn ramp_pos_file(dir: &Path, n: usize) -> std::path::PathBuf {
    let path = dir.join("ramp.pos");
    let ions: Vec<IonHit> = (0..n)
        .map(|i| {
            let v = i as f32;
            IonHit::new(Point3D::new(v, v, v), v)
        })
        .collect();
    write_pos(&path, &ions).unwrap();
    path
}

fn loader(path: &Path) -> Box<DataLoadFilter> {
    let mut load = DataLoadFilter::from_file(path, ionvue_filters::filters::DataFileKind::Pos);
    load.set_sampling(false, 0);
    Box::new(load)
}

#[test]
fn test_pos_round_trip_through_tree() {
    // 133 ramp ions: reload through a data-load node with sampling off.
    let dir = tempfile::tempdir().unwrap();
    let path = ramp_pos_file(dir.path(), 133);

    let mut tree = FilterTree::new();
    let load = tree.add_filter(loader(&path), None).unwrap();

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    assert!(out.errors.is_empty());
    let (id, frames) = &out.outputs[0];
    assert_eq!(*id, load);
    let ions = frames[0].as_ions().unwrap();
    assert_eq!(ions.data.len(), 133);
    for (i, hit) in ions.data.iter().enumerate() {
        let v = i as f32;
        assert_eq!(hit.pos, Point3D::new(v, v, v));
        assert_eq!(hit.mass_to_charge, v);
    }
}

#[test]
fn test_reparent_into_own_subtree_rejected() {
    // A -> B -> D, A -> C; moving B under D must be refused.
    let dir = tempfile::tempdir().unwrap();
    let path = ramp_pos_file(dir.path(), 10);

    let mut tree = FilterTree::new();
    let a = tree.add_filter(loader(&path), None).unwrap();
    let b = tree
        .add_filter(Box::new(DownsampleFilter::default()), Some(a))
        .unwrap();
    let d = tree
        .add_filter(Box::new(BoundingBoxFilter::default()), Some(b))
        .unwrap();
    let c = tree
        .add_filter(Box::new(BoundingBoxFilter::default()), Some(a))
        .unwrap();

    assert_eq!(tree.reparent(b, Some(d)), Err(TreeError::WouldCreateCycle));
    assert_eq!(tree.reparent(b, Some(b)), Err(TreeError::WouldCreateCycle));
    // Legal moves still work.
    tree.reparent(d, Some(c)).unwrap();
    assert_eq!(tree.parent(d), Some(c));
    assert_eq!(tree.len(), 4);
}

#[test]
fn test_cached_refresh_returns_identical_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = ramp_pos_file(dir.path(), 500);

    let mut tree = FilterTree::new();
    let load = tree.add_filter(loader(&path), None).unwrap();

    let first = tree.refresh(&RefreshContext::new()).unwrap();
    assert_eq!(tree.refresh_start_nodes(), vec![]);

    let second = tree.refresh(&RefreshContext::new()).unwrap();
    // Same payload identity: the cache was served, not recomputed.
    let f1 = &first.outputs[0].1[0];
    let f2 = &second.outputs[0].1[0];
    assert!(Arc::ptr_eq(&f1.payload, &f2.payload));
    assert!(f2.cached);
    assert_eq!(f2.producer, Some(load));
}

#[test]
fn test_property_change_invalidates_subtree_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = ramp_pos_file(dir.path(), 100);

    let mut tree = FilterTree::new();
    let load = tree.add_filter(loader(&path), None).unwrap();
    let clip = tree
        .add_filter(
            Box::new(ClipFilter::with_primitive(ClipPrimitive::Sphere {
                origin: Point3D::ZERO,
                radius: 1000.0,
            })),
            Some(load),
        )
        .unwrap();

    tree.refresh(&RefreshContext::new()).unwrap();
    assert!(tree.refresh_start_nodes().is_empty());

    // Editing the clip radius dirties clip but not the loader.
    let needs_update = tree.set_filter_property(clip, "radius", "50").unwrap();
    assert!(needs_update);
    assert_eq!(tree.refresh_start_nodes(), vec![clip]);

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    let clip_frames = &out
        .outputs
        .iter()
        .find(|(id, _)| *id == clip)
        .unwrap()
        .1;
    let kept = clip_frames[0].as_ions().unwrap();
    // radius 50 over the (i,i,i) ramp: i in 0..=28 satisfies 3i^2<=2500
    assert_eq!(kept.data.len(), 29);
}

#[test]
fn test_output_types_stay_within_emit_mask() {
    let dir = tempfile::tempdir().unwrap();
    let path = ramp_pos_file(dir.path(), 50);

    let mut tree = FilterTree::new();
    let load = tree.add_filter(loader(&path), None).unwrap();
    tree.add_filter(Box::new(BoundingBoxFilter::default()), Some(load))
        .unwrap();

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    for (id, frames) in &out.outputs {
        let emit = tree.filter(*id).unwrap().emit_mask();
        let block = tree.filter(*id).unwrap().block_mask();
        assert_eq!(emit & block, StreamMask::empty());
        for frame in frames {
            assert!(emit.contains(frame.stream_type()));
        }
    }
}

#[test]
fn test_pass_through_supersedes_used_types() {
    let dir = tempfile::tempdir().unwrap();
    let path = ramp_pos_file(dir.path(), 100);

    let mut tree = FilterTree::new();
    let load = tree.add_filter(loader(&path), None).unwrap();
    let clip = tree
        .add_filter(
            Box::new(ClipFilter::with_primitive(ClipPrimitive::Sphere {
                origin: Point3D::ZERO,
                radius: 5.0,
            })),
            Some(load),
        )
        .unwrap();
    let bbox = tree
        .add_filter(Box::new(BoundingBoxFilter::default()), Some(clip))
        .unwrap();

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    // The bounding box must see only the clipped ions, not the loader's.
    let bbox_frames = &out.outputs.iter().find(|(id, _)| *id == bbox).unwrap().1;
    let draw = bbox_frames[0].as_draw().unwrap();
    // First primitive is the box; its corners bound the clipped set.
    let ionvue_core::DrawShape::RectPrism { max, .. } = &draw.primitives[0].shape else {
        panic!("expected box outline");
    };
    assert!(max.x < 5.0, "bounding box saw unclipped ions: {max:?}");
}

#[test]
fn test_failing_node_reports_error_without_stopping_siblings() {
    let mut tree = FilterTree::new();
    // Loader pointed at a missing file.
    let missing = tree
        .add_filter(
            loader(Path::new("/no/such/file.pos")),
            None,
        )
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = ramp_pos_file(dir.path(), 10);
    let good = tree.add_filter(loader(&path), None).unwrap();

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    assert_eq!(out.errors.len(), 1);
    assert_eq!(out.errors[0].0, missing);
    let good_frames = &out.outputs.iter().find(|(id, _)| *id == good).unwrap().1;
    assert_eq!(good_frames[0].as_ions().unwrap().data.len(), 10);
}

#[test]
fn test_clone_strips_caches_and_preserves_structure() {
    let dir = tempfile::tempdir().unwrap();
    let path = ramp_pos_file(dir.path(), 100);

    let mut tree = FilterTree::new();
    let load = tree.add_filter(loader(&path), None).unwrap();
    tree.add_filter(Box::new(DownsampleFilter::default()), Some(load))
        .unwrap();
    tree.refresh(&RefreshContext::new()).unwrap();
    assert!(tree.cache_used_bytes() > 0);

    let clone = tree.clone();
    assert_eq!(clone.len(), 2);
    assert_eq!(clone.cache_used_bytes(), 0);
    assert_eq!(clone.refresh_start_nodes().len(), 1);
}

#[test]
fn test_remove_subtree() {
    let dir = tempfile::tempdir().unwrap();
    let path = ramp_pos_file(dir.path(), 10);

    let mut tree = FilterTree::new();
    let a = tree.add_filter(loader(&path), None).unwrap();
    let b = tree
        .add_filter(Box::new(DownsampleFilter::default()), Some(a))
        .unwrap();
    tree.add_filter(Box::new(BoundingBoxFilter::default()), Some(b))
        .unwrap();
    assert_eq!(tree.len(), 3);

    tree.remove_subtree(b).unwrap();
    assert_eq!(tree.len(), 1);
    assert!(!tree.contains(b));
    assert!(tree.contains(a));
}

#[test]
fn test_cancel_aborts_whole_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let path = ramp_pos_file(dir.path(), 20000);

    let mut tree = FilterTree::new();
    tree.add_filter(loader(&path), None).unwrap();

    let ctx = RefreshContext::new();
    ctx.cancel.cancel();
    assert!(tree.refresh(&ctx).is_err());
}

#[test]
fn test_downsample_count_mode_exact() {
    let dir = tempfile::tempdir().unwrap();
    let path = ramp_pos_file(dir.path(), 1000);

    let mut tree = FilterTree::new();
    let load = tree.add_filter(loader(&path), None).unwrap();
    let down = tree
        .add_filter(
            Box::new(DownsampleFilter::default().with_seed(42)),
            Some(load),
        )
        .unwrap();
    tree.set_filter_property(down, "mode", "count").unwrap();
    tree.set_filter_property(down, "count", "100").unwrap();

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    let frames = &out.outputs.iter().find(|(id, _)| *id == down).unwrap().1;
    assert_eq!(frames[0].as_ions().unwrap().data.len(), 100);
}

#[test]
fn test_frame_helpers() {
    let frame = Frame::new(ionvue_filters::FramePayload::Ions(Default::default()));
    assert_eq!(frame.stream_type(), StreamMask::IONS);
    assert!(frame.as_range().is_none());
}
