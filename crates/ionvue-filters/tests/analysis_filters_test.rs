//! Range-aware analyser behaviour: classification, spectra, profiles,
//! voxel grids, transforms.

use ionvue_core::{IonHit, Point3D, RefreshContext};
use ionvue_filters::filters::{
    CompositionProfileFilter, DataFileKind, DataLoadFilter, RangeFileFilter, SpectrumPlotFilter,
    TransformFilter, TransformMode, VoxeliseFilter,
};
use ionvue_filters::{FilterTree, NodeId, StreamMask};
use ionvue_io::write_pos;
use std::path::{Path, PathBuf};

/// Two species: masses near 10 are "A", near 20 are "B".
const RANGE_TABLE: &str = "\
[Ions]
Number=2
Ion1=A
Ion2=B
[Ranges]
Number=2
Range1=9.0 11.0 A:1 Color:ff0000
Range2=19.0 21.0 B:1 Color:00ff00
";

/// 40 ions along z: even ions species A at mass 10, odd species B at
/// mass 20, plus 5 unranged strays at mass 50.
fn fixture(dir: &Path) -> (PathBuf, PathBuf) {
    let pos = dir.join("data.pos");
    let rng = dir.join("table.rrng");
    let mut ions = Vec::new();
    for i in 0..40 {
        let mass = if i % 2 == 0 { 10.0 } else { 20.0 };
        ions.push(IonHit::new(Point3D::new(0.0, 0.0, i as f32 * 0.25), mass));
    }
    for i in 0..5 {
        ions.push(IonHit::new(Point3D::new(0.0, 0.0, i as f32), 50.0));
    }
    write_pos(&pos, &ions).unwrap();
    std::fs::write(&rng, RANGE_TABLE).unwrap();
    (pos, rng)
}

fn ranged_tree(pos: &Path, rng: &Path) -> (FilterTree, NodeId) {
    let mut tree = FilterTree::new();
    let mut load = DataLoadFilter::from_file(pos, DataFileKind::Pos);
    load.set_sampling(false, 0);
    let load_id = tree.add_filter(Box::new(load), None).unwrap();
    let range_id = tree
        .add_filter(
            Box::new(RangeFileFilter::from_file(rng).unwrap()),
            Some(load_id),
        )
        .unwrap();
    (tree, range_id)
}

fn frames_of<'a>(
    out: &'a ionvue_filters::RefreshOutput,
    id: NodeId,
) -> &'a Vec<ionvue_filters::Frame> {
    &out.outputs.iter().find(|(nid, _)| *nid == id).unwrap().1
}

#[test]
fn test_range_filter_splits_species_and_drops_unranged() {
    let dir = tempfile::tempdir().unwrap();
    let (pos, rng) = fixture(dir.path());
    let (mut tree, range_id) = ranged_tree(&pos, &rng);

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let frames = frames_of(&out, range_id);

    // One range frame plus one ion frame per populated species.
    assert_eq!(frames[0].stream_type(), StreamMask::RANGE);
    let ion_frames: Vec<_> = frames.iter().filter_map(|f| f.as_ions()).collect();
    assert_eq!(ion_frames.len(), 2);
    assert_eq!(ion_frames[0].data.len(), 20);
    assert_eq!(ion_frames[1].data.len(), 20);
    // Species colours come from the table.
    assert_eq!(ion_frames[0].colour.to_hex(), "ff0000");
    assert_eq!(ion_frames[1].colour.to_hex(), "00ff00");
    // The strays at mass 50 are gone.
    let total: usize = ion_frames.iter().map(|f| f.data.len()).sum();
    assert_eq!(total, 40);
}

#[test]
fn test_disabled_species_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let (pos, rng) = fixture(dir.path());
    let (mut tree, range_id) = ranged_tree(&pos, &rng);
    tree.set_filter_property(range_id, "ion:1", "0").unwrap();

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    let frames = frames_of(&out, range_id);
    let ion_frames: Vec<_> = frames.iter().filter_map(|f| f.as_ions()).collect();
    assert_eq!(ion_frames.len(), 1);
    assert!(ion_frames[0].data.iter().all(|i| i.mass_to_charge == 10.0));
}

#[test]
fn test_spectrum_per_species_with_regions() {
    let dir = tempfile::tempdir().unwrap();
    let (pos, rng) = fixture(dir.path());
    let (mut tree, range_id) = ranged_tree(&pos, &rng);
    let spectrum = tree
        .add_filter(Box::new(SpectrumPlotFilter::default()), Some(range_id))
        .unwrap();

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let frames = frames_of(&out, spectrum);
    assert_eq!(frames.len(), 2);
    for frame in frames {
        let series = &frame.as_plot().unwrap().series;
        assert_eq!(series.sum_y(), 20.0);
        assert_eq!(series.regions.len(), 2);
    }
}

#[test]
fn test_composition_profile_fractions() {
    let dir = tempfile::tempdir().unwrap();
    let (pos, rng) = fixture(dir.path());
    let (mut tree, range_id) = ranged_tree(&pos, &rng);

    let mut profile = CompositionProfileFilter::default();
    // Cylinder along z covering the whole ramp, bins aligned so each
    // holds equal numbers of both species.
    profile.set_cylinder(
        Point3D::new(0.0, 0.0, 0.0),
        Point3D::new(0.0, 0.0, 10.0),
        2.0,
    );
    let profile_id = tree.add_filter(Box::new(profile), Some(range_id)).unwrap();
    tree.set_filter_property(profile_id, "normalise", "fraction")
        .unwrap();
    tree.set_filter_property(profile_id, "numbins", "5").unwrap();

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let frames = frames_of(&out, profile_id);
    // One series per species plus the cylinder outline.
    let plots: Vec<_> = frames.iter().filter_map(|f| f.as_plot()).collect();
    assert_eq!(plots.len(), 2);
    // Alternating species: every populated bin splits 50/50.
    for plot in &plots {
        for &(_, y) in plot.series.xy.iter().filter(|&&(_, y)| y > 0.0) {
            assert!((y - 0.5).abs() < 1e-5, "fraction {y}");
        }
    }
    assert!(frames.iter().any(|f| f.as_draw().is_some()));
}

#[test]
fn test_voxelise_counts_and_density() {
    // A fixture with spread on every axis, so cells have real volume.
    let dir = tempfile::tempdir().unwrap();
    let pos = dir.path().join("spread.pos");
    let rng = dir.path().join("table.rrng");
    let ions: Vec<IonHit> = (0..40)
        .map(|i| {
            let mass = if i % 2 == 0 { 10.0 } else { 20.0 };
            IonHit::new(
                Point3D::new((i % 2) as f32, ((i / 2) % 2) as f32, i as f32 * 0.25),
                mass,
            )
        })
        .collect();
    write_pos(&pos, &ions).unwrap();
    std::fs::write(&rng, RANGE_TABLE).unwrap();
    let (mut tree, range_id) = ranged_tree(&pos, &rng);
    let vox = tree
        .add_filter(Box::new(VoxeliseFilter::default()), Some(range_id))
        .unwrap();
    tree.set_filter_property(vox, "counts", "2,2,4").unwrap();

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let frames = frames_of(&out, vox);
    let voxels = frames[0].as_voxel().unwrap();
    assert_eq!(voxels.grid.dims(), [2, 2, 4]);
    // All ranged ions binned exactly once.
    assert_eq!(voxels.grid.sum(), 40.0);

    // Density mode divides by the cell volume.
    tree.set_filter_property(vox, "normalise", "density").unwrap();
    let out = tree.refresh(&RefreshContext::new()).unwrap();
    let voxels = frames_of(&out, vox)[0].as_voxel().unwrap();
    let volume = voxels.grid.cell_volume();
    assert!((voxels.grid.sum() * volume - 40.0).abs() < 1e-3);
}

#[test]
fn test_voxelise_concentration_mode() {
    let dir = tempfile::tempdir().unwrap();
    let (pos, rng) = fixture(dir.path());
    let (mut tree, range_id) = ranged_tree(&pos, &rng);
    let vox = tree
        .add_filter(Box::new(VoxeliseFilter::default()), Some(range_id))
        .unwrap();
    tree.set_filter_property(vox, "counts", "1,1,1").unwrap();
    tree.set_filter_property(vox, "normalise", "concentration")
        .unwrap();
    // Numerator: species A only.
    tree.set_filter_property(vox, "numerator", "10").unwrap();

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let voxels = frames_of(&out, vox)[0].as_voxel().unwrap();
    // 20 of 40 ranged ions are species A.
    assert!((voxels.grid.get([0, 0, 0]) - 0.5).abs() < 1e-5);
}

#[test]
fn test_value_shuffle_preserves_mass_multiset() {
    let dir = tempfile::tempdir().unwrap();
    let (pos, _rng) = fixture(dir.path());

    let mut tree = FilterTree::new();
    let mut load = DataLoadFilter::from_file(&pos, DataFileKind::Pos);
    load.set_sampling(false, 0);
    let load_id = tree.add_filter(Box::new(load), None).unwrap();
    let shuffle = tree
        .add_filter(
            Box::new(TransformFilter::with_mode(TransformMode::ValueShuffle).with_seed(9)),
            Some(load_id),
        )
        .unwrap();

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let shuffled = frames_of(&out, shuffle)[0].as_ions().unwrap();
    let original = frames_of(&out, load_id)[0].as_ions().unwrap();

    // Positions unchanged, values permuted as a multiset.
    for (a, b) in original.data.iter().zip(&shuffled.data) {
        assert_eq!(a.pos, b.pos);
    }
    let mut orig_masses: Vec<f32> = original.data.iter().map(|i| i.mass_to_charge).collect();
    let mut new_masses: Vec<f32> = shuffled.data.iter().map(|i| i.mass_to_charge).collect();
    orig_masses.sort_by(f32::total_cmp);
    new_masses.sort_by(f32::total_cmp);
    assert_eq!(orig_masses, new_masses);
}

#[test]
fn test_transform_rotate_about_centroid() {
    let dir = tempfile::tempdir().unwrap();
    let pos = dir.path().join("line.pos");
    write_pos(
        &pos,
        &[
            IonHit::new(Point3D::new(-1.0, 0.0, 0.0), 1.0),
            IonHit::new(Point3D::new(1.0, 0.0, 0.0), 1.0),
        ],
    )
    .unwrap();

    let mut tree = FilterTree::new();
    let mut load = DataLoadFilter::from_file(&pos, DataFileKind::Pos);
    load.set_sampling(false, 0);
    let load_id = tree.add_filter(Box::new(load), None).unwrap();
    let rot = tree
        .add_filter(
            Box::new(TransformFilter::with_mode(TransformMode::Rotate)),
            Some(load_id),
        )
        .unwrap();
    tree.set_filter_property(rot, "originmode", "centroid").unwrap();
    tree.set_filter_property(rot, "rotateaxis", "0,0,1").unwrap();
    tree.set_filter_property(rot, "rotateangle", "90").unwrap();

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    let rotated = frames_of(&out, rot)[0].as_ions().unwrap();
    // +-x flips onto -+y about the origin-centred centroid.
    assert!(rotated.data[0].pos.sqr_distance(&Point3D::new(0.0, -1.0, 0.0)) < 1e-6);
    assert!(rotated.data[1].pos.sqr_distance(&Point3D::new(0.0, 1.0, 0.0)) < 1e-6);
}
