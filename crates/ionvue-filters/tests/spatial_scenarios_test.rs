//! End-to-end neighbourhood analysis scenarios over the tree.

use ionvue_core::{IonHit, Point3D, RefreshContext};
use ionvue_filters::filters::{
    DataFileKind, DataLoadFilter, SpatialAlgorithm, SpatialAnalysisFilter, StopMode,
};
use ionvue_filters::{FilterTree, NodeId};
use ionvue_io::write_pos;
use std::f32::consts::PI;
use std::path::Path;

/// Two collinear ions one nanometre apart.
fn two_ion_file(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("pair.pos");
    write_pos(
        &path,
        &[
            IonHit::new(Point3D::new(0.0, 0.0, 0.0), 1.0),
            IonHit::new(Point3D::new(0.0, 0.0, 1.0), 2.0),
        ],
    )
    .unwrap();
    path
}

fn tree_with_spatial(
    path: &Path,
    configure: impl FnOnce(&mut SpatialAnalysisFilter),
) -> (FilterTree, NodeId) {
    let mut tree = FilterTree::new();
    let mut load = DataLoadFilter::from_file(path, DataFileKind::Pos);
    load.set_sampling(false, 0);
    let load_id = tree.add_filter(Box::new(load), None).unwrap();
    let mut spatial = SpatialAnalysisFilter::default();
    configure(&mut spatial);
    let spatial_id = tree.add_filter(Box::new(spatial), Some(load_id)).unwrap();
    (tree, spatial_id)
}

#[test]
fn test_local_density_two_collinear_ions() {
    // Density mode, k = 1: each ion's value becomes 1 / (4/3 pi r^3)
    // with r = 1.
    let dir = tempfile::tempdir().unwrap();
    let path = two_ion_file(dir.path());
    let (mut tree, spatial) = tree_with_spatial(&path, |s| {
        s.set_stop_mode(StopMode::Neighbour);
        s.set_num_neighbours(1);
    });

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let frames = &out.outputs.iter().find(|(id, _)| *id == spatial).unwrap().1;
    let ions = frames[0].as_ions().unwrap();
    assert_eq!(ions.data.len(), 2);
    let expected = 1.0 / (4.0 / 3.0 * PI);
    for ion in &ions.data {
        assert!(
            (ion.mass_to_charge - expected).abs() < 1e-5,
            "density {} != {expected}",
            ion.mass_to_charge
        );
    }
}

#[test]
fn test_nn_histogram_single_bin() {
    // RDF in neighbour mode, k = 1: one plot frame whose counts land in
    // a single bin.
    let dir = tempfile::tempdir().unwrap();
    let path = two_ion_file(dir.path());
    let (mut tree, spatial) = tree_with_spatial(&path, |s| {
        *s = SpatialAnalysisFilter::with_algorithm(SpatialAlgorithm::Rdf);
        s.set_stop_mode(StopMode::Neighbour);
        s.set_num_neighbours(1);
    });

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let frames = &out.outputs.iter().find(|(id, _)| *id == spatial).unwrap().1;
    assert_eq!(frames.len(), 1);
    let series = &frames[0].as_plot().unwrap().series;
    let max = series.max_y().unwrap();
    assert!(max > 0.0);
    let nonzero = series.xy.iter().filter(|&&(_, y)| y > 0.0).count();
    assert_eq!(nonzero, 1);
}

#[test]
fn test_rdf_radius_mode_counts_pairs() {
    // RDF in radius mode with r_max = 2: summed count over bins > 0.
    let dir = tempfile::tempdir().unwrap();
    let path = two_ion_file(dir.path());
    let (mut tree, spatial) = tree_with_spatial(&path, |s| {
        *s = SpatialAnalysisFilter::with_algorithm(SpatialAlgorithm::Rdf);
        s.set_stop_mode(StopMode::Radius);
        s.set_radius(2.0);
    });

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let frames = &out.outputs.iter().find(|(id, _)| *id == spatial).unwrap().1;
    let series = &frames[0].as_plot().unwrap().series;
    assert!(series.sum_y() > 0.0);
}

#[test]
fn test_density_filter_keeps_dense_region() {
    // A tight cluster plus one remote outlier; filtering for high
    // density drops the outlier.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cluster.pos");
    let mut ions: Vec<IonHit> = (0..10)
        .map(|i| IonHit::new(Point3D::new(i as f32 * 0.1, 0.0, 0.0), 1.0))
        .collect();
    ions.push(IonHit::new(Point3D::new(1000.0, 1000.0, 1000.0), 99.0));
    write_pos(&path, &ions).unwrap();

    let (mut tree, spatial) = tree_with_spatial(&path, |s| {
        *s = SpatialAnalysisFilter::with_algorithm(SpatialAlgorithm::DensityFilter);
        s.set_stop_mode(StopMode::Neighbour);
        s.set_num_neighbours(2);
    });
    // Cutoff far below the cluster density but far above the outlier's.
    tree.set_filter_property(spatial, "cutoff", "0.001").unwrap();

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let frames = &out.outputs.iter().find(|(id, _)| *id == spatial).unwrap().1;
    let kept = frames[0].as_ions().unwrap();
    assert_eq!(kept.data.len(), 10);
    assert!(kept.data.iter().all(|i| i.mass_to_charge != 99.0));
    // Original values survive: this is a filter, not a re-valuation.
    assert!(kept.data.iter().all(|i| i.mass_to_charge == 1.0));
}

#[test]
fn test_density_isolated_points_dropped_with_warning() {
    // Radius mode with a radius smaller than any pair separation: every
    // point is bad, all are dropped, and the console says so.
    let dir = tempfile::tempdir().unwrap();
    let path = two_ion_file(dir.path());
    let (mut tree, spatial) = tree_with_spatial(&path, |s| {
        s.set_stop_mode(StopMode::Radius);
        s.set_radius(0.1);
    });

    let out = tree.refresh(&RefreshContext::new()).unwrap();
    let frames = &out.outputs.iter().find(|(id, _)| *id == spatial).unwrap().1;
    assert_eq!(frames[0].as_ions().unwrap().data.len(), 0);
    let console = &out
        .consoles
        .iter()
        .find(|(id, _)| *id == spatial)
        .unwrap()
        .1;
    assert!(console[0].contains("no neighbours"));
}
