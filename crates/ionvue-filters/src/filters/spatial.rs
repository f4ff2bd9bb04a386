//! Neighbourhood statistics: local density, density filtering, and
//! RDF / nearest-neighbour histograms.
//!
//! All three algorithms build a k-d tree over the relevant ion positions.
//! Density replaces each ion's value channel with a local number density;
//! the density filter measures the same quantity but keeps the original
//! ions selected by a cutoff; RDF emits distance histograms, optionally
//! restricted to source/target species and with the source set eroded
//! away from the convex hull to suppress edge bias.

use crate::filter::{Filter, FilterType, PropertyError, PropertyKind, PropertyValue};
use crate::filters::common::*;
use crate::stream::{Frame, FramePayload, IonFrame, PlotFrame, RangeFrame, StreamMask};
use crate::xml::XmlElem;
use ionvue_core::{
    BoundCube, IonHit, PlotSeries, Point3D, RefreshContext, RefreshError, Result, TraceType,
    ION_RECORD_SIZE, PROGRESS_CHUNK,
};
use ionvue_spatial::{nn_histograms, radial_histogram, reduced_hull_points, KdTree};
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialAlgorithm {
    Density,
    DensityFilter,
    Rdf,
}

/// How a neighbourhood ends: after k neighbours, or at a fixed radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    Neighbour,
    Radius,
}

/// Cap on the per-point listing in the bad-point console warning.
const MAX_BAD_POINT_REPORT: usize = 200;

pub struct SpatialAnalysisFilter {
    user_string: String,
    algorithm: SpatialAlgorithm,
    stop_mode: StopMode,
    num_neighbours: usize,
    radius: f32,
    /// Density filter: keep ions above the cutoff, or below when
    /// `keep_above` is false.
    cutoff: f32,
    keep_above: bool,
    /// RDF controls.
    num_bins: usize,
    reduction_enabled: bool,
    reduction_distance: f32,
    source_enabled: Vec<bool>,
    target_enabled: Vec<bool>,
}

impl Default for SpatialAnalysisFilter {
    fn default() -> Self {
        Self {
            user_string: String::new(),
            algorithm: SpatialAlgorithm::Density,
            stop_mode: StopMode::Neighbour,
            num_neighbours: 1,
            radius: 1.0,
            cutoff: 0.5,
            keep_above: true,
            num_bins: 100,
            reduction_enabled: false,
            reduction_distance: 1.0,
            source_enabled: Vec::new(),
            target_enabled: Vec::new(),
        }
    }
}

fn sphere_volume(r: f32) -> f32 {
    4.0 / 3.0 * PI * r * r * r
}

fn everything() -> BoundCube {
    BoundCube::from_corners(
        Point3D::new(f32::MIN, f32::MIN, f32::MIN),
        Point3D::new(f32::MAX, f32::MAX, f32::MAX),
    )
}

/// Local density at each position, against a tree over the same buffer.
/// `None` marks a point with no usable neighbourhood.
///
/// The per-point queries are independent, so they fan out across the
/// rayon pool; workers observe the shared abort flag at the usual
/// cadence and the collect joins them all before returning.
fn local_densities(
    positions: &[Point3D],
    tree: &KdTree<'_>,
    stop_mode: StopMode,
    num_neighbours: usize,
    radius: f32,
    ctx: &RefreshContext,
) -> Result<Vec<Option<f32>>> {
    use rayon::prelude::*;

    let domain = everything();
    let done = std::sync::atomic::AtomicUsize::new(0);
    let total = positions.len().max(1);
    positions
        .par_iter()
        .map(|p| {
            let n = done.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            if n % PROGRESS_CHUNK == 0 {
                ctx.progress.set_filter_progress((n * 100 / total) as u32);
                if ctx.cancel.is_cancelled() {
                    return Err(RefreshError::Aborted);
                }
            }
            Ok(match stop_mode {
                StopMode::Neighbour => {
                    // The query point is its own nearest neighbour; ask
                    // for one extra and skip the self entry.
                    let neighbours = tree.find_k_nearest(p, &domain, num_neighbours + 1);
                    let distances: Vec<f32> = neighbours
                        .iter()
                        .map(|&i| p.sqr_distance(&tree.point(i)))
                        .filter(|&d| d > f32::EPSILON)
                        .collect();
                    if distances.len() < num_neighbours {
                        None
                    } else {
                        let r_k = distances[num_neighbours - 1].sqrt();
                        Some(num_neighbours as f32 / sphere_volume(r_k))
                    }
                }
                StopMode::Radius => {
                    let r_sq = radius * radius;
                    let mut count = 0usize;
                    let mut dead = 0.0f32;
                    while let Some(idx) = tree.find_nearest(p, &domain, dead) {
                        let d = p.sqr_distance(&tree.point(idx));
                        if d > r_sq {
                            break;
                        }
                        if d > f32::EPSILON {
                            count += 1;
                        }
                        dead = d;
                    }
                    if count == 0 {
                        None
                    } else {
                        Some(count as f32 / sphere_volume(radius))
                    }
                }
            })
        })
        .collect()
}

fn bad_point_warning(bad: &[Point3D]) -> String {
    let mut msg = format!(
        "{} points had no neighbours and were dropped:",
        bad.len()
    );
    for p in bad.iter().take(MAX_BAD_POINT_REPORT) {
        msg.push_str(&format!(" ({},{},{})", p.x, p.y, p.z));
    }
    if bad.len() > MAX_BAD_POINT_REPORT {
        msg.push_str(" ...");
    }
    msg
}

impl SpatialAnalysisFilter {
    pub fn with_algorithm(algorithm: SpatialAlgorithm) -> Self {
        Self {
            algorithm,
            ..Default::default()
        }
    }

    pub fn set_stop_mode(&mut self, mode: StopMode) {
        self.stop_mode = mode;
    }

    pub fn set_num_neighbours(&mut self, k: usize) {
        self.num_neighbours = k.max(1);
    }

    pub fn set_radius(&mut self, r: f32) {
        self.radius = r;
    }

    /// Ions allowed by a species flag vector; everything when the vector
    /// is unset or no range is present.
    fn species_subset(
        ions: &[IonHit],
        range: Option<&RangeFrame>,
        flags: &[bool],
    ) -> Vec<IonHit> {
        match range {
            Some(range) if !flags.is_empty() => ions
                .iter()
                .filter(|ion| {
                    range
                        .enabled_ion_of(ion.mass_to_charge)
                        .is_some_and(|s| flags.get(s).copied().unwrap_or(false))
                })
                .copied()
                .collect(),
            _ => ions.to_vec(),
        }
    }

    fn refresh_density(
        &self,
        input: &[Frame],
        ctx: &RefreshContext,
        console: &mut Vec<String>,
    ) -> Result<Vec<Frame>> {
        let mut out = Vec::new();
        for frame in input.iter().filter_map(Frame::as_ions) {
            if frame.data.is_empty() {
                continue;
            }
            let positions: Vec<Point3D> = frame.data.iter().map(|i| i.pos).collect();
            let tree = KdTree::build_cancellable(&positions, &ctx.cancel)?;
            let densities = local_densities(
                &positions,
                &tree,
                self.stop_mode,
                self.num_neighbours,
                self.radius,
                ctx,
            )?;

            let mut bad = Vec::new();
            let mut result = IonFrame {
                colour: frame.colour,
                ion_size: frame.ion_size,
                value_label: "Number Density (nm^-3)".to_string(),
                data: Vec::with_capacity(frame.data.len()),
            };
            for (ion, density) in frame.data.iter().zip(&densities) {
                match (self.algorithm, density) {
                    (SpatialAlgorithm::Density, Some(d)) => {
                        result.data.push(IonHit::new(ion.pos, *d));
                    }
                    (SpatialAlgorithm::DensityFilter, Some(d)) => {
                        if (*d >= self.cutoff) == self.keep_above {
                            result.data.push(*ion);
                        }
                    }
                    (_, None) => bad.push(ion.pos),
                    _ => unreachable!("density paths only"),
                }
            }
            if self.algorithm == SpatialAlgorithm::DensityFilter {
                result.value_label = frame.value_label.clone();
            }
            if !bad.is_empty() {
                console.push(bad_point_warning(&bad));
            }
            out.push(Frame::new(FramePayload::Ions(result)));
        }
        Ok(out)
    }

    fn refresh_rdf(
        &self,
        input: &[Frame],
        ctx: &RefreshContext,
        console: &mut Vec<String>,
    ) -> Result<Vec<Frame>> {
        let all: Vec<IonHit> = input
            .iter()
            .filter_map(Frame::as_ions)
            .flat_map(|f| f.data.iter().copied())
            .collect();
        if all.is_empty() {
            return Ok(Vec::new());
        }
        let range = input.iter().find_map(Frame::as_range);

        let sources = Self::species_subset(&all, range, &self.source_enabled);
        let targets = Self::species_subset(&all, range, &self.target_enabled);
        if sources.is_empty() || targets.is_empty() {
            return Err(RefreshError::InsufficientSize);
        }

        let mut source_pts: Vec<Point3D> = sources.iter().map(|i| i.pos).collect();
        if self.reduction_enabled {
            let kept = reduced_hull_points(&source_pts, self.reduction_distance)
                .map_err(|_| RefreshError::InsufficientSize)?;
            console.push(format!(
                "Hull reduction kept {} of {} source points",
                kept.len(),
                source_pts.len()
            ));
            source_pts = kept.into_iter().map(|i| source_pts[i]).collect();
            if source_pts.is_empty() {
                return Err(RefreshError::InsufficientSize);
            }
        }

        let target_pts: Vec<Point3D> = targets.iter().map(|i| i.pos).collect();
        let tree = KdTree::build_cancellable(&target_pts, &ctx.cancel)?;

        let mut out = Vec::new();
        match self.stop_mode {
            StopMode::Neighbour => {
                let hists = nn_histograms(
                    &source_pts,
                    &tree,
                    self.num_neighbours,
                    self.num_bins,
                    &ctx.cancel,
                )?;
                for (rank, hist) in hists.iter().enumerate() {
                    let mut series = PlotSeries::new(format!("NN distance (rank {})", rank + 1));
                    series.x_label = "Distance (nm)".to_string();
                    series.y_label = "Count".to_string();
                    series.trace = TraceType::Bars;
                    series.xy = hist.xy();
                    out.push(Frame::new(FramePayload::Plot(PlotFrame { series })));
                }
            }
            StopMode::Radius => {
                let hist = radial_histogram(
                    &source_pts,
                    &tree,
                    self.radius,
                    self.num_bins,
                    &ctx.cancel,
                )?;
                let mut series = PlotSeries::new("Radial distribution");
                series.x_label = "Distance (nm)".to_string();
                series.y_label = "Count".to_string();
                series.trace = TraceType::Bars;
                series.xy = hist.xy();
                out.push(Frame::new(FramePayload::Plot(PlotFrame { series })));
            }
        }
        Ok(out)
    }
}

impl Filter for SpatialAnalysisFilter {
    fn filter_type(&self) -> FilterType {
        FilterType::SpatialAnalysis
    }

    fn clone_uncached(&self) -> Box<dyn Filter> {
        Box::new(Self {
            user_string: self.user_string.clone(),
            algorithm: self.algorithm,
            stop_mode: self.stop_mode,
            num_neighbours: self.num_neighbours,
            radius: self.radius,
            cutoff: self.cutoff,
            keep_above: self.keep_above,
            num_bins: self.num_bins,
            reduction_enabled: self.reduction_enabled,
            reduction_distance: self.reduction_distance,
            source_enabled: self.source_enabled.clone(),
            target_enabled: self.target_enabled.clone(),
        })
    }

    fn refresh(
        &mut self,
        input: &[Frame],
        ctx: &RefreshContext,
        console: &mut Vec<String>,
    ) -> Result<Vec<Frame>> {
        match self.algorithm {
            SpatialAlgorithm::Density | SpatialAlgorithm::DensityFilter => {
                self.refresh_density(input, ctx, console)
            }
            SpatialAlgorithm::Rdf => self.refresh_rdf(input, ctx, console),
        }
    }

    fn num_bytes_for_cache(&self, n_objects: usize) -> usize {
        match self.algorithm {
            SpatialAlgorithm::Rdf => self.num_bins * std::mem::size_of::<(f32, f32)>(),
            _ => n_objects * ION_RECORD_SIZE,
        }
    }

    fn emit_mask(&self) -> StreamMask {
        match self.algorithm {
            SpatialAlgorithm::Rdf => StreamMask::PLOT,
            _ => StreamMask::IONS,
        }
    }

    fn block_mask(&self) -> StreamMask {
        // Density output re-values the ion stream; a downstream range
        // classification against it would be nonsense.
        match self.algorithm {
            SpatialAlgorithm::Density => StreamMask::RANGE,
            _ => StreamMask::empty(),
        }
    }

    fn use_mask(&self) -> StreamMask {
        StreamMask::IONS | StreamMask::RANGE
    }

    fn properties(&self) -> Vec<PropertyValue> {
        let algorithm = match self.algorithm {
            SpatialAlgorithm::Density => "density",
            SpatialAlgorithm::DensityFilter => "densityfilter",
            SpatialAlgorithm::Rdf => "rdf",
        };
        let stop = match self.stop_mode {
            StopMode::Neighbour => "neighbour",
            StopMode::Radius => "radius",
        };
        vec![
            PropertyValue::new("algorithm", algorithm, PropertyKind::Choice),
            PropertyValue::new("stopmode", stop, PropertyKind::Choice),
            PropertyValue::new("neighbours", self.num_neighbours, PropertyKind::Integer),
            PropertyValue::new("radius", self.radius, PropertyKind::Real),
            PropertyValue::new("cutoff", self.cutoff, PropertyKind::Real),
            PropertyValue::new("keepabove", bool_str(self.keep_above), PropertyKind::Bool),
            PropertyValue::new("numbins", self.num_bins, PropertyKind::Integer),
            PropertyValue::new(
                "reduction",
                bool_str(self.reduction_enabled),
                PropertyKind::Bool,
            ),
            PropertyValue::new(
                "reductiondistance",
                self.reduction_distance,
                PropertyKind::Real,
            ),
            PropertyValue::new("sourceions", flags_str(&self.source_enabled), PropertyKind::String),
            PropertyValue::new("targetions", flags_str(&self.target_enabled), PropertyKind::String),
        ]
    }

    fn set_property(&mut self, key: &str, value: &str) -> std::result::Result<bool, PropertyError> {
        match key {
            "algorithm" => {
                self.algorithm = match value {
                    "density" => SpatialAlgorithm::Density,
                    "densityfilter" => SpatialAlgorithm::DensityFilter,
                    "rdf" => SpatialAlgorithm::Rdf,
                    _ => return Err(PropertyError::InvalidValue("algorithm")),
                };
                Ok(true)
            }
            "stopmode" => {
                self.stop_mode = match value {
                    "neighbour" => StopMode::Neighbour,
                    "radius" => StopMode::Radius,
                    _ => return Err(PropertyError::InvalidValue("stopmode")),
                };
                Ok(true)
            }
            "neighbours" => {
                self.num_neighbours = value
                    .parse()
                    .ok()
                    .filter(|&k: &usize| k > 0)
                    .ok_or(PropertyError::InvalidValue("neighbours"))?;
                Ok(true)
            }
            "radius" => {
                self.radius = value
                    .parse()
                    .ok()
                    .filter(|r: &f32| *r > 0.0)
                    .ok_or(PropertyError::InvalidValue("radius"))?;
                Ok(true)
            }
            "cutoff" => {
                self.cutoff = value
                    .parse()
                    .map_err(|_| PropertyError::InvalidValue("cutoff"))?;
                Ok(self.algorithm == SpatialAlgorithm::DensityFilter)
            }
            "keepabove" => {
                self.keep_above =
                    parse_bool(value).ok_or(PropertyError::InvalidValue("keepabove"))?;
                Ok(self.algorithm == SpatialAlgorithm::DensityFilter)
            }
            "numbins" => {
                self.num_bins = value
                    .parse()
                    .ok()
                    .filter(|&n: &usize| n > 0)
                    .ok_or(PropertyError::InvalidValue("numbins"))?;
                Ok(self.algorithm == SpatialAlgorithm::Rdf)
            }
            "reduction" => {
                self.reduction_enabled =
                    parse_bool(value).ok_or(PropertyError::InvalidValue("reduction"))?;
                Ok(self.algorithm == SpatialAlgorithm::Rdf)
            }
            "reductiondistance" => {
                self.reduction_distance = value
                    .parse()
                    .ok()
                    .filter(|d: &f32| *d > 0.0)
                    .ok_or(PropertyError::InvalidValue("reductiondistance"))?;
                Ok(self.algorithm == SpatialAlgorithm::Rdf && self.reduction_enabled)
            }
            "sourceions" => {
                self.source_enabled =
                    parse_flags(value).ok_or(PropertyError::InvalidValue("sourceions"))?;
                Ok(self.algorithm == SpatialAlgorithm::Rdf)
            }
            "targetions" => {
                self.target_enabled =
                    parse_flags(value).ok_or(PropertyError::InvalidValue("targetions"))?;
                Ok(self.algorithm == SpatialAlgorithm::Rdf)
            }
            _ => Err(PropertyError::UnknownKey(key.to_string())),
        }
    }

    fn write_state(&self) -> XmlElem {
        let algorithm = match self.algorithm {
            SpatialAlgorithm::Density => "density",
            SpatialAlgorithm::DensityFilter => "densityfilter",
            SpatialAlgorithm::Rdf => "rdf",
        };
        let stop = match self.stop_mode {
            StopMode::Neighbour => "neighbour",
            StopMode::Radius => "radius",
        };
        XmlElem::new(self.filter_type().type_string())
            .child(XmlElem::value_elem("userstring", &self.user_string))
            .child(XmlElem::value_elem("algorithm", algorithm))
            .child(XmlElem::value_elem("stopmode", stop))
            .child(XmlElem::value_elem("neighbours", self.num_neighbours))
            .child(XmlElem::value_elem("radius", self.radius))
            .child(XmlElem::value_elem("cutoff", self.cutoff))
            .child(XmlElem::value_elem("keepabove", bool_str(self.keep_above)))
            .child(XmlElem::value_elem("numbins", self.num_bins))
            .child(XmlElem::value_elem(
                "reduction",
                bool_str(self.reduction_enabled),
            ))
            .child(XmlElem::value_elem(
                "reductiondistance",
                self.reduction_distance,
            ))
            .child(XmlElem::value_elem(
                "sourceions",
                flags_str(&self.source_enabled),
            ))
            .child(XmlElem::value_elem(
                "targetions",
                flags_str(&self.target_enabled),
            ))
    }

    fn read_state(&mut self, elem: &XmlElem) -> Option<()> {
        self.user_string = elem.child_value("userstring").unwrap_or_default();
        self.algorithm = match elem.child_value::<String>("algorithm")?.as_str() {
            "density" => SpatialAlgorithm::Density,
            "densityfilter" => SpatialAlgorithm::DensityFilter,
            "rdf" => SpatialAlgorithm::Rdf,
            _ => return None,
        };
        self.stop_mode = match elem.child_value::<String>("stopmode")?.as_str() {
            "neighbour" => StopMode::Neighbour,
            "radius" => StopMode::Radius,
            _ => return None,
        };
        if let Some(v) = elem.child_value("neighbours") {
            self.num_neighbours = v;
        }
        if let Some(v) = elem.child_value("radius") {
            self.radius = v;
        }
        if let Some(v) = elem.child_value("cutoff") {
            self.cutoff = v;
        }
        if let Some(v) = elem.child_value::<String>("keepabove") {
            self.keep_above = parse_bool(&v)?;
        }
        if let Some(v) = elem.child_value("numbins") {
            self.num_bins = v;
        }
        if let Some(v) = elem.child_value::<String>("reduction") {
            self.reduction_enabled = parse_bool(&v)?;
        }
        if let Some(v) = elem.child_value("reductiondistance") {
            self.reduction_distance = v;
        }
        if let Some(v) = elem.child_value::<String>("sourceions") {
            self.source_enabled = parse_flags(&v)?;
        }
        if let Some(v) = elem.child_value::<String>("targetions") {
            self.target_enabled = parse_flags(&v)?;
        }
        Some(())
    }

    fn user_string(&self) -> &str {
        &self.user_string
    }

    fn set_user_string(&mut self, s: &str) {
        self.user_string = s.to_string();
    }
}
