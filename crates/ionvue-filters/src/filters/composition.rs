//! Composition profile along a cylinder.
//!
//! The cylinder runs from `origin` to `origin + axis`. Each contained ion
//! lands in a 1D bin by its coordinate along the axis; with a range
//! stream upstream the counts split per species. Normalisation offers the
//! raw count, a volume density, or the per-bin species fraction.

use crate::filter::{
    BindingValue, Filter, FilterType, PropertyError, PropertyKind, PropertyValue,
};
use crate::filters::common::*;
use crate::stream::{DrawFrame, Frame, FramePayload, PlotFrame, StreamMask};
use crate::xml::XmlElem;
use ionvue_core::{
    ColourRGBAf, DrawPrimitive, DrawShape, PlotSeries, Point3D, Quaternion, RefreshContext,
    RefreshError, Result, SelectionBinding, TraceType, PROGRESS_CHUNK,
};
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionNormalise {
    RawCount,
    Density,
    Fraction,
}

impl CompositionNormalise {
    fn name(&self) -> &'static str {
        match self {
            Self::RawCount => "none",
            Self::Density => "density",
            Self::Fraction => "fraction",
        }
    }

    fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "none" => Self::RawCount,
            "density" => Self::Density,
            "fraction" => Self::Fraction,
            _ => return None,
        })
    }
}

pub struct CompositionProfileFilter {
    user_string: String,
    origin: Point3D,
    axis: Point3D,
    radius: f32,
    /// Fixed bin count when true, else fixed bin width.
    fixed_bins: bool,
    num_bins: usize,
    bin_width: f32,
    normalise: CompositionNormalise,
    show_primitive: bool,
}

impl Default for CompositionProfileFilter {
    fn default() -> Self {
        Self {
            user_string: String::new(),
            origin: Point3D::ZERO,
            axis: Point3D::new(0.0, 0.0, 10.0),
            radius: 5.0,
            fixed_bins: true,
            num_bins: 50,
            bin_width: 0.5,
            normalise: CompositionNormalise::RawCount,
            show_primitive: true,
        }
    }
}

impl CompositionProfileFilter {
    pub fn set_cylinder(&mut self, origin: Point3D, axis: Point3D, radius: f32) {
        self.origin = origin;
        self.axis = axis;
        self.radius = radius;
    }

    fn bin_layout(&self) -> (usize, f32) {
        let length = self.axis.magnitude();
        if self.fixed_bins {
            (self.num_bins.max(1), length / self.num_bins.max(1) as f32)
        } else {
            let n = ((length / self.bin_width).ceil() as usize).max(1);
            (n, self.bin_width)
        }
    }

    /// Coordinate of `p` along the axis in [0, L], or `None` when outside
    /// the cylinder.
    fn axial_coordinate(&self, p: &Point3D) -> Option<f32> {
        let length = self.axis.magnitude();
        let local = match Quaternion::z_onto(self.axis) {
            Some(q) => q.conjugate().rotate(*p - self.origin),
            None => {
                let v = *p - self.origin;
                if self.axis.z < 0.0 {
                    Point3D::new(v.x, v.y, -v.z)
                } else {
                    v
                }
            }
        };
        let inside = local.z >= 0.0
            && local.z <= length
            && local.x * local.x + local.y * local.y <= self.radius * self.radius;
        inside.then_some(local.z)
    }
}

impl Filter for CompositionProfileFilter {
    fn filter_type(&self) -> FilterType {
        FilterType::CompositionProfile
    }

    fn clone_uncached(&self) -> Box<dyn Filter> {
        Box::new(Self {
            user_string: self.user_string.clone(),
            origin: self.origin,
            axis: self.axis,
            radius: self.radius,
            fixed_bins: self.fixed_bins,
            num_bins: self.num_bins,
            bin_width: self.bin_width,
            normalise: self.normalise,
            show_primitive: self.show_primitive,
        })
    }

    fn refresh(
        &mut self,
        input: &[Frame],
        ctx: &RefreshContext,
        _console: &mut Vec<String>,
    ) -> Result<Vec<Frame>> {
        let (num_bins, bin_width) = self.bin_layout();
        let range = input.iter().find_map(Frame::as_range);

        // One counting row per species, or a single row unranged.
        let num_rows = range.map_or(1, |r| r.table.num_ions());
        let mut counts = vec![vec![0u64; num_bins]; num_rows];
        let mut processed = 0usize;
        for frame in input.iter().filter_map(Frame::as_ions) {
            for ion in &frame.data {
                if let Some(t) = self.axial_coordinate(&ion.pos) {
                    let row = match range {
                        Some(r) => match r.enabled_ion_of(ion.mass_to_charge) {
                            Some(species) => species,
                            None => continue,
                        },
                        None => 0,
                    };
                    let bin = ((t / bin_width) as usize).min(num_bins - 1);
                    counts[row][bin] += 1;
                }
                processed += 1;
                if processed % PROGRESS_CHUNK == 0 && ctx.cancel.is_cancelled() {
                    return Err(RefreshError::Aborted);
                }
            }
        }

        // Per-bin totals are only needed for the fraction normalisation.
        let totals: Vec<u64> = (0..num_bins)
            .map(|b| counts.iter().map(|row| row[b]).sum())
            .collect();
        let bin_volume = PI * self.radius * self.radius * bin_width;

        let mut out = Vec::new();
        for (row, row_counts) in counts.iter().enumerate() {
            if row_counts.iter().all(|&c| c == 0) {
                continue;
            }
            let (label, colour) = match range {
                Some(r) => {
                    let ion = &r.table.ions()[row];
                    (ion.short_name.clone(), ion.colour)
                }
                None => ("Composition".to_string(), ColourRGBAf::default()),
            };
            let mut series = PlotSeries::new(label);
            series.x_label = "Distance along axis (nm)".to_string();
            series.y_label = match self.normalise {
                CompositionNormalise::RawCount => "Count".to_string(),
                CompositionNormalise::Density => "Density (nm^-3)".to_string(),
                CompositionNormalise::Fraction => "Fraction".to_string(),
            };
            series.colour = colour;
            series.trace = TraceType::Lines;
            series.xy = row_counts
                .iter()
                .enumerate()
                .map(|(b, &c)| {
                    let x = (b as f32 + 0.5) * bin_width;
                    let y = match self.normalise {
                        CompositionNormalise::RawCount => c as f32,
                        CompositionNormalise::Density => c as f32 / bin_volume,
                        CompositionNormalise::Fraction => {
                            if totals[b] == 0 {
                                0.0
                            } else {
                                c as f32 / totals[b] as f32
                            }
                        }
                    };
                    (x, y)
                })
                .collect();
            out.push(Frame::new(FramePayload::Plot(PlotFrame { series })));
        }

        if self.show_primitive {
            let centre = self.origin + self.axis * 0.5;
            out.push(Frame::new(FramePayload::Draw(DrawFrame {
                primitives: vec![DrawPrimitive::new(
                    DrawShape::Cylinder {
                        origin: centre,
                        axis: self.axis * 0.5,
                        radius: self.radius,
                    },
                    ColourRGBAf::new(0.5, 1.0, 0.5, 0.5),
                )
                .with_binding(SelectionBinding::CylinderRadius)],
            })));
        }
        Ok(out)
    }

    fn num_bytes_for_cache(&self, _n_objects: usize) -> usize {
        let (num_bins, _) = self.bin_layout();
        num_bins * std::mem::size_of::<(f32, f32)>() * 8
    }

    fn emit_mask(&self) -> StreamMask {
        if self.show_primitive {
            StreamMask::PLOT | StreamMask::DRAW
        } else {
            StreamMask::PLOT
        }
    }

    fn block_mask(&self) -> StreamMask {
        StreamMask::empty()
    }

    fn use_mask(&self) -> StreamMask {
        StreamMask::IONS | StreamMask::RANGE
    }

    fn properties(&self) -> Vec<PropertyValue> {
        vec![
            PropertyValue::new("origin", point_str(&self.origin), PropertyKind::Point),
            PropertyValue::new("axis", point_str(&self.axis), PropertyKind::Point),
            PropertyValue::new("radius", self.radius, PropertyKind::Real),
            PropertyValue::new(
                "binmode",
                if self.fixed_bins { "count" } else { "width" },
                PropertyKind::Choice,
            ),
            PropertyValue::new("numbins", self.num_bins, PropertyKind::Integer),
            PropertyValue::new("binwidth", self.bin_width, PropertyKind::Real),
            PropertyValue::new("normalise", self.normalise.name(), PropertyKind::Choice),
            PropertyValue::new(
                "showprimitive",
                bool_str(self.show_primitive),
                PropertyKind::Bool,
            ),
        ]
    }

    fn set_property(&mut self, key: &str, value: &str) -> std::result::Result<bool, PropertyError> {
        match key {
            "origin" => {
                self.origin = parse_point(value).ok_or(PropertyError::InvalidValue("origin"))?;
                Ok(true)
            }
            "axis" => {
                self.axis = parse_point(value)
                    .filter(|p| p.sqr_magnitude() > 0.0)
                    .ok_or(PropertyError::InvalidValue("axis"))?;
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
            "binmode" => {
                self.fixed_bins = match value {
                    "count" => true,
                    "width" => false,
                    _ => return Err(PropertyError::InvalidValue("binmode")),
                };
                Ok(true)
            }
            "numbins" => {
                self.num_bins = value
                    .parse()
                    .ok()
                    .filter(|&n: &usize| n > 0)
                    .ok_or(PropertyError::InvalidValue("numbins"))?;
                Ok(self.fixed_bins)
            }
            "binwidth" => {
                self.bin_width = value
                    .parse()
                    .ok()
                    .filter(|w: &f32| *w > 0.0)
                    .ok_or(PropertyError::InvalidValue("binwidth"))?;
                Ok(!self.fixed_bins)
            }
            "normalise" => {
                self.normalise = CompositionNormalise::from_name(value)
                    .ok_or(PropertyError::InvalidValue("normalise"))?;
                Ok(true)
            }
            "showprimitive" => {
                self.show_primitive =
                    parse_bool(value).ok_or(PropertyError::InvalidValue("showprimitive"))?;
                Ok(true)
            }
            _ => Err(PropertyError::UnknownKey(key.to_string())),
        }
    }

    fn write_state(&self) -> XmlElem {
        XmlElem::new(self.filter_type().type_string())
            .child(XmlElem::value_elem("userstring", &self.user_string))
            .child(point_elem("origin", &self.origin))
            .child(point_elem("axis", &self.axis))
            .child(XmlElem::value_elem("radius", self.radius))
            .child(XmlElem::value_elem(
                "binmode",
                if self.fixed_bins { "count" } else { "width" },
            ))
            .child(XmlElem::value_elem("numbins", self.num_bins))
            .child(XmlElem::value_elem("binwidth", self.bin_width))
            .child(XmlElem::value_elem("normalise", self.normalise.name()))
            .child(XmlElem::value_elem(
                "showprimitive",
                bool_str(self.show_primitive),
            ))
    }

    fn read_state(&mut self, elem: &XmlElem) -> Option<()> {
        self.user_string = elem.child_value("userstring").unwrap_or_default();
        self.origin = point_from_elem(elem.get_child("origin")?)?;
        self.axis = point_from_elem(elem.get_child("axis")?)?;
        self.radius = elem.child_value("radius")?;
        if let Some(m) = elem.child_value::<String>("binmode") {
            self.fixed_bins = m == "count";
        }
        if let Some(v) = elem.child_value("numbins") {
            self.num_bins = v;
        }
        if let Some(v) = elem.child_value("binwidth") {
            self.bin_width = v;
        }
        if let Some(m) = elem.child_value::<String>("normalise") {
            self.normalise = CompositionNormalise::from_name(&m)?;
        }
        if let Some(v) = elem.child_value::<String>("showprimitive") {
            self.show_primitive = parse_bool(&v)?;
        }
        Some(())
    }

    fn user_string(&self) -> &str {
        &self.user_string
    }

    fn set_user_string(&mut self, s: &str) {
        self.user_string = s.to_string();
    }

    fn set_prop_from_binding(&mut self, binding: SelectionBinding, value: BindingValue) -> bool {
        match (binding, value) {
            (SelectionBinding::CylinderRadius, BindingValue::Scalar(r)) if r > 0.0 => {
                self.radius = r;
                true
            }
            (SelectionBinding::CylinderOrigin, BindingValue::Point(p)) => {
                self.origin = p;
                true
            }
            (SelectionBinding::CylinderDirection, BindingValue::Point(p))
                if p.sqr_magnitude() > 0.0 =>
            {
                self.axis = p;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axial_coordinate_z_aligned() {
        let f = CompositionProfileFilter::default();
        assert_eq!(f.axial_coordinate(&Point3D::new(0.0, 0.0, 3.0)), Some(3.0));
        assert_eq!(f.axial_coordinate(&Point3D::new(0.0, 0.0, -1.0)), None);
        assert_eq!(f.axial_coordinate(&Point3D::new(6.0, 0.0, 3.0)), None);
    }

    #[test]
    fn test_axial_coordinate_arbitrary_axis() {
        let mut f = CompositionProfileFilter::default();
        f.set_cylinder(Point3D::ZERO, Point3D::new(4.0, 0.0, 0.0), 1.0);
        let t = f.axial_coordinate(&Point3D::new(2.0, 0.5, 0.0)).unwrap();
        assert!((t - 2.0).abs() < 1e-5, "{t}");
        assert_eq!(f.axial_coordinate(&Point3D::new(5.0, 0.0, 0.0)), None);
    }
}
