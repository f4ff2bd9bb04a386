//! Voxelisation of ion clouds onto a uniform grid.
//!
//! The grid covers the union bounding cube of every input ion frame,
//! either with fixed counts per axis or fixed cell widths. Normalisation
//! modes: raw counts, volume density, a per-voxel species ratio
//! (numerator over denominator, requires a range stream), and
//! concentration (numerator over total).

use crate::filter::{Filter, FilterType, PropertyError, PropertyKind, PropertyValue};
use crate::filters::common::*;
use crate::stream::{
    Frame, FramePayload, StreamMask, VoxelFrame, VoxelRepresentation,
};
use crate::xml::XmlElem;
use ionvue_core::ion::bound_cube_of;
use ionvue_core::{
    BoundCube, RefreshContext, RefreshError, Result, VoxelGrid, PROGRESS_CHUNK,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoxelNormalise {
    None,
    Density,
    Ratio,
    Concentration,
}

impl VoxelNormalise {
    fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Density => "density",
            Self::Ratio => "ratio",
            Self::Concentration => "concentration",
        }
    }

    fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "none" => Self::None,
            "density" => Self::Density,
            "ratio" => Self::Ratio,
            "concentration" => Self::Concentration,
            _ => return None,
        })
    }
}

pub struct VoxeliseFilter {
    user_string: String,
    /// Fixed counts per axis when true, else fixed widths.
    fixed_counts: bool,
    counts: [usize; 3],
    widths: [f32; 3],
    normalise: VoxelNormalise,
    /// Species flags for ratio/concentration numerator and denominator,
    /// indexed per range-table ion.
    numerator: Vec<bool>,
    denominator: Vec<bool>,
    representation: VoxelRepresentation,
    iso_level: f32,
    splat_size: f32,
}

impl Default for VoxeliseFilter {
    fn default() -> Self {
        Self {
            user_string: String::new(),
            fixed_counts: true,
            counts: [50, 50, 50],
            widths: [2.0, 2.0, 2.0],
            normalise: VoxelNormalise::None,
            numerator: Vec::new(),
            denominator: Vec::new(),
            representation: VoxelRepresentation::PointCloud,
            iso_level: 0.5,
            splat_size: 2.0,
        }
    }
}

impl VoxeliseFilter {
    fn grid_dims(&self, bounds: &BoundCube) -> [usize; 3] {
        if self.fixed_counts {
            self.counts.map(|c| c.max(1))
        } else {
            let mut dims = [1usize; 3];
            for axis in 0..3 {
                dims[axis] = ((bounds.size(axis) / self.widths[axis]).ceil() as usize).max(1);
            }
            dims
        }
    }
}

impl Filter for VoxeliseFilter {
    fn filter_type(&self) -> FilterType {
        FilterType::Voxelise
    }

    fn clone_uncached(&self) -> Box<dyn Filter> {
        Box::new(Self {
            user_string: self.user_string.clone(),
            fixed_counts: self.fixed_counts,
            counts: self.counts,
            widths: self.widths,
            normalise: self.normalise,
            numerator: self.numerator.clone(),
            denominator: self.denominator.clone(),
            representation: self.representation,
            iso_level: self.iso_level,
            splat_size: self.splat_size,
        })
    }

    fn refresh(
        &mut self,
        input: &[Frame],
        ctx: &RefreshContext,
        console: &mut Vec<String>,
    ) -> Result<Vec<Frame>> {
        let all_ions: Vec<_> = input
            .iter()
            .filter_map(Frame::as_ions)
            .flat_map(|f| f.data.iter().copied())
            .collect();
        if all_ions.is_empty() {
            return Ok(Vec::new());
        }
        let bounds = bound_cube_of(&all_ions);
        if !bounds.is_valid() {
            return Err(RefreshError::BoundsInvalid);
        }
        let dims = self.grid_dims(&bounds);

        let range = input.iter().find_map(Frame::as_range);
        let species_mode =
            matches!(self.normalise, VoxelNormalise::Ratio | VoxelNormalise::Concentration);
        if self.normalise == VoxelNormalise::Ratio && range.is_none() {
            console.push(
                "Ratio normalisation needs an upstream range filter; emitting raw counts"
                    .to_string(),
            );
        }

        let mut numerator_grid = VoxelGrid::new(dims, bounds);
        let mut denominator_grid = if species_mode && range.is_some() {
            Some(VoxelGrid::new(dims, bounds))
        } else {
            None
        };

        for (n, ion) in all_ions.iter().enumerate() {
            match (range, species_mode) {
                (Some(range), true) => {
                    if let Some(species) = range.enabled_ion_of(ion.mass_to_charge) {
                        if self.numerator.get(species).copied().unwrap_or(true) {
                            numerator_grid.increment_at(&ion.pos);
                        }
                        let in_denominator = match self.normalise {
                            VoxelNormalise::Ratio => {
                                self.denominator.get(species).copied().unwrap_or(true)
                            }
                            // Concentration divides by everything ranged.
                            _ => true,
                        };
                        if in_denominator {
                            if let Some(g) = denominator_grid.as_mut() {
                                g.increment_at(&ion.pos);
                            }
                        }
                    }
                }
                _ => numerator_grid.increment_at(&ion.pos),
            }
            if n % PROGRESS_CHUNK == 0 && ctx.cancel.is_cancelled() {
                return Err(RefreshError::Aborted);
            }
        }

        match self.normalise {
            VoxelNormalise::Density => {
                let volume = numerator_grid.cell_volume();
                if volume > 0.0 {
                    numerator_grid.scale(1.0 / volume);
                }
            }
            VoxelNormalise::Ratio | VoxelNormalise::Concentration => {
                if let Some(den) = denominator_grid {
                    numerator_grid.divide_by(&den);
                }
            }
            VoxelNormalise::None => {}
        }

        Ok(vec![Frame::new(FramePayload::Voxel(VoxelFrame {
            grid: numerator_grid,
            representation: self.representation,
            iso_level: self.iso_level,
            splat_size: self.splat_size,
        }))])
    }

    fn num_bytes_for_cache(&self, _n_objects: usize) -> usize {
        let cells = if self.fixed_counts {
            self.counts.iter().product::<usize>()
        } else {
            // Width mode depends on data bounds; assume the count-mode
            // default as the admission estimate.
            50 * 50 * 50
        };
        cells * std::mem::size_of::<f32>()
    }

    fn emit_mask(&self) -> StreamMask {
        StreamMask::VOXEL
    }

    fn block_mask(&self) -> StreamMask {
        StreamMask::empty()
    }

    fn use_mask(&self) -> StreamMask {
        StreamMask::IONS | StreamMask::RANGE
    }

    fn properties(&self) -> Vec<PropertyValue> {
        vec![
            PropertyValue::new(
                "binmode",
                if self.fixed_counts { "count" } else { "width" },
                PropertyKind::Choice,
            ),
            PropertyValue::new(
                "counts",
                format!("{},{},{}", self.counts[0], self.counts[1], self.counts[2]),
                PropertyKind::String,
            ),
            PropertyValue::new(
                "widths",
                format!("{},{},{}", self.widths[0], self.widths[1], self.widths[2]),
                PropertyKind::String,
            ),
            PropertyValue::new("normalise", self.normalise.name(), PropertyKind::Choice),
            PropertyValue::new("numerator", flags_str(&self.numerator), PropertyKind::String),
            PropertyValue::new(
                "denominator",
                flags_str(&self.denominator),
                PropertyKind::String,
            ),
            PropertyValue::new(
                "representation",
                match self.representation {
                    VoxelRepresentation::PointCloud => "pointcloud",
                    VoxelRepresentation::IsoSurface => "isosurface",
                },
                PropertyKind::Choice,
            ),
            PropertyValue::new("isolevel", self.iso_level, PropertyKind::Real),
            PropertyValue::new("splatsize", self.splat_size, PropertyKind::Real),
        ]
    }

    fn set_property(&mut self, key: &str, value: &str) -> std::result::Result<bool, PropertyError> {
        match key {
            "binmode" => {
                self.fixed_counts = match value {
                    "count" => true,
                    "width" => false,
                    _ => return Err(PropertyError::InvalidValue("binmode")),
                };
                Ok(true)
            }
            "counts" => {
                let parts: Vec<usize> = value
                    .split(',')
                    .map(|p| p.trim().parse().ok().filter(|&n: &usize| n > 0))
                    .collect::<Option<_>>()
                    .ok_or(PropertyError::InvalidValue("counts"))?;
                self.counts = parts
                    .try_into()
                    .map_err(|_| PropertyError::InvalidValue("counts"))?;
                Ok(self.fixed_counts)
            }
            "widths" => {
                let parts: Vec<f32> = value
                    .split(',')
                    .map(|p| p.trim().parse().ok().filter(|w: &f32| *w > 0.0))
                    .collect::<Option<_>>()
                    .ok_or(PropertyError::InvalidValue("widths"))?;
                self.widths = parts
                    .try_into()
                    .map_err(|_| PropertyError::InvalidValue("widths"))?;
                Ok(!self.fixed_counts)
            }
            "normalise" => {
                self.normalise = VoxelNormalise::from_name(value)
                    .ok_or(PropertyError::InvalidValue("normalise"))?;
                Ok(true)
            }
            "numerator" => {
                self.numerator =
                    parse_flags(value).ok_or(PropertyError::InvalidValue("numerator"))?;
                Ok(true)
            }
            "denominator" => {
                self.denominator =
                    parse_flags(value).ok_or(PropertyError::InvalidValue("denominator"))?;
                Ok(self.normalise == VoxelNormalise::Ratio)
            }
            "representation" => {
                self.representation = match value {
                    "pointcloud" => VoxelRepresentation::PointCloud,
                    "isosurface" => VoxelRepresentation::IsoSurface,
                    _ => return Err(PropertyError::InvalidValue("representation")),
                };
                // Display hint only; voxel contents are unchanged.
                Ok(false)
            }
            "isolevel" => {
                self.iso_level = value
                    .parse()
                    .map_err(|_| PropertyError::InvalidValue("isolevel"))?;
                Ok(false)
            }
            "splatsize" => {
                self.splat_size = value
                    .parse()
                    .map_err(|_| PropertyError::InvalidValue("splatsize"))?;
                Ok(false)
            }
            _ => Err(PropertyError::UnknownKey(key.to_string())),
        }
    }

    fn write_state(&self) -> XmlElem {
        XmlElem::new(self.filter_type().type_string())
            .child(XmlElem::value_elem("userstring", &self.user_string))
            .child(XmlElem::value_elem(
                "binmode",
                if self.fixed_counts { "count" } else { "width" },
            ))
            .child(XmlElem::value_elem(
                "counts",
                format!("{},{},{}", self.counts[0], self.counts[1], self.counts[2]),
            ))
            .child(XmlElem::value_elem(
                "widths",
                format!("{},{},{}", self.widths[0], self.widths[1], self.widths[2]),
            ))
            .child(XmlElem::value_elem("normalise", self.normalise.name()))
            .child(XmlElem::value_elem("numerator", flags_str(&self.numerator)))
            .child(XmlElem::value_elem(
                "denominator",
                flags_str(&self.denominator),
            ))
            .child(XmlElem::value_elem(
                "representation",
                match self.representation {
                    VoxelRepresentation::PointCloud => "pointcloud",
                    VoxelRepresentation::IsoSurface => "isosurface",
                },
            ))
            .child(XmlElem::value_elem("isolevel", self.iso_level))
            .child(XmlElem::value_elem("splatsize", self.splat_size))
    }

    fn read_state(&mut self, elem: &XmlElem) -> Option<()> {
        self.user_string = elem.child_value("userstring").unwrap_or_default();
        if let Some(m) = elem.child_value::<String>("binmode") {
            self.fixed_counts = m == "count";
        }
        if let Some(v) = elem.child_value::<String>("counts") {
            let parts: Vec<usize> = v
                .split(',')
                .map(|p| p.trim().parse().ok())
                .collect::<Option<_>>()?;
            self.counts = parts.try_into().ok()?;
        }
        if let Some(v) = elem.child_value::<String>("widths") {
            let parts: Vec<f32> = v
                .split(',')
                .map(|p| p.trim().parse().ok())
                .collect::<Option<_>>()?;
            self.widths = parts.try_into().ok()?;
        }
        if let Some(m) = elem.child_value::<String>("normalise") {
            self.normalise = VoxelNormalise::from_name(&m)?;
        }
        if let Some(v) = elem.child_value::<String>("numerator") {
            self.numerator = parse_flags(&v)?;
        }
        if let Some(v) = elem.child_value::<String>("denominator") {
            self.denominator = parse_flags(&v)?;
        }
        if let Some(m) = elem.child_value::<String>("representation") {
            self.representation = match m.as_str() {
                "isosurface" => VoxelRepresentation::IsoSurface,
                _ => VoxelRepresentation::PointCloud,
            };
        }
        if let Some(v) = elem.child_value("isolevel") {
            self.iso_level = v;
        }
        if let Some(v) = elem.child_value("splatsize") {
            self.splat_size = v;
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
