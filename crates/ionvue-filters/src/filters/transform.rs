//! Geometric and statistical transforms over ion streams.
//!
//! Translate, scale and rotate act on positions; value shuffle uniformly
//! permutes the mass-to-charge channel across the whole input pool,
//! destroying the position/value association for use as a statistical
//! null. Scale and rotate take their origin from the user, the bounds
//! centroid, or the centre of mass.

use crate::filter::{Filter, FilterType, PropertyError, PropertyKind, PropertyValue};
use crate::filters::common::*;
use crate::stream::{Frame, FramePayload, IonFrame, StreamMask};
use crate::xml::XmlElem;
use ionvue_core::ion::{bound_cube_of, mass_centre_of};
use ionvue_core::sampling::shuffle_cancellable;
use ionvue_core::{
    ColourRGBAf, DrawPrimitive, DrawShape, IonHit, Point3D, Quaternion, RefreshContext,
    RefreshError, Result, ION_RECORD_SIZE, PROGRESS_CHUNK,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    Translate,
    Scale,
    Rotate,
    ValueShuffle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOrigin {
    User,
    BoundsCentroid,
    MassCentre,
}

pub struct TransformFilter {
    user_string: String,
    mode: TransformMode,
    origin_mode: TransformOrigin,
    origin: Point3D,
    offset: Point3D,
    scale_factor: f32,
    rotate_axis: Point3D,
    rotate_angle_deg: f32,
    show_origin: bool,
    seed: Option<u64>,
}

impl Default for TransformFilter {
    fn default() -> Self {
        Self {
            user_string: String::new(),
            mode: TransformMode::Translate,
            origin_mode: TransformOrigin::User,
            origin: Point3D::ZERO,
            offset: Point3D::ZERO,
            scale_factor: 1.0,
            rotate_axis: Point3D::new(0.0, 0.0, 1.0),
            rotate_angle_deg: 0.0,
            show_origin: false,
            seed: None,
        }
    }
}

impl TransformFilter {
    pub fn with_mode(mode: TransformMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn effective_origin(&self, all_ions: &[IonHit]) -> Point3D {
        match self.origin_mode {
            TransformOrigin::User => self.origin,
            TransformOrigin::BoundsCentroid => bound_cube_of(all_ions).centroid(),
            TransformOrigin::MassCentre => mass_centre_of(all_ions),
        }
    }

    fn apply_positional(
        &self,
        frame: &IonFrame,
        origin: Point3D,
        ctx: &RefreshContext,
    ) -> Result<IonFrame> {
        let quat = Quaternion::from_axis_angle(
            self.rotate_axis,
            self.rotate_angle_deg.to_radians(),
        );
        let mut out = frame.clone();
        for (n, ion) in out.data.iter_mut().enumerate() {
            ion.pos = match self.mode {
                TransformMode::Translate => ion.pos + self.offset,
                TransformMode::Scale => (ion.pos - origin) * self.scale_factor + origin,
                TransformMode::Rotate => quat.rotate_about(ion.pos, origin),
                TransformMode::ValueShuffle => unreachable!("handled by caller"),
            };
            if n % PROGRESS_CHUNK == 0 && ctx.cancel.is_cancelled() {
                return Err(RefreshError::Aborted);
            }
        }
        Ok(out)
    }
}

impl Filter for TransformFilter {
    fn filter_type(&self) -> FilterType {
        FilterType::Transform
    }

    fn clone_uncached(&self) -> Box<dyn Filter> {
        Box::new(Self {
            user_string: self.user_string.clone(),
            mode: self.mode,
            origin_mode: self.origin_mode,
            origin: self.origin,
            offset: self.offset,
            scale_factor: self.scale_factor,
            rotate_axis: self.rotate_axis,
            rotate_angle_deg: self.rotate_angle_deg,
            show_origin: self.show_origin,
            seed: self.seed,
        })
    }

    fn refresh(
        &mut self,
        input: &[Frame],
        ctx: &RefreshContext,
        _console: &mut Vec<String>,
    ) -> Result<Vec<Frame>> {
        let ion_frames: Vec<&IonFrame> = input.iter().filter_map(Frame::as_ions).collect();

        let mut out = Vec::new();
        if self.mode == TransformMode::ValueShuffle {
            // Pool every value, permute once, deal back out in order.
            let mut values: Vec<f32> = ion_frames
                .iter()
                .flat_map(|f| f.data.iter().map(|i| i.mass_to_charge))
                .collect();
            let mut rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            shuffle_cancellable(&mut values, &mut rng, &ctx.cancel)?;

            let mut cursor = 0usize;
            for frame in &ion_frames {
                let mut shuffled = (*frame).clone();
                for ion in &mut shuffled.data {
                    ion.mass_to_charge = values[cursor];
                    cursor += 1;
                }
                out.push(Frame::new(FramePayload::Ions(shuffled)));
            }
        } else {
            let all: Vec<IonHit> = ion_frames
                .iter()
                .flat_map(|f| f.data.iter().copied())
                .collect();
            let origin = self.effective_origin(&all);
            for frame in &ion_frames {
                out.push(Frame::new(FramePayload::Ions(
                    self.apply_positional(frame, origin, ctx)?,
                )));
            }
            if self.show_origin && self.mode != TransformMode::Translate {
                out.push(Frame::new(FramePayload::Draw(crate::stream::DrawFrame {
                    primitives: vec![DrawPrimitive::new(
                        DrawShape::Sphere {
                            origin,
                            radius: 0.5,
                        },
                        ColourRGBAf::opaque(1.0, 1.0, 1.0),
                    )],
                })));
            }
        }
        Ok(out)
    }

    fn num_bytes_for_cache(&self, n_objects: usize) -> usize {
        n_objects * ION_RECORD_SIZE
    }

    fn emit_mask(&self) -> StreamMask {
        if self.show_origin {
            StreamMask::IONS | StreamMask::DRAW
        } else {
            StreamMask::IONS
        }
    }

    fn block_mask(&self) -> StreamMask {
        StreamMask::empty()
    }

    fn use_mask(&self) -> StreamMask {
        StreamMask::IONS
    }

    fn properties(&self) -> Vec<PropertyValue> {
        let mode = match self.mode {
            TransformMode::Translate => "translate",
            TransformMode::Scale => "scale",
            TransformMode::Rotate => "rotate",
            TransformMode::ValueShuffle => "valueshuffle",
        };
        let origin_mode = match self.origin_mode {
            TransformOrigin::User => "user",
            TransformOrigin::BoundsCentroid => "centroid",
            TransformOrigin::MassCentre => "masscentre",
        };
        vec![
            PropertyValue::new("mode", mode, PropertyKind::Choice),
            PropertyValue::new("originmode", origin_mode, PropertyKind::Choice),
            PropertyValue::new("origin", point_str(&self.origin), PropertyKind::Point),
            PropertyValue::new("offset", point_str(&self.offset), PropertyKind::Point),
            PropertyValue::new("scalefactor", self.scale_factor, PropertyKind::Real),
            PropertyValue::new("rotateaxis", point_str(&self.rotate_axis), PropertyKind::Point),
            PropertyValue::new("rotateangle", self.rotate_angle_deg, PropertyKind::Real),
            PropertyValue::new("showorigin", bool_str(self.show_origin), PropertyKind::Bool),
        ]
    }

    fn set_property(&mut self, key: &str, value: &str) -> std::result::Result<bool, PropertyError> {
        match key {
            "mode" => {
                self.mode = match value {
                    "translate" => TransformMode::Translate,
                    "scale" => TransformMode::Scale,
                    "rotate" => TransformMode::Rotate,
                    "valueshuffle" => TransformMode::ValueShuffle,
                    _ => return Err(PropertyError::InvalidValue("mode")),
                };
                Ok(true)
            }
            "originmode" => {
                self.origin_mode = match value {
                    "user" => TransformOrigin::User,
                    "centroid" => TransformOrigin::BoundsCentroid,
                    "masscentre" => TransformOrigin::MassCentre,
                    _ => return Err(PropertyError::InvalidValue("originmode")),
                };
                Ok(true)
            }
            "origin" => {
                self.origin = parse_point(value).ok_or(PropertyError::InvalidValue("origin"))?;
                Ok(true)
            }
            "offset" => {
                self.offset = parse_point(value).ok_or(PropertyError::InvalidValue("offset"))?;
                Ok(true)
            }
            "scalefactor" => {
                self.scale_factor = value
                    .parse()
                    .ok()
                    .filter(|f: &f32| *f != 0.0)
                    .ok_or(PropertyError::InvalidValue("scalefactor"))?;
                Ok(true)
            }
            "rotateaxis" => {
                self.rotate_axis = parse_point(value)
                    .filter(|p| p.sqr_magnitude() > 0.0)
                    .ok_or(PropertyError::InvalidValue("rotateaxis"))?;
                Ok(true)
            }
            "rotateangle" => {
                self.rotate_angle_deg = value
                    .parse()
                    .map_err(|_| PropertyError::InvalidValue("rotateangle"))?;
                Ok(true)
            }
            "showorigin" => {
                self.show_origin =
                    parse_bool(value).ok_or(PropertyError::InvalidValue("showorigin"))?;
                Ok(true)
            }
            _ => Err(PropertyError::UnknownKey(key.to_string())),
        }
    }

    fn write_state(&self) -> XmlElem {
        let mode = match self.mode {
            TransformMode::Translate => "translate",
            TransformMode::Scale => "scale",
            TransformMode::Rotate => "rotate",
            TransformMode::ValueShuffle => "valueshuffle",
        };
        let origin_mode = match self.origin_mode {
            TransformOrigin::User => "user",
            TransformOrigin::BoundsCentroid => "centroid",
            TransformOrigin::MassCentre => "masscentre",
        };
        XmlElem::new(self.filter_type().type_string())
            .child(XmlElem::value_elem("userstring", &self.user_string))
            .child(XmlElem::value_elem("mode", mode))
            .child(XmlElem::value_elem("originmode", origin_mode))
            .child(point_elem("origin", &self.origin))
            .child(point_elem("offset", &self.offset))
            .child(XmlElem::value_elem("scalefactor", self.scale_factor))
            .child(point_elem("rotateaxis", &self.rotate_axis))
            .child(XmlElem::value_elem("rotateangle", self.rotate_angle_deg))
            .child(XmlElem::value_elem("showorigin", bool_str(self.show_origin)))
    }

    fn read_state(&mut self, elem: &XmlElem) -> Option<()> {
        self.user_string = elem.child_value("userstring").unwrap_or_default();
        self.mode = match elem.child_value::<String>("mode")?.as_str() {
            "translate" => TransformMode::Translate,
            "scale" => TransformMode::Scale,
            "rotate" => TransformMode::Rotate,
            "valueshuffle" => TransformMode::ValueShuffle,
            _ => return None,
        };
        if let Some(m) = elem.child_value::<String>("originmode") {
            self.origin_mode = match m.as_str() {
                "user" => TransformOrigin::User,
                "centroid" => TransformOrigin::BoundsCentroid,
                "masscentre" => TransformOrigin::MassCentre,
                _ => return None,
            };
        }
        if let Some(p) = elem.get_child("origin") {
            self.origin = point_from_elem(p)?;
        }
        if let Some(p) = elem.get_child("offset") {
            self.offset = point_from_elem(p)?;
        }
        if let Some(v) = elem.child_value("scalefactor") {
            self.scale_factor = v;
        }
        if let Some(p) = elem.get_child("rotateaxis") {
            self.rotate_axis = point_from_elem(p)?;
        }
        if let Some(v) = elem.child_value("rotateangle") {
            self.rotate_angle_deg = v;
        }
        if let Some(v) = elem.child_value::<String>("showorigin") {
            self.show_origin = parse_bool(&v)?;
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
