//! Scene annotations: arrow, text label, angle measurement, ruler.
//!
//! Pure decoration generators; no data flows through them. Every handle
//! on an emitted primitive binds back to a parameter, so dragging an
//! arrow head or an angle arm updates this filter.

use crate::filter::{
    BindingValue, Filter, FilterType, PropertyError, PropertyKind, PropertyValue,
};
use crate::filters::common::*;
use crate::stream::{DrawFrame, Frame, FramePayload, StreamMask};
use crate::xml::XmlElem;
use ionvue_core::{
    ColourRGBAf, DrawPrimitive, DrawShape, Point3D, RefreshContext, Result, SelectionBinding,
    TextMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationMode {
    Arrow,
    Text,
    Angle,
    Ruler,
}

impl AnnotationMode {
    fn name(&self) -> &'static str {
        match self {
            Self::Arrow => "arrow",
            Self::Text => "text",
            Self::Angle => "angle",
            Self::Ruler => "ruler",
        }
    }

    fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "arrow" => Self::Arrow,
            "text" => Self::Text,
            "angle" => Self::Angle,
            "ruler" => Self::Ruler,
            _ => return None,
        })
    }
}

pub struct AnnotationFilter {
    user_string: String,
    mode: AnnotationMode,
    enabled: bool,
    colour: ColourRGBAf,
    /// Arrow / text anchor; angle pivot; ruler start.
    position: Point3D,
    /// Arrow vector; ruler end is `position + vector`.
    vector: Point3D,
    /// Angle arms, relative to the pivot.
    arm_a: Point3D,
    arm_b: Point3D,
    /// Show the reflex angle instead of the interior one.
    reflexive: bool,
    text: String,
    font_size: f32,
    ruler_tick_spacing: f32,
}

impl Default for AnnotationFilter {
    fn default() -> Self {
        Self {
            user_string: String::new(),
            mode: AnnotationMode::Arrow,
            enabled: true,
            colour: ColourRGBAf::opaque(1.0, 1.0, 0.0),
            position: Point3D::ZERO,
            vector: Point3D::new(0.0, 0.0, 10.0),
            arm_a: Point3D::new(10.0, 0.0, 0.0),
            arm_b: Point3D::new(0.0, 10.0, 0.0),
            reflexive: false,
            text: "Annotation".to_string(),
            font_size: 5.0,
            ruler_tick_spacing: 1.0,
        }
    }
}

impl AnnotationFilter {
    pub fn with_mode(mode: AnnotationMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// The measured angle in degrees, honouring the reflex toggle.
    pub fn measured_angle_deg(&self) -> f32 {
        let interior = self.arm_a.angle(&self.arm_b).to_degrees();
        if self.reflexive {
            360.0 - interior
        } else {
            interior
        }
    }

    fn primitives(&self) -> Vec<DrawPrimitive> {
        match self.mode {
            AnnotationMode::Arrow => vec![
                DrawPrimitive::new(
                    DrawShape::Arrow {
                        origin: self.position,
                        vector: self.vector,
                        head_size: self.vector.magnitude() * 0.1,
                    },
                    self.colour,
                )
                .with_binding(SelectionBinding::ArrowVector),
            ],
            AnnotationMode::Text => vec![
                DrawPrimitive::new(
                    DrawShape::Text {
                        origin: self.position,
                        text: self.text.clone(),
                        size: self.font_size,
                        mode: TextMode::InScene3D,
                    },
                    self.colour,
                )
                .with_binding(SelectionBinding::TextPosition),
            ],
            AnnotationMode::Angle => {
                let mut prims = vec![
                    DrawPrimitive::new(
                        DrawShape::Line {
                            start: self.position,
                            end: self.position + self.arm_a,
                            width: 1.0,
                        },
                        self.colour,
                    )
                    .with_binding(SelectionBinding::AngleArmA),
                    DrawPrimitive::new(
                        DrawShape::Line {
                            start: self.position,
                            end: self.position + self.arm_b,
                            width: 1.0,
                        },
                        self.colour,
                    )
                    .with_binding(SelectionBinding::AngleArmB),
                    DrawPrimitive::new(
                        DrawShape::Sphere {
                            origin: self.position,
                            radius: 0.25,
                        },
                        self.colour,
                    )
                    .with_binding(SelectionBinding::AngleOrigin),
                ];
                let label_pos =
                    self.position + (self.arm_a + self.arm_b).normalised() * 2.0;
                prims.push(DrawPrimitive::new(
                    DrawShape::Text {
                        origin: label_pos,
                        text: format!("{:.1}\u{b0}", self.measured_angle_deg()),
                        size: self.font_size,
                        mode: TextMode::Flat2D,
                    },
                    self.colour,
                ));
                prims
            }
            AnnotationMode::Ruler => {
                let end = self.position + self.vector;
                let length = self.vector.magnitude();
                let mut prims = vec![
                    DrawPrimitive::new(
                        DrawShape::Line {
                            start: self.position,
                            end,
                            width: 1.0,
                        },
                        self.colour,
                    )
                    .with_binding(SelectionBinding::RulerEnd),
                ];
                if self.ruler_tick_spacing > 0.0 {
                    let dir = self.vector.normalised();
                    // A fixed lateral direction keeps ticks visible from
                    // the default view.
                    let lateral = if dir.cross(&Point3D::new(0.0, 0.0, 1.0)).sqr_magnitude() > 1e-6
                    {
                        dir.cross(&Point3D::new(0.0, 0.0, 1.0)).normalised()
                    } else {
                        Point3D::new(1.0, 0.0, 0.0)
                    };
                    let mut t = 0.0f32;
                    while t <= length {
                        let base = self.position + dir * t;
                        prims.push(DrawPrimitive::new(
                            DrawShape::Line {
                                start: base,
                                end: base + lateral * (self.font_size * 0.2),
                                width: 1.0,
                            },
                            self.colour,
                        ));
                        prims.push(DrawPrimitive::new(
                            DrawShape::Text {
                                origin: base + lateral * (self.font_size * 0.4),
                                text: format!("{t:.1}"),
                                size: self.font_size * 0.5,
                                mode: TextMode::Flat2D,
                            },
                            self.colour,
                        ));
                        t += self.ruler_tick_spacing;
                    }
                }
                prims
            }
        }
    }
}

impl Filter for AnnotationFilter {
    fn filter_type(&self) -> FilterType {
        FilterType::Annotation
    }

    fn clone_uncached(&self) -> Box<dyn Filter> {
        Box::new(Self {
            user_string: self.user_string.clone(),
            mode: self.mode,
            enabled: self.enabled,
            colour: self.colour,
            position: self.position,
            vector: self.vector,
            arm_a: self.arm_a,
            arm_b: self.arm_b,
            reflexive: self.reflexive,
            text: self.text.clone(),
            font_size: self.font_size,
            ruler_tick_spacing: self.ruler_tick_spacing,
        })
    }

    fn refresh(
        &mut self,
        _input: &[Frame],
        _ctx: &RefreshContext,
        _console: &mut Vec<String>,
    ) -> Result<Vec<Frame>> {
        if !self.enabled {
            return Ok(Vec::new());
        }
        Ok(vec![Frame::new(FramePayload::Draw(DrawFrame {
            primitives: self.primitives(),
        }))])
    }

    fn num_bytes_for_cache(&self, _n_objects: usize) -> usize {
        2048
    }

    fn emit_mask(&self) -> StreamMask {
        StreamMask::DRAW
    }

    fn block_mask(&self) -> StreamMask {
        StreamMask::empty()
    }

    fn use_mask(&self) -> StreamMask {
        StreamMask::empty()
    }

    fn properties(&self) -> Vec<PropertyValue> {
        vec![
            PropertyValue::new("mode", self.mode.name(), PropertyKind::Choice),
            PropertyValue::new("enabled", bool_str(self.enabled), PropertyKind::Bool),
            PropertyValue::new("colour", colour_str(&self.colour), PropertyKind::Colour),
            PropertyValue::new("position", point_str(&self.position), PropertyKind::Point),
            PropertyValue::new("vector", point_str(&self.vector), PropertyKind::Point),
            PropertyValue::new("arma", point_str(&self.arm_a), PropertyKind::Point),
            PropertyValue::new("armb", point_str(&self.arm_b), PropertyKind::Point),
            PropertyValue::new("reflexive", bool_str(self.reflexive), PropertyKind::Bool),
            PropertyValue::new("text", &self.text, PropertyKind::String),
            PropertyValue::new("fontsize", self.font_size, PropertyKind::Real),
            PropertyValue::new("tickspacing", self.ruler_tick_spacing, PropertyKind::Real),
        ]
    }

    fn set_property(&mut self, key: &str, value: &str) -> std::result::Result<bool, PropertyError> {
        match key {
            "mode" => {
                self.mode = AnnotationMode::from_name(value)
                    .ok_or(PropertyError::InvalidValue("mode"))?;
                Ok(true)
            }
            "enabled" => {
                self.enabled = parse_bool(value).ok_or(PropertyError::InvalidValue("enabled"))?;
                Ok(true)
            }
            "colour" => {
                self.colour = parse_colour(value).ok_or(PropertyError::InvalidValue("colour"))?;
                Ok(true)
            }
            "position" => {
                self.position =
                    parse_point(value).ok_or(PropertyError::InvalidValue("position"))?;
                Ok(true)
            }
            "vector" => {
                self.vector = parse_point(value)
                    .filter(|p| p.sqr_magnitude() > 0.0)
                    .ok_or(PropertyError::InvalidValue("vector"))?;
                Ok(matches!(self.mode, AnnotationMode::Arrow | AnnotationMode::Ruler))
            }
            "arma" => {
                self.arm_a = parse_point(value)
                    .filter(|p| p.sqr_magnitude() > 0.0)
                    .ok_or(PropertyError::InvalidValue("arma"))?;
                Ok(self.mode == AnnotationMode::Angle)
            }
            "armb" => {
                self.arm_b = parse_point(value)
                    .filter(|p| p.sqr_magnitude() > 0.0)
                    .ok_or(PropertyError::InvalidValue("armb"))?;
                Ok(self.mode == AnnotationMode::Angle)
            }
            "reflexive" => {
                self.reflexive =
                    parse_bool(value).ok_or(PropertyError::InvalidValue("reflexive"))?;
                Ok(self.mode == AnnotationMode::Angle)
            }
            "text" => {
                self.text = value.to_string();
                Ok(self.mode == AnnotationMode::Text)
            }
            "fontsize" => {
                self.font_size = value
                    .parse()
                    .ok()
                    .filter(|s: &f32| *s > 0.0)
                    .ok_or(PropertyError::InvalidValue("fontsize"))?;
                Ok(true)
            }
            "tickspacing" => {
                self.ruler_tick_spacing = value
                    .parse()
                    .ok()
                    .filter(|s: &f32| *s > 0.0)
                    .ok_or(PropertyError::InvalidValue("tickspacing"))?;
                Ok(self.mode == AnnotationMode::Ruler)
            }
            _ => Err(PropertyError::UnknownKey(key.to_string())),
        }
    }

    fn write_state(&self) -> XmlElem {
        XmlElem::new(self.filter_type().type_string())
            .child(XmlElem::value_elem("userstring", &self.user_string))
            .child(XmlElem::value_elem("mode", self.mode.name()))
            .child(XmlElem::value_elem("enabled", bool_str(self.enabled)))
            .child(colour_elem(&self.colour))
            .child(point_elem("position", &self.position))
            .child(point_elem("vector", &self.vector))
            .child(point_elem("arma", &self.arm_a))
            .child(point_elem("armb", &self.arm_b))
            .child(XmlElem::value_elem("reflexive", bool_str(self.reflexive)))
            .child(XmlElem::value_elem("text", &self.text))
            .child(XmlElem::value_elem("fontsize", self.font_size))
            .child(XmlElem::value_elem("tickspacing", self.ruler_tick_spacing))
    }

    fn read_state(&mut self, elem: &XmlElem) -> Option<()> {
        self.user_string = elem.child_value("userstring").unwrap_or_default();
        self.mode = AnnotationMode::from_name(&elem.child_value::<String>("mode")?)?;
        if let Some(v) = elem.child_value::<String>("enabled") {
            self.enabled = parse_bool(&v)?;
        }
        if let Some(c) = elem.get_child("colour") {
            self.colour = colour_from_elem(c)?;
        }
        if let Some(p) = elem.get_child("position") {
            self.position = point_from_elem(p)?;
        }
        if let Some(p) = elem.get_child("vector") {
            self.vector = point_from_elem(p)?;
        }
        if let Some(p) = elem.get_child("arma") {
            self.arm_a = point_from_elem(p)?;
        }
        if let Some(p) = elem.get_child("armb") {
            self.arm_b = point_from_elem(p)?;
        }
        if let Some(v) = elem.child_value::<String>("reflexive") {
            self.reflexive = parse_bool(&v)?;
        }
        if let Some(v) = elem.child_value::<String>("text") {
            self.text = v;
        }
        if let Some(v) = elem.child_value("fontsize") {
            self.font_size = v;
        }
        if let Some(v) = elem.child_value("tickspacing") {
            self.ruler_tick_spacing = v;
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
            (SelectionBinding::ArrowVector, BindingValue::Point(p))
                if p.sqr_magnitude() > 0.0 =>
            {
                self.vector = p;
                true
            }
            (SelectionBinding::ArrowOrigin, BindingValue::Point(p))
            | (SelectionBinding::TextPosition, BindingValue::Point(p))
            | (SelectionBinding::AngleOrigin, BindingValue::Point(p))
            | (SelectionBinding::RulerStart, BindingValue::Point(p)) => {
                self.position = p;
                true
            }
            (SelectionBinding::AngleArmA, BindingValue::Point(p))
                if p.sqr_magnitude() > 0.0 =>
            {
                self.arm_a = p;
                true
            }
            (SelectionBinding::AngleArmB, BindingValue::Point(p))
                if p.sqr_magnitude() > 0.0 =>
            {
                self.arm_b = p;
                true
            }
            (SelectionBinding::RulerEnd, BindingValue::Point(p)) => {
                self.vector = p - self.position;
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
    fn test_measured_angle() {
        let f = AnnotationFilter::with_mode(AnnotationMode::Angle);
        assert!((f.measured_angle_deg() - 90.0).abs() < 1e-3);
        let mut reflex = AnnotationFilter::with_mode(AnnotationMode::Angle);
        reflex.reflexive = true;
        assert!((reflex.measured_angle_deg() - 270.0).abs() < 1e-3);
    }

    #[test]
    fn test_binding_updates_parameters() {
        let mut f = AnnotationFilter::with_mode(AnnotationMode::Arrow);
        assert!(f.set_prop_from_binding(
            SelectionBinding::ArrowVector,
            BindingValue::Point(Point3D::new(1.0, 2.0, 3.0)),
        ));
        assert_eq!(f.vector, Point3D::new(1.0, 2.0, 3.0));
        assert!(!f.set_prop_from_binding(
            SelectionBinding::SphereRadius,
            BindingValue::Scalar(2.0),
        ));
    }
}
