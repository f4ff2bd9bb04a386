//! Bounding box decoration.
//!
//! Computes the union bounding cube of every input ion stream with the
//! parallel reduction, then draws the box outline and an axis tick comb
//! with text labels in 2D (billboard) or 3D mode.

use crate::filter::{Filter, FilterType, PropertyError, PropertyKind, PropertyValue};
use crate::filters::common::*;
use crate::stream::{DrawFrame, Frame, FramePayload, StreamMask};
use crate::xml::XmlElem;
use ionvue_core::ion::bound_cube_of;
use ionvue_core::{
    BoundCube, ColourRGBAf, DrawPrimitive, DrawShape, IonHit, Point3D, RefreshContext, Result,
    TextMode,
};

pub struct BoundingBoxFilter {
    user_string: String,
    /// Fixed tick count per axis when true, else fixed tick spacing.
    fixed_ticks: bool,
    num_ticks: usize,
    tick_spacing: f32,
    colour: ColourRGBAf,
    line_width: f32,
    show_labels: bool,
    text_mode: TextMode,
    font_size: f32,
}

impl Default for BoundingBoxFilter {
    fn default() -> Self {
        Self {
            user_string: String::new(),
            fixed_ticks: true,
            num_ticks: 10,
            tick_spacing: 10.0,
            colour: ColourRGBAf::opaque(0.7, 0.7, 0.7),
            line_width: 1.0,
            show_labels: true,
            text_mode: TextMode::Flat2D,
            font_size: 5.0,
        }
    }
}

impl BoundingBoxFilter {
    fn axis_ticks(&self, bounds: &BoundCube, axis: usize) -> Vec<f32> {
        let lo = bounds.bound(axis, false);
        let hi = bounds.bound(axis, true);
        if self.fixed_ticks {
            let n = self.num_ticks.max(2);
            (0..n)
                .map(|i| lo + (hi - lo) * i as f32 / (n - 1) as f32)
                .collect()
        } else {
            let mut ticks = Vec::new();
            let mut v = lo;
            while v <= hi {
                ticks.push(v);
                v += self.tick_spacing;
            }
            ticks
        }
    }

    fn decorations(&self, bounds: &BoundCube) -> Vec<DrawPrimitive> {
        let mut prims = vec![DrawPrimitive::new(
            DrawShape::RectPrism {
                min: bounds.min_corner(),
                max: bounds.max_corner(),
                line_width: self.line_width,
            },
            self.colour,
        )];

        // Tick comb along each edge leaving the min corner.
        let origin = bounds.min_corner();
        for axis in 0..3 {
            let tick_len = (0..3)
                .filter(|&a| a != axis)
                .map(|a| bounds.size(a))
                .fold(f32::INFINITY, f32::min)
                * 0.05;
            for value in self.axis_ticks(bounds, axis) {
                let mut base = origin;
                let mut tip = origin;
                match axis {
                    0 => {
                        base.x = value;
                        tip.x = value;
                        tip.y -= tick_len;
                    }
                    1 => {
                        base.y = value;
                        tip.y = value;
                        tip.x -= tick_len;
                    }
                    _ => {
                        base.z = value;
                        tip.z = value;
                        tip.x -= tick_len;
                    }
                }
                prims.push(DrawPrimitive::new(
                    DrawShape::Line {
                        start: base,
                        end: tip,
                        width: self.line_width,
                    },
                    self.colour,
                ));
                if self.show_labels {
                    let label_offset = tick_len * 1.5;
                    let mut pos = tip;
                    match axis {
                        0 => pos.y -= label_offset,
                        1 => pos.x -= label_offset,
                        _ => pos.x -= label_offset,
                    }
                    prims.push(DrawPrimitive::new(
                        DrawShape::Text {
                            origin: pos,
                            text: format!("{value:.1}"),
                            size: self.font_size,
                            mode: self.text_mode,
                        },
                        self.colour,
                    ));
                }
            }
        }
        prims
    }
}

impl Filter for BoundingBoxFilter {
    fn filter_type(&self) -> FilterType {
        FilterType::BoundingBox
    }

    fn clone_uncached(&self) -> Box<dyn Filter> {
        Box::new(Self {
            user_string: self.user_string.clone(),
            fixed_ticks: self.fixed_ticks,
            num_ticks: self.num_ticks,
            tick_spacing: self.tick_spacing,
            colour: self.colour,
            line_width: self.line_width,
            show_labels: self.show_labels,
            text_mode: self.text_mode,
            font_size: self.font_size,
        })
    }

    fn refresh(
        &mut self,
        input: &[Frame],
        _ctx: &RefreshContext,
        _console: &mut Vec<String>,
    ) -> Result<Vec<Frame>> {
        let all: Vec<IonHit> = input
            .iter()
            .filter_map(Frame::as_ions)
            .flat_map(|f| f.data.iter().copied())
            .collect();
        let bounds = bound_cube_of(&all);
        if !bounds.is_valid() {
            // Nothing to bound; an empty refresh is not an error.
            return Ok(Vec::new());
        }
        Ok(vec![Frame::new(FramePayload::Draw(DrawFrame {
            primitives: self.decorations(&bounds),
        }))])
    }

    fn num_bytes_for_cache(&self, _n_objects: usize) -> usize {
        // Tick and label primitives only.
        4096
    }

    fn emit_mask(&self) -> StreamMask {
        StreamMask::DRAW
    }

    fn block_mask(&self) -> StreamMask {
        StreamMask::empty()
    }

    fn use_mask(&self) -> StreamMask {
        StreamMask::IONS
    }

    fn properties(&self) -> Vec<PropertyValue> {
        vec![
            PropertyValue::new(
                "tickmode",
                if self.fixed_ticks { "count" } else { "spacing" },
                PropertyKind::Choice,
            ),
            PropertyValue::new("numticks", self.num_ticks, PropertyKind::Integer),
            PropertyValue::new("tickspacing", self.tick_spacing, PropertyKind::Real),
            PropertyValue::new("colour", colour_str(&self.colour), PropertyKind::Colour),
            PropertyValue::new("linewidth", self.line_width, PropertyKind::Real),
            PropertyValue::new("showlabels", bool_str(self.show_labels), PropertyKind::Bool),
            PropertyValue::new(
                "textmode",
                match self.text_mode {
                    TextMode::Flat2D => "2d",
                    TextMode::InScene3D => "3d",
                },
                PropertyKind::Choice,
            ),
            PropertyValue::new("fontsize", self.font_size, PropertyKind::Real),
        ]
    }

    fn set_property(&mut self, key: &str, value: &str) -> std::result::Result<bool, PropertyError> {
        match key {
            "tickmode" => {
                self.fixed_ticks = match value {
                    "count" => true,
                    "spacing" => false,
                    _ => return Err(PropertyError::InvalidValue("tickmode")),
                };
                Ok(true)
            }
            "numticks" => {
                self.num_ticks = value
                    .parse()
                    .ok()
                    .filter(|&n: &usize| n >= 2)
                    .ok_or(PropertyError::InvalidValue("numticks"))?;
                Ok(self.fixed_ticks)
            }
            "tickspacing" => {
                self.tick_spacing = value
                    .parse()
                    .ok()
                    .filter(|s: &f32| *s > 0.0)
                    .ok_or(PropertyError::InvalidValue("tickspacing"))?;
                Ok(!self.fixed_ticks)
            }
            "colour" => {
                self.colour = parse_colour(value).ok_or(PropertyError::InvalidValue("colour"))?;
                Ok(true)
            }
            "linewidth" => {
                self.line_width = value
                    .parse()
                    .ok()
                    .filter(|w: &f32| *w > 0.0)
                    .ok_or(PropertyError::InvalidValue("linewidth"))?;
                Ok(true)
            }
            "showlabels" => {
                self.show_labels =
                    parse_bool(value).ok_or(PropertyError::InvalidValue("showlabels"))?;
                Ok(true)
            }
            "textmode" => {
                self.text_mode = match value {
                    "2d" => TextMode::Flat2D,
                    "3d" => TextMode::InScene3D,
                    _ => return Err(PropertyError::InvalidValue("textmode")),
                };
                Ok(self.show_labels)
            }
            "fontsize" => {
                self.font_size = value
                    .parse()
                    .ok()
                    .filter(|s: &f32| *s > 0.0)
                    .ok_or(PropertyError::InvalidValue("fontsize"))?;
                Ok(self.show_labels)
            }
            _ => Err(PropertyError::UnknownKey(key.to_string())),
        }
    }

    fn write_state(&self) -> XmlElem {
        XmlElem::new(self.filter_type().type_string())
            .child(XmlElem::value_elem("userstring", &self.user_string))
            .child(XmlElem::value_elem(
                "tickmode",
                if self.fixed_ticks { "count" } else { "spacing" },
            ))
            .child(XmlElem::value_elem("numticks", self.num_ticks))
            .child(XmlElem::value_elem("tickspacing", self.tick_spacing))
            .child(colour_elem(&self.colour))
            .child(XmlElem::value_elem("linewidth", self.line_width))
            .child(XmlElem::value_elem("showlabels", bool_str(self.show_labels)))
            .child(XmlElem::value_elem(
                "textmode",
                match self.text_mode {
                    TextMode::Flat2D => "2d",
                    TextMode::InScene3D => "3d",
                },
            ))
            .child(XmlElem::value_elem("fontsize", self.font_size))
    }

    fn read_state(&mut self, elem: &XmlElem) -> Option<()> {
        self.user_string = elem.child_value("userstring").unwrap_or_default();
        if let Some(m) = elem.child_value::<String>("tickmode") {
            self.fixed_ticks = m == "count";
        }
        if let Some(v) = elem.child_value("numticks") {
            self.num_ticks = v;
        }
        if let Some(v) = elem.child_value("tickspacing") {
            self.tick_spacing = v;
        }
        if let Some(c) = elem.get_child("colour") {
            self.colour = colour_from_elem(c)?;
        }
        if let Some(v) = elem.child_value("linewidth") {
            self.line_width = v;
        }
        if let Some(v) = elem.child_value::<String>("showlabels") {
            self.show_labels = parse_bool(&v)?;
        }
        if let Some(m) = elem.child_value::<String>("textmode") {
            self.text_mode = match m.as_str() {
                "3d" => TextMode::InScene3D,
                _ => TextMode::Flat2D,
            };
        }
        if let Some(v) = elem.child_value("fontsize") {
            self.font_size = v;
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
