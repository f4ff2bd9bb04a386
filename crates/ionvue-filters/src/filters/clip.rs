//! Spatial clipping against a primitive volume.
//!
//! Keeps ions inside a sphere, half-space, cylinder or axis-aligned box;
//! the invert toggle drops them instead. Cylinder containment rotates the
//! query point into the cylinder frame with the quaternion that aligns +z
//! to the axis; when the axis already sits on ±z the rotation is skipped.
//! The primitive outline is emitted as a draw frame whose handles bind
//! back to the clip parameters.

use crate::filter::{
    BindingValue, Filter, FilterType, PropertyError, PropertyKind, PropertyValue,
};
use crate::filters::common::*;
use crate::stream::{DrawFrame, Frame, FramePayload, IonFrame, StreamMask};
use crate::xml::XmlElem;
use ionvue_core::{
    ColourRGBAf, DrawPrimitive, DrawShape, Point3D, Quaternion, RefreshContext, RefreshError,
    Result, SelectionBinding, ION_RECORD_SIZE, PROGRESS_CHUNK,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipPrimitive {
    Sphere {
        origin: Point3D,
        radius: f32,
    },
    /// Half-space: keeps the side the normal points toward.
    Plane {
        origin: Point3D,
        normal: Point3D,
    },
    /// Symmetric about `origin`; `axis` holds direction and half-length.
    Cylinder {
        origin: Point3D,
        axis: Point3D,
        radius: f32,
    },
    Box {
        min: Point3D,
        max: Point3D,
    },
}

impl ClipPrimitive {
    fn name(&self) -> &'static str {
        match self {
            Self::Sphere { .. } => "sphere",
            Self::Plane { .. } => "plane",
            Self::Cylinder { .. } => "cylinder",
            Self::Box { .. } => "box",
        }
    }

    fn contains(&self, p: &Point3D) -> bool {
        match self {
            Self::Sphere { origin, radius } => p.sqr_distance(origin) <= radius * radius,
            Self::Plane { origin, normal } => (*p - *origin).dot(normal) >= 0.0,
            Self::Cylinder {
                origin,
                axis,
                radius,
            } => {
                let local = match Quaternion::z_onto(*axis) {
                    Some(q) => q.conjugate().rotate(*p - *origin),
                    // Axis numerically parallel to z: containment is
                    // axis-aligned already.
                    None => *p - *origin,
                };
                let half_len = axis.magnitude();
                local.z.abs() <= half_len
                    && local.x * local.x + local.y * local.y <= radius * radius
            }
            Self::Box { min, max } => {
                (0..3).all(|a| p[a] >= min[a] && p[a] <= max[a])
            }
        }
    }

    fn outline(&self) -> DrawPrimitive {
        let colour = ColourRGBAf::new(0.5, 0.5, 1.0, 0.5);
        match *self {
            Self::Sphere { origin, radius } => {
                DrawPrimitive::new(DrawShape::Sphere { origin, radius }, colour)
                    .with_binding(SelectionBinding::SphereRadius)
            }
            Self::Plane { origin, normal } => DrawPrimitive::new(
                DrawShape::Arrow {
                    origin,
                    vector: normal,
                    head_size: 0.5,
                },
                colour,
            )
            .with_binding(SelectionBinding::PlaneDirection),
            Self::Cylinder {
                origin,
                axis,
                radius,
            } => DrawPrimitive::new(
                DrawShape::Cylinder {
                    origin,
                    axis,
                    radius,
                },
                colour,
            )
            .with_binding(SelectionBinding::CylinderRadius),
            Self::Box { min, max } => DrawPrimitive::new(
                DrawShape::RectPrism {
                    min,
                    max,
                    line_width: 1.0,
                },
                colour,
            )
            .with_binding(SelectionBinding::RectCornerMove),
        }
    }
}

pub struct ClipFilter {
    user_string: String,
    primitive: ClipPrimitive,
    invert: bool,
    show_primitive: bool,
}

impl Default for ClipFilter {
    fn default() -> Self {
        Self {
            user_string: String::new(),
            primitive: ClipPrimitive::Sphere {
                origin: Point3D::ZERO,
                radius: 10.0,
            },
            invert: false,
            show_primitive: true,
        }
    }
}

impl ClipFilter {
    pub fn with_primitive(primitive: ClipPrimitive) -> Self {
        Self {
            primitive,
            ..Default::default()
        }
    }

    pub fn set_invert(&mut self, invert: bool) {
        self.invert = invert;
    }
}

impl Filter for ClipFilter {
    fn filter_type(&self) -> FilterType {
        FilterType::Clip
    }

    fn clone_uncached(&self) -> Box<dyn Filter> {
        Box::new(Self {
            user_string: self.user_string.clone(),
            primitive: self.primitive,
            invert: self.invert,
            show_primitive: self.show_primitive,
        })
    }

    fn refresh(
        &mut self,
        input: &[Frame],
        ctx: &RefreshContext,
        _console: &mut Vec<String>,
    ) -> Result<Vec<Frame>> {
        let mut out = Vec::new();
        let mut processed = 0usize;
        for frame in input.iter().filter_map(Frame::as_ions) {
            let mut kept = frame.clone();
            let mut data = Vec::with_capacity(kept.data.len());
            for ion in &kept.data {
                if self.primitive.contains(&ion.pos) != self.invert {
                    data.push(*ion);
                }
                processed += 1;
                if processed % PROGRESS_CHUNK == 0 && ctx.cancel.is_cancelled() {
                    return Err(RefreshError::Aborted);
                }
            }
            kept.data = data;
            out.push(Frame::new(FramePayload::Ions(kept)));
        }
        if self.show_primitive {
            out.push(Frame::new(FramePayload::Draw(DrawFrame {
                primitives: vec![self.primitive.outline()],
            })));
        }
        Ok(out)
    }

    fn num_bytes_for_cache(&self, n_objects: usize) -> usize {
        n_objects * ION_RECORD_SIZE
    }

    fn emit_mask(&self) -> StreamMask {
        if self.show_primitive {
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
        let mut props = vec![
            PropertyValue::new("primitive", self.primitive.name(), PropertyKind::Choice),
            PropertyValue::new("invert", bool_str(self.invert), PropertyKind::Bool),
            PropertyValue::new(
                "showprimitive",
                bool_str(self.show_primitive),
                PropertyKind::Bool,
            ),
        ];
        match &self.primitive {
            ClipPrimitive::Sphere { origin, radius } => {
                props.push(PropertyValue::new("origin", point_str(origin), PropertyKind::Point));
                props.push(PropertyValue::new("radius", radius, PropertyKind::Real));
            }
            ClipPrimitive::Plane { origin, normal } => {
                props.push(PropertyValue::new("origin", point_str(origin), PropertyKind::Point));
                props.push(PropertyValue::new("normal", point_str(normal), PropertyKind::Point));
            }
            ClipPrimitive::Cylinder {
                origin,
                axis,
                radius,
            } => {
                props.push(PropertyValue::new("origin", point_str(origin), PropertyKind::Point));
                props.push(PropertyValue::new("axis", point_str(axis), PropertyKind::Point));
                props.push(PropertyValue::new("radius", radius, PropertyKind::Real));
            }
            ClipPrimitive::Box { min, max } => {
                props.push(PropertyValue::new("boxmin", point_str(min), PropertyKind::Point));
                props.push(PropertyValue::new("boxmax", point_str(max), PropertyKind::Point));
            }
        }
        props
    }

    fn set_property(&mut self, key: &str, value: &str) -> std::result::Result<bool, PropertyError> {
        match key {
            "primitive" => {
                self.primitive = match value {
                    "sphere" => ClipPrimitive::Sphere {
                        origin: Point3D::ZERO,
                        radius: 10.0,
                    },
                    "plane" => ClipPrimitive::Plane {
                        origin: Point3D::ZERO,
                        normal: Point3D::new(0.0, 0.0, 1.0),
                    },
                    "cylinder" => ClipPrimitive::Cylinder {
                        origin: Point3D::ZERO,
                        axis: Point3D::new(0.0, 0.0, 10.0),
                        radius: 5.0,
                    },
                    "box" => ClipPrimitive::Box {
                        min: Point3D::new(-10.0, -10.0, -10.0),
                        max: Point3D::new(10.0, 10.0, 10.0),
                    },
                    _ => return Err(PropertyError::InvalidValue("primitive")),
                };
                Ok(true)
            }
            "invert" => {
                self.invert = parse_bool(value).ok_or(PropertyError::InvalidValue("invert"))?;
                Ok(true)
            }
            "showprimitive" => {
                self.show_primitive =
                    parse_bool(value).ok_or(PropertyError::InvalidValue("showprimitive"))?;
                Ok(true)
            }
            "origin" => {
                let p = parse_point(value).ok_or(PropertyError::InvalidValue("origin"))?;
                match &mut self.primitive {
                    ClipPrimitive::Sphere { origin, .. }
                    | ClipPrimitive::Plane { origin, .. }
                    | ClipPrimitive::Cylinder { origin, .. } => *origin = p,
                    ClipPrimitive::Box { .. } => {
                        return Err(PropertyError::UnknownKey(key.to_string()))
                    }
                }
                Ok(true)
            }
            "radius" => {
                let r = value
                    .parse()
                    .ok()
                    .filter(|r: &f32| *r > 0.0)
                    .ok_or(PropertyError::InvalidValue("radius"))?;
                match &mut self.primitive {
                    ClipPrimitive::Sphere { radius, .. }
                    | ClipPrimitive::Cylinder { radius, .. } => *radius = r,
                    _ => return Err(PropertyError::UnknownKey(key.to_string())),
                }
                Ok(true)
            }
            "normal" => {
                let n = parse_point(value)
                    .filter(|p| p.sqr_magnitude() > 0.0)
                    .ok_or(PropertyError::InvalidValue("normal"))?;
                match &mut self.primitive {
                    ClipPrimitive::Plane { normal, .. } => *normal = n,
                    _ => return Err(PropertyError::UnknownKey(key.to_string())),
                }
                Ok(true)
            }
            "axis" => {
                let a = parse_point(value)
                    .filter(|p| p.sqr_magnitude() > 0.0)
                    .ok_or(PropertyError::InvalidValue("axis"))?;
                match &mut self.primitive {
                    ClipPrimitive::Cylinder { axis, .. } => *axis = a,
                    _ => return Err(PropertyError::UnknownKey(key.to_string())),
                }
                Ok(true)
            }
            "boxmin" => {
                let p = parse_point(value).ok_or(PropertyError::InvalidValue("boxmin"))?;
                match &mut self.primitive {
                    ClipPrimitive::Box { min, .. } => *min = p,
                    _ => return Err(PropertyError::UnknownKey(key.to_string())),
                }
                Ok(true)
            }
            "boxmax" => {
                let p = parse_point(value).ok_or(PropertyError::InvalidValue("boxmax"))?;
                match &mut self.primitive {
                    ClipPrimitive::Box { max, .. } => *max = p,
                    _ => return Err(PropertyError::UnknownKey(key.to_string())),
                }
                Ok(true)
            }
            _ => Err(PropertyError::UnknownKey(key.to_string())),
        }
    }

    fn write_state(&self) -> XmlElem {
        let mut elem = XmlElem::new(self.filter_type().type_string())
            .child(XmlElem::value_elem("userstring", &self.user_string))
            .child(XmlElem::value_elem("primitive", self.primitive.name()))
            .child(XmlElem::value_elem("invert", bool_str(self.invert)))
            .child(XmlElem::value_elem(
                "showprimitive",
                bool_str(self.show_primitive),
            ));
        match &self.primitive {
            ClipPrimitive::Sphere { origin, radius } => {
                elem = elem
                    .child(point_elem("origin", origin))
                    .child(XmlElem::value_elem("radius", radius));
            }
            ClipPrimitive::Plane { origin, normal } => {
                elem = elem
                    .child(point_elem("origin", origin))
                    .child(point_elem("normal", normal));
            }
            ClipPrimitive::Cylinder {
                origin,
                axis,
                radius,
            } => {
                elem = elem
                    .child(point_elem("origin", origin))
                    .child(point_elem("axis", axis))
                    .child(XmlElem::value_elem("radius", radius));
            }
            ClipPrimitive::Box { min, max } => {
                elem = elem
                    .child(point_elem("boxmin", min))
                    .child(point_elem("boxmax", max));
            }
        }
        elem
    }

    fn read_state(&mut self, elem: &XmlElem) -> Option<()> {
        self.user_string = elem.child_value("userstring").unwrap_or_default();
        let read_point = |name: &str| elem.get_child(name).and_then(point_from_elem);
        self.primitive = match elem.child_value::<String>("primitive")?.as_str() {
            "sphere" => ClipPrimitive::Sphere {
                origin: read_point("origin")?,
                radius: elem.child_value("radius")?,
            },
            "plane" => ClipPrimitive::Plane {
                origin: read_point("origin")?,
                normal: read_point("normal")?,
            },
            "cylinder" => ClipPrimitive::Cylinder {
                origin: read_point("origin")?,
                axis: read_point("axis")?,
                radius: elem.child_value("radius")?,
            },
            "box" => ClipPrimitive::Box {
                min: read_point("boxmin")?,
                max: read_point("boxmax")?,
            },
            _ => return None,
        };
        if let Some(v) = elem.child_value::<String>("invert") {
            self.invert = parse_bool(&v)?;
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
        match (binding, value, &mut self.primitive) {
            (
                SelectionBinding::SphereRadius,
                BindingValue::Scalar(r),
                ClipPrimitive::Sphere { radius, .. },
            )
            | (
                SelectionBinding::CylinderRadius,
                BindingValue::Scalar(r),
                ClipPrimitive::Cylinder { radius, .. },
            ) if r > 0.0 => {
                *radius = r;
                true
            }
            (
                SelectionBinding::SphereOrigin,
                BindingValue::Point(p),
                ClipPrimitive::Sphere { origin, .. },
            )
            | (
                SelectionBinding::CylinderOrigin,
                BindingValue::Point(p),
                ClipPrimitive::Cylinder { origin, .. },
            )
            | (
                SelectionBinding::PlaneOrigin,
                BindingValue::Point(p),
                ClipPrimitive::Plane { origin, .. },
            ) => {
                *origin = p;
                true
            }
            (
                SelectionBinding::CylinderDirection,
                BindingValue::Point(p),
                ClipPrimitive::Cylinder { axis, .. },
            )
            | (
                SelectionBinding::PlaneDirection,
                BindingValue::Point(p),
                ClipPrimitive::Plane { normal: axis, .. },
            ) if p.sqr_magnitude() > 0.0 => {
                *axis = p;
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
    fn test_sphere_containment() {
        let s = ClipPrimitive::Sphere {
            origin: Point3D::ZERO,
            radius: 2.0,
        };
        assert!(s.contains(&Point3D::new(1.0, 1.0, 1.0)));
        assert!(!s.contains(&Point3D::new(2.0, 2.0, 0.0)));
    }

    #[test]
    fn test_cylinder_containment_off_axis() {
        // Cylinder along x: axis vector (2,0,0), radius 1.
        let c = ClipPrimitive::Cylinder {
            origin: Point3D::ZERO,
            axis: Point3D::new(2.0, 0.0, 0.0),
            radius: 1.0,
        };
        assert!(c.contains(&Point3D::new(1.5, 0.5, 0.0)));
        assert!(!c.contains(&Point3D::new(2.5, 0.0, 0.0)));
        assert!(!c.contains(&Point3D::new(0.0, 1.5, 0.0)));
    }

    #[test]
    fn test_cylinder_containment_on_axis_skips_rotation() {
        let c = ClipPrimitive::Cylinder {
            origin: Point3D::new(0.0, 0.0, 5.0),
            axis: Point3D::new(0.0, 0.0, 3.0),
            radius: 1.0,
        };
        assert!(c.contains(&Point3D::new(0.5, 0.0, 7.0)));
        assert!(!c.contains(&Point3D::new(0.0, 0.0, 8.5)));
    }

    #[test]
    fn test_plane_half_space() {
        let p = ClipPrimitive::Plane {
            origin: Point3D::ZERO,
            normal: Point3D::new(0.0, 0.0, 1.0),
        };
        assert!(p.contains(&Point3D::new(0.0, 0.0, 1.0)));
        assert!(!p.contains(&Point3D::new(0.0, 0.0, -1.0)));
    }
}
