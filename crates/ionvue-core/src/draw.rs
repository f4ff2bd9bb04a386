//! Abstract scene primitives emitted toward the (out-of-tree) renderer.
//!
//! The engine never draws; it hands these descriptions downstream. A
//! primitive may carry a selection binding: an opaque id the host echoes
//! back with a new value when the user drags the corresponding handle, and
//! which the owning filter maps onto one of its parameters.

use crate::colour::ColourRGBAf;
use crate::point::Point3D;
use serde::{Deserialize, Serialize};

/// What a dragged handle on a primitive feeds back into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionBinding {
    SphereRadius,
    SphereOrigin,
    CylinderRadius,
    CylinderOrigin,
    CylinderDirection,
    PlaneOrigin,
    PlaneDirection,
    RectTranslate,
    RectCornerMove,
    ArrowOrigin,
    ArrowVector,
    TextPosition,
    AngleOrigin,
    AngleArmA,
    AngleArmB,
    RulerStart,
    RulerEnd,
}

/// 2D text is billboarded by the renderer; 3D text is an object in the
/// scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextMode {
    Flat2D,
    InScene3D,
}

/// One drawable, with an optional interaction binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawPrimitive {
    pub shape: DrawShape,
    pub colour: ColourRGBAf,
    pub binding: Option<SelectionBinding>,
}

impl DrawPrimitive {
    pub fn new(shape: DrawShape, colour: ColourRGBAf) -> Self {
        Self {
            shape,
            colour,
            binding: None,
        }
    }

    pub fn with_binding(mut self, binding: SelectionBinding) -> Self {
        self.binding = Some(binding);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawShape {
    Sphere {
        origin: Point3D,
        radius: f32,
    },
    Cylinder {
        origin: Point3D,
        axis: Point3D,
        radius: f32,
    },
    RectPrism {
        min: Point3D,
        max: Point3D,
        line_width: f32,
    },
    /// An arrow from `origin` along `vector`.
    Arrow {
        origin: Point3D,
        vector: Point3D,
        head_size: f32,
    },
    Line {
        start: Point3D,
        end: Point3D,
        width: f32,
    },
    Text {
        origin: Point3D,
        text: String,
        size: f32,
        mode: TextMode,
    },
}
