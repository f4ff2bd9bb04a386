//! Camera descriptions, persisted with the session.
//!
//! The engine never renders; cameras exist only so the host can restore
//! its viewpoints. Name, frame vectors and projection are round-tripped
//! verbatim.

use ionvue_core::Point3D;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CAMERA_NAME: &str = "Default";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CameraProjection {
    Perspective { fov_deg: f32 },
    Orthographic { scale: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub name: String,
    pub origin: Point3D,
    pub target: Point3D,
    pub up: Point3D,
    pub projection: CameraProjection,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            name: DEFAULT_CAMERA_NAME.to_string(),
            origin: Point3D::new(0.0, 0.0, 50.0),
            target: Point3D::ZERO,
            up: Point3D::new(0.0, 1.0, 0.0),
            projection: CameraProjection::Perspective { fov_deg: 90.0 },
        }
    }
}

impl Camera {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The default camera keeps its name out of merge de-duplication.
    pub fn is_default_named(&self) -> bool {
        self.name == DEFAULT_CAMERA_NAME
    }
}
