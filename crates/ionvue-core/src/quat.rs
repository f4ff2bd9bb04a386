//! Unit quaternion rotation.
//!
//! Rotations are always about an explicit origin: translate, rotate,
//! translate back. The axis-alignment helper builds the quaternion that
//! carries +z onto an arbitrary direction, which is how cylinder
//! containment and axis profiles move points into the primitive's frame.

use crate::point::Point3D;
use serde::{Deserialize, Serialize};

/// Below this cross-product magnitude two unit vectors are treated as
/// parallel and no rotation is constructed.
pub const PARALLEL_TOL: f32 = 1.0e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Rotation of `angle_rad` about `axis`. The axis need not be
    /// normalised.
    pub fn from_axis_angle(axis: Point3D, angle_rad: f32) -> Self {
        let axis = axis.normalised();
        let half = angle_rad * 0.5;
        let s = half.sin();
        Self {
            w: half.cos(),
            x: axis.x * s,
            y: axis.y * s,
            z: axis.z * s,
        }
    }

    /// The rotation taking the +z axis onto `dir`. Returns `None` when
    /// `dir` is already numerically parallel to ±z; callers skip the
    /// rotation entirely in that case (anti-parallel callers flip signs
    /// themselves, which every current caller is symmetric under).
    pub fn z_onto(dir: Point3D) -> Option<Self> {
        let dir = dir.normalised();
        let z = Point3D::new(0.0, 0.0, 1.0);
        let cross = z.cross(&dir);
        if cross.sqr_magnitude() < PARALLEL_TOL * PARALLEL_TOL {
            return None;
        }
        Some(Self::from_axis_angle(cross, z.angle(&dir)))
    }

    pub fn conjugate(&self) -> Self {
        Self {
            w: self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    /// Rotate `p` about the coordinate origin.
    pub fn rotate(&self, p: Point3D) -> Point3D {
        // q * (0, p) * q^-1, expanded.
        let u = Point3D::new(self.x, self.y, self.z);
        let uv = u.cross(&p);
        let uuv = u.cross(&uv);
        p + (uv * self.w + uuv) * 2.0
    }

    /// Rotate `p` about an arbitrary origin.
    pub fn rotate_about(&self, p: Point3D, origin: Point3D) -> Point3D {
        self.rotate(p - origin) + origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn close(a: Point3D, b: Point3D) -> bool {
        a.sqr_distance(&b) < 1e-10
    }

    #[test]
    fn test_quarter_turn_about_z() {
        let q = Quaternion::from_axis_angle(Point3D::new(0.0, 0.0, 1.0), FRAC_PI_2);
        let p = q.rotate(Point3D::new(1.0, 0.0, 0.0));
        assert!(close(p, Point3D::new(0.0, 1.0, 0.0)), "{p:?}");
    }

    #[test]
    fn test_rotate_about_origin_offset() {
        let q = Quaternion::from_axis_angle(Point3D::new(0.0, 0.0, 1.0), FRAC_PI_2);
        let p = q.rotate_about(Point3D::new(2.0, 1.0, 0.0), Point3D::new(1.0, 1.0, 0.0));
        assert!(close(p, Point3D::new(1.0, 2.0, 0.0)), "{p:?}");
    }

    #[test]
    fn test_z_onto_parallel_is_none() {
        assert!(Quaternion::z_onto(Point3D::new(0.0, 0.0, 5.0)).is_none());
        assert!(Quaternion::z_onto(Point3D::new(0.0, 0.0, -3.0)).is_none());
        let q = Quaternion::z_onto(Point3D::new(1.0, 0.0, 0.0)).unwrap();
        let p = q.rotate(Point3D::new(0.0, 0.0, 1.0));
        assert!(close(p, Point3D::new(1.0, 0.0, 0.0)), "{p:?}");
    }
}
