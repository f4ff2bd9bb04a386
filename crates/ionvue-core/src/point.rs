//! Single-precision 3D point with the vector algebra the analysis
//! operators need.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Index, Mul, Neg, Sub, SubAssign};

/// A point (or vector) in reconstruction space, in nanometres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared Euclidean distance to `other`.
    pub fn sqr_distance(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.sqr_distance(other).sqrt()
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn sqr_magnitude(&self) -> f32 {
        self.dot(self)
    }

    pub fn magnitude(&self) -> f32 {
        self.sqr_magnitude().sqrt()
    }

    /// Unit vector in the same direction. Zero vectors are returned
    /// unchanged rather than dividing by zero.
    pub fn normalised(&self) -> Self {
        let mag = self.magnitude();
        if mag == 0.0 {
            *self
        } else {
            *self * (1.0 / mag)
        }
    }

    pub fn is_nan(&self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.z.is_nan()
    }

    /// Reverse the byte order of each component in place. POS records are
    /// big-endian on disk.
    pub fn switch_endian(&mut self) {
        self.x = f32::from_bits(self.x.to_bits().swap_bytes());
        self.y = f32::from_bits(self.y.to_bits().swap_bytes());
        self.z = f32::from_bits(self.z.to_bits().swap_bytes());
    }

    /// Component-wise minimum.
    pub fn min(&self, other: &Self) -> Self {
        Self {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
            z: self.z.min(other.z),
        }
    }

    /// Component-wise maximum.
    pub fn max(&self, other: &Self) -> Self {
        Self {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
            z: self.z.max(other.z),
        }
    }

    /// Angle between this vector and `other`, in radians.
    pub fn angle(&self, other: &Self) -> f32 {
        let denom = self.magnitude() * other.magnitude();
        if denom == 0.0 {
            return 0.0;
        }
        (self.dot(other) / denom).clamp(-1.0, 1.0).acos()
    }
}

impl Index<usize> for Point3D {
    type Output = f32;

    fn index(&self, axis: usize) -> &f32 {
        match axis {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("axis out of range: {axis}"),
        }
    }
}

impl Add for Point3D {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Point3D {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Point3D {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Point3D {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul<f32> for Point3D {
    type Output = Self;
    fn mul(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Neg for Point3D {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqr_distance() {
        let a = Point3D::new(0.0, 0.0, 0.0);
        let b = Point3D::new(1.0, 2.0, 2.0);
        assert_eq!(a.sqr_distance(&b), 9.0);
        assert_eq!(a.distance(&b), 3.0);
    }

    #[test]
    fn test_cross_orthogonal() {
        let x = Point3D::new(1.0, 0.0, 0.0);
        let y = Point3D::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(&y), Point3D::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_switch_endian_involution() {
        let mut p = Point3D::new(1.5, -2.25, 1e9);
        let orig = p;
        p.switch_endian();
        assert_ne!(p, orig);
        p.switch_endian();
        assert_eq!(p, orig);
    }

    #[test]
    fn test_angle_degenerate() {
        let z = Point3D::ZERO;
        let x = Point3D::new(1.0, 0.0, 0.0);
        assert_eq!(z.angle(&x), 0.0);
        assert!((x.angle(&x)).abs() < 1e-6);
    }
}
