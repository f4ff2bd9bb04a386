//! Axis-aligned bounding volume.
//!
//! A fresh cube starts in the "inverse" state (+inf lower bounds, -inf
//! upper bounds) so that unioning any point produces a valid degenerate
//! cube. The union of per-thread inverse-initialised cubes is the whole
//! reduction invariant; the parallel helpers below rely on exactly that.

use crate::point::Point3D;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Threshold beyond which a bound is considered suspicious for display
/// purposes. Data this large usually means a bad column mapping.
const BIG_BOUND: f32 = 1.0e7;

/// Axis-aligned interval product over x, y, z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundCube {
    min: Point3D,
    max: Point3D,
}

impl Default for BoundCube {
    fn default() -> Self {
        Self::inverse()
    }
}

impl BoundCube {
    /// The empty sentinel: every union partner wins on every axis.
    pub fn inverse() -> Self {
        Self {
            min: Point3D::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3D::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn from_corners(a: Point3D, b: Point3D) -> Self {
        Self {
            min: a.min(&b),
            max: a.max(&b),
        }
    }

    /// Bounds of a point slice, computed as a parallel reduction of
    /// per-thread inverse-initialised cubes.
    pub fn from_points(pts: &[Point3D]) -> Self {
        pts.par_iter()
            .fold(Self::inverse, |mut cube, p| {
                cube.union_point(p);
                cube
            })
            .reduce(Self::inverse, |mut a, b| {
                a.union_cube(&b);
                a
            })
    }

    /// True once at least one point has been unioned in.
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn union_point(&mut self, p: &Point3D) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union_cube(&mut self, other: &Self) {
        self.min = self.min.min(&other.min);
        self.max = self.max.max(&other.max);
    }

    pub fn contains(&self, p: &Point3D) -> bool {
        self.is_valid()
            && p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn centroid(&self) -> Point3D {
        (self.min + self.max) * 0.5
    }

    pub fn min_corner(&self) -> Point3D {
        self.min
    }

    pub fn max_corner(&self) -> Point3D {
        self.max
    }

    /// Extent along one axis (0, 1, 2 = x, y, z).
    pub fn size(&self, axis: usize) -> f32 {
        self.max[axis] - self.min[axis]
    }

    pub fn bound(&self, axis: usize, upper: bool) -> f32 {
        if upper {
            self.max[axis]
        } else {
            self.min[axis]
        }
    }

    /// All eight corners, min corner first.
    pub fn corners(&self) -> [Point3D; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Point3D::new(lo.x, lo.y, lo.z),
            Point3D::new(hi.x, lo.y, lo.z),
            Point3D::new(lo.x, hi.y, lo.z),
            Point3D::new(hi.x, hi.y, lo.z),
            Point3D::new(lo.x, lo.y, hi.z),
            Point3D::new(hi.x, lo.y, hi.z),
            Point3D::new(lo.x, hi.y, hi.z),
            Point3D::new(hi.x, hi.y, hi.z),
        ]
    }

    pub fn volume(&self) -> f32 {
        if !self.is_valid() {
            return 0.0;
        }
        self.size(0) * self.size(1) * self.size(2)
    }

    /// Grow symmetrically by `pad` on every axis.
    pub fn expand(&mut self, pad: f32) {
        let p = Point3D::new(pad, pad, pad);
        self.min -= p;
        self.max += p;
    }

    /// Squared distance from `p` to the nearest point of the cube; zero if
    /// contained. Used for k-d subtree pruning.
    pub fn sqr_distance_to(&self, p: &Point3D) -> f32 {
        let mut d = 0.0f32;
        for axis in 0..3 {
            let v = p[axis];
            if v < self.min[axis] {
                let t = self.min[axis] - v;
                d += t * t;
            } else if v > self.max[axis] {
                let t = v - self.max[axis];
                d += t * t;
            }
        }
        d
    }

    /// A sanity check for display: data far outside any physically
    /// plausible reconstruction volume.
    pub fn is_numerically_big(&self) -> bool {
        self.is_valid()
            && (0..3).any(|a| self.min[a].abs() > BIG_BOUND || self.max[a].abs() > BIG_BOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_is_invalid_until_union() {
        let mut c = BoundCube::inverse();
        assert!(!c.is_valid());
        c.union_point(&Point3D::new(1.0, 2.0, 3.0));
        assert!(c.is_valid());
        assert_eq!(c.centroid(), Point3D::new(1.0, 2.0, 3.0));
        assert_eq!(c.volume(), 0.0);
    }

    #[test]
    fn test_from_points_matches_serial_union() {
        let pts: Vec<Point3D> = (0..1000)
            .map(|i| Point3D::new(i as f32, -(i as f32), (i % 7) as f32))
            .collect();
        let par = BoundCube::from_points(&pts);
        let mut ser = BoundCube::inverse();
        for p in &pts {
            ser.union_point(p);
        }
        assert_eq!(par, ser);
    }

    #[test]
    fn test_contains_and_prune_distance() {
        let c = BoundCube::from_corners(Point3D::ZERO, Point3D::new(1.0, 1.0, 1.0));
        assert!(c.contains(&Point3D::new(0.5, 0.5, 0.5)));
        assert!(!c.contains(&Point3D::new(1.5, 0.5, 0.5)));
        assert_eq!(c.sqr_distance_to(&Point3D::new(0.5, 0.5, 0.5)), 0.0);
        assert_eq!(c.sqr_distance_to(&Point3D::new(2.0, 0.5, 0.5)), 1.0);
    }

    #[test]
    fn test_numerically_big() {
        let ok = BoundCube::from_corners(Point3D::ZERO, Point3D::new(100.0, 100.0, 100.0));
        assert!(!ok.is_numerically_big());
        let big = BoundCube::from_corners(Point3D::ZERO, Point3D::new(1.0e9, 1.0, 1.0));
        assert!(big.is_numerically_big());
    }
}
