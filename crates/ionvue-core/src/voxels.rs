//! Dense 3D scalar grid over a bounding cube.

use crate::bound_cube::BoundCube;
use crate::point::Point3D;
use serde::{Deserialize, Serialize};

/// A uniform grid of f32 cells covering `bounds`, x-major then y then z.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoxelGrid {
    dims: [usize; 3],
    bounds: BoundCube,
    data: Vec<f32>,
}

impl VoxelGrid {
    /// A zero-filled grid. Panics if any dimension is zero.
    pub fn new(dims: [usize; 3], bounds: BoundCube) -> Self {
        assert!(dims.iter().all(|&d| d > 0), "zero-sized voxel grid");
        Self {
            dims,
            bounds,
            data: vec![0.0; dims[0] * dims[1] * dims[2]],
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn bounds(&self) -> &BoundCube {
        &self.bounds
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Volume of a single cell.
    pub fn cell_volume(&self) -> f32 {
        (0..3)
            .map(|a| self.bounds.size(a) / self.dims[a] as f32)
            .product()
    }

    fn flat(&self, c: [usize; 3]) -> usize {
        (c[2] * self.dims[1] + c[1]) * self.dims[0] + c[0]
    }

    pub fn get(&self, c: [usize; 3]) -> f32 {
        self.data[self.flat(c)]
    }

    pub fn set(&mut self, c: [usize; 3], v: f32) {
        let i = self.flat(c);
        self.data[i] = v;
    }

    /// Cell containing `p`, or `None` when outside the bounds. The upper
    /// face of the last cell is inclusive, so boundary points count.
    pub fn cell_of(&self, p: &Point3D) -> Option<[usize; 3]> {
        if !self.bounds.contains(p) {
            return None;
        }
        let mut c = [0usize; 3];
        for axis in 0..3 {
            let span = self.bounds.size(axis);
            let t = if span == 0.0 {
                0.0
            } else {
                (p[axis] - self.bounds.bound(axis, false)) / span
            };
            c[axis] = ((t * self.dims[axis] as f32) as usize).min(self.dims[axis] - 1);
        }
        Some(c)
    }

    /// Count one hit into the cell containing `p`. Out-of-bound points are
    /// ignored.
    pub fn increment_at(&mut self, p: &Point3D) {
        if let Some(c) = self.cell_of(p) {
            let i = self.flat(c);
            self.data[i] += 1.0;
        }
    }

    /// Scale every cell.
    pub fn scale(&mut self, factor: f32) {
        for v in &mut self.data {
            *v *= factor;
        }
    }

    /// Cell-wise `self / other`, writing 0 where `other` is 0. Panics on
    /// mismatched dimensions.
    pub fn divide_by(&mut self, other: &Self) {
        assert_eq!(self.dims, other.dims, "voxel grid dimension mismatch");
        for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
            *a = if b == 0.0 { 0.0 } else { *a / b };
        }
    }

    pub fn max_value(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_grid(dims: [usize; 3]) -> VoxelGrid {
        VoxelGrid::new(
            dims,
            BoundCube::from_corners(Point3D::ZERO, Point3D::new(1.0, 1.0, 1.0)),
        )
    }

    #[test]
    fn test_cell_of_boundaries() {
        let g = unit_grid([2, 2, 2]);
        assert_eq!(g.cell_of(&Point3D::new(0.0, 0.0, 0.0)), Some([0, 0, 0]));
        assert_eq!(g.cell_of(&Point3D::new(1.0, 1.0, 1.0)), Some([1, 1, 1]));
        assert_eq!(g.cell_of(&Point3D::new(0.75, 0.25, 0.25)), Some([1, 0, 0]));
        assert_eq!(g.cell_of(&Point3D::new(2.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_increment_and_divide() {
        let mut num = unit_grid([2, 1, 1]);
        let mut den = unit_grid([2, 1, 1]);
        num.increment_at(&Point3D::new(0.1, 0.5, 0.5));
        num.increment_at(&Point3D::new(0.1, 0.5, 0.5));
        den.increment_at(&Point3D::new(0.1, 0.5, 0.5));
        num.divide_by(&den);
        assert_eq!(num.get([0, 0, 0]), 2.0);
        // denominator zero: quotient defined as zero
        assert_eq!(num.get([1, 0, 0]), 0.0);
    }

    #[test]
    fn test_cell_volume() {
        let g = unit_grid([2, 2, 2]);
        assert!((g.cell_volume() - 0.125).abs() < 1e-6);
    }
}
