//! The atomic record of every dataset: a reconstructed ion position plus
//! its mass-to-charge value.

use crate::bound_cube::BoundCube;
use crate::point::Point3D;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Serialised size of one ion record: four big-endian IEEE-754 floats.
pub const ION_RECORD_SIZE: usize = 16;

/// One detected ion: position in nanometres, mass-to-charge in amu/e.
///
/// Invariant: an `IonHit` handed out by any loader contains no NaN in any
/// field. The loaders enforce this; everything downstream relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IonHit {
    pub pos: Point3D,
    pub mass_to_charge: f32,
}

impl IonHit {
    pub fn new(pos: Point3D, mass_to_charge: f32) -> Self {
        Self {
            pos,
            mass_to_charge,
        }
    }

    pub fn has_nan(&self) -> bool {
        self.pos.is_nan() || self.mass_to_charge.is_nan()
    }

    /// Reverse the byte order of every field in place.
    pub fn switch_endian(&mut self) {
        self.pos.switch_endian();
        self.mass_to_charge = f32::from_bits(self.mass_to_charge.to_bits().swap_bytes());
    }

    /// Build from four host-endian floats in x, y, z, m/c order.
    pub fn from_floats(v: [f32; 4]) -> Self {
        Self {
            pos: Point3D::new(v[0], v[1], v[2]),
            mass_to_charge: v[3],
        }
    }

    /// The on-disk big-endian record.
    pub fn to_be_bytes(&self) -> [u8; ION_RECORD_SIZE] {
        let mut out = [0u8; ION_RECORD_SIZE];
        out[0..4].copy_from_slice(&self.pos.x.to_be_bytes());
        out[4..8].copy_from_slice(&self.pos.y.to_be_bytes());
        out[8..12].copy_from_slice(&self.pos.z.to_be_bytes());
        out[12..16].copy_from_slice(&self.mass_to_charge.to_be_bytes());
        out
    }

    /// Decode one big-endian on-disk record.
    pub fn from_be_bytes(b: &[u8; ION_RECORD_SIZE]) -> Self {
        Self {
            pos: Point3D::new(
                f32::from_be_bytes([b[0], b[1], b[2], b[3]]),
                f32::from_be_bytes([b[4], b[5], b[6], b[7]]),
                f32::from_be_bytes([b[8], b[9], b[10], b[11]]),
            ),
            mass_to_charge: f32::from_be_bytes([b[12], b[13], b[14], b[15]]),
        }
    }
}

/// Bounds of an ion slice, as a parallel union of per-thread partial cubes.
pub fn bound_cube_of(ions: &[IonHit]) -> BoundCube {
    ions.par_iter()
        .fold(BoundCube::inverse, |mut cube, ion| {
            cube.union_point(&ion.pos);
            cube
        })
        .reduce(BoundCube::inverse, |mut a, b| {
            a.union_cube(&b);
            a
        })
}

/// Centre of mass of an ion slice (unweighted mean position).
pub fn mass_centre_of(ions: &[IonHit]) -> Point3D {
    if ions.is_empty() {
        return Point3D::ZERO;
    }
    let sum = ions
        .par_iter()
        .fold(|| Point3D::ZERO, |acc, ion| acc + ion.pos)
        .reduce(|| Point3D::ZERO, |a, b| a + b);
    sum * (1.0 / ions.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trip() {
        let hit = IonHit::new(Point3D::new(1.0, -2.5, 3.25), 58.93);
        let bytes = hit.to_be_bytes();
        assert_eq!(IonHit::from_be_bytes(&bytes), hit);
    }

    #[test]
    fn test_be_bytes_are_big_endian() {
        let hit = IonHit::new(Point3D::new(1.0, 0.0, 0.0), 0.0);
        // 1.0f32 is 0x3f800000
        assert_eq!(&hit.to_be_bytes()[0..4], &[0x3f, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn test_nan_detection() {
        let mut hit = IonHit::new(Point3D::new(0.0, 0.0, 0.0), f32::NAN);
        assert!(hit.has_nan());
        hit.mass_to_charge = 1.0;
        assert!(!hit.has_nan());
    }

    #[test]
    fn test_mass_centre() {
        let ions = vec![
            IonHit::new(Point3D::new(0.0, 0.0, 0.0), 1.0),
            IonHit::new(Point3D::new(2.0, 4.0, 6.0), 1.0),
        ];
        assert_eq!(mass_centre_of(&ions), Point3D::new(1.0, 2.0, 3.0));
    }
}
