//! Convex hull and the hull-distance point reduction.
//!
//! Pair statistics near a dataset's edge are biased low: neighbours past
//! the reconstruction boundary were never collected. The standard remedy
//! is to drop every source point within some distance of the convex hull
//! of the cloud before measuring. The hull here is an incremental
//! insertion hull; boundary distance for an interior point is taken as
//! the minimum face-plane distance, which is exact when the projection
//! lands on the face and conservative near edges.

use ionvue_core::Point3D;
use thiserror::Error;

const EPS: f32 = 1.0e-6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HullError {
    #[error("Too few points to build a hull")]
    TooFewPoints,

    #[error("Point set is degenerate (collinear or coplanar)")]
    Degenerate,
}

#[derive(Debug, Clone, Copy)]
struct Face {
    verts: [usize; 3],
    normal: Point3D,
    /// Plane offset: `normal . p = offset` on the face plane.
    offset: f32,
}

impl Face {
    fn new(points: &[Point3D], a: usize, b: usize, c: usize) -> Self {
        let normal = (points[b] - points[a])
            .cross(&(points[c] - points[a]))
            .normalised();
        Self {
            verts: [a, b, c],
            normal,
            offset: normal.dot(&points[a]),
        }
    }

    fn signed_distance(&self, p: &Point3D) -> f32 {
        self.normal.dot(p) - self.offset
    }
}

/// Convex hull of a point cloud, by incremental insertion.
#[derive(Debug, Clone)]
pub struct ConvexHull {
    faces: Vec<Face>,
}

impl ConvexHull {
    pub fn build(points: &[Point3D]) -> Result<Self, HullError> {
        if points.len() < 4 {
            return Err(HullError::TooFewPoints);
        }
        let seed = initial_tetrahedron(points)?;
        let mut faces = seed
            .into_iter()
            .map(|[a, b, c]| Face::new(points, a, b, c))
            .collect::<Vec<_>>();

        for p in 0..points.len() {
            insert_point(points, &mut faces, p);
        }
        Ok(Self { faces })
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Distance from an interior point to the hull boundary (minimum
    /// face-plane distance). Points outside the hull report 0.
    pub fn interior_distance(&self, p: &Point3D) -> f32 {
        let mut dist = f32::INFINITY;
        for face in &self.faces {
            let d = face.signed_distance(p);
            if d > EPS {
                return 0.0;
            }
            dist = dist.min(-d);
        }
        dist
    }

    pub fn contains(&self, p: &Point3D) -> bool {
        self.faces.iter().all(|f| f.signed_distance(p) <= EPS)
    }
}

/// Four seed faces of a non-degenerate tetrahedron, outward oriented.
fn initial_tetrahedron(points: &[Point3D]) -> Result<[[usize; 3]; 4], HullError> {
    // Two extremes along x (fall back to any separated pair).
    let mut i0 = 0;
    let mut i1 = 0;
    for (i, p) in points.iter().enumerate() {
        if p.x < points[i0].x {
            i0 = i;
        }
        if p.x > points[i1].x {
            i1 = i;
        }
    }
    if points[i0].sqr_distance(&points[i1]) < EPS {
        // Entire cloud may still spread on y/z; search any distant pair.
        i1 = (0..points.len())
            .max_by(|&a, &b| {
                points[i0]
                    .sqr_distance(&points[a])
                    .total_cmp(&points[i0].sqr_distance(&points[b]))
            })
            .expect("nonempty");
        if points[i0].sqr_distance(&points[i1]) < EPS {
            return Err(HullError::Degenerate);
        }
    }

    // Furthest from the line i0-i1.
    let dir = (points[i1] - points[i0]).normalised();
    let line_dist_sq = |p: &Point3D| {
        let v = *p - points[i0];
        let along = v.dot(&dir);
        v.sqr_magnitude() - along * along
    };
    let i2 = (0..points.len())
        .max_by(|&a, &b| line_dist_sq(&points[a]).total_cmp(&line_dist_sq(&points[b])))
        .expect("nonempty");
    if line_dist_sq(&points[i2]) < EPS {
        return Err(HullError::Degenerate);
    }

    // Furthest from the plane i0-i1-i2.
    let base = Face::new(points, i0, i1, i2);
    let i3 = (0..points.len())
        .max_by(|&a, &b| {
            base.signed_distance(&points[a])
                .abs()
                .total_cmp(&base.signed_distance(&points[b]).abs())
        })
        .expect("nonempty");
    let d3 = base.signed_distance(&points[i3]);
    if d3.abs() < EPS {
        return Err(HullError::Degenerate);
    }

    // Orient so every face looks away from the fourth vertex.
    let (a, b) = if d3 > 0.0 { (i1, i0) } else { (i0, i1) };
    Ok([
        [a, b, i2],
        [a, i2, i3],
        [i2, b, i3],
        [b, a, i3],
    ])
}

fn insert_point(points: &[Point3D], faces: &mut Vec<Face>, p: usize) {
    let visible: Vec<usize> = (0..faces.len())
        .filter(|&f| faces[f].signed_distance(&points[p]) > EPS)
        .collect();
    if visible.is_empty() {
        return;
    }

    // Horizon: directed edges of visible faces whose reverse edge is not
    // itself part of a visible face.
    let mut edges: Vec<(usize, usize)> = Vec::new();
    for &f in &visible {
        let [a, b, c] = faces[f].verts;
        edges.extend_from_slice(&[(a, b), (b, c), (c, a)]);
    }
    let horizon: Vec<(usize, usize)> = edges
        .iter()
        .copied()
        .filter(|&(u, v)| !edges.contains(&(v, u)))
        .collect();

    let mut keep: Vec<Face> = (0..faces.len())
        .filter(|f| !visible.contains(f))
        .map(|f| faces[f])
        .collect();
    for (u, v) in horizon {
        keep.push(Face::new(points, u, v, p));
    }
    *faces = keep;
}

/// Indices of the points further than `reduction_distance` inside the
/// hull of the whole cloud.
pub fn reduced_hull_points(
    points: &[Point3D],
    reduction_distance: f32,
) -> Result<Vec<usize>, HullError> {
    let hull = ConvexHull::build(points)?;
    Ok((0..points.len())
        .filter(|&i| hull.interior_distance(&points[i]) > reduction_distance)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube_with(extra: &[Point3D]) -> Vec<Point3D> {
        let mut pts = vec![
            Point3D::new(0.0, 0.0, 0.0),
            Point3D::new(1.0, 0.0, 0.0),
            Point3D::new(0.0, 1.0, 0.0),
            Point3D::new(1.0, 1.0, 0.0),
            Point3D::new(0.0, 0.0, 1.0),
            Point3D::new(1.0, 0.0, 1.0),
            Point3D::new(0.0, 1.0, 1.0),
            Point3D::new(1.0, 1.0, 1.0),
        ];
        pts.extend_from_slice(extra);
        pts
    }

    #[test]
    fn test_cube_hull_contains_centre() {
        let pts = unit_cube_with(&[]);
        let hull = ConvexHull::build(&pts).unwrap();
        assert!(hull.contains(&Point3D::new(0.5, 0.5, 0.5)));
        assert!(!hull.contains(&Point3D::new(1.5, 0.5, 0.5)));
        // Centre sits 0.5 from every face.
        let d = hull.interior_distance(&Point3D::new(0.5, 0.5, 0.5));
        assert!((d - 0.5).abs() < 1e-5, "{d}");
    }

    #[test]
    fn test_degenerate_sets_rejected() {
        let line: Vec<Point3D> = (0..10).map(|i| Point3D::new(i as f32, 0.0, 0.0)).collect();
        assert!(matches!(
            ConvexHull::build(&line),
            Err(HullError::Degenerate)
        ));
        let plane: Vec<Point3D> = (0..4)
            .flat_map(|x| (0..4).map(move |y| Point3D::new(x as f32, y as f32, 0.0)))
            .collect();
        assert!(ConvexHull::build(&plane).is_err());
        assert!(ConvexHull::build(&[Point3D::ZERO]).is_err());
    }

    #[test]
    fn test_reduction_drops_edge_points() {
        let centre = Point3D::new(0.5, 0.5, 0.5);
        let near_corner = Point3D::new(0.05, 0.05, 0.05);
        let pts = unit_cube_with(&[centre, near_corner]);
        let kept = reduced_hull_points(&pts, 0.2).unwrap();
        // Only the centre survives a 0.2 erosion of the unit cube.
        assert_eq!(kept, vec![8]);
    }
}
