//! Static 3D k-d tree over a borrowed point buffer.
//!
//! The tree stores indices only; point coordinates stay in the caller's
//! buffer. Build is a median split cycling the x, y, z axes. Queries take
//! a domain cube that narrows the search, and a dead squared distance
//! that excludes points at or nearer than it, which is how callers walk
//! successive neighbours with repeated `find_nearest` calls.

use ionvue_core::{BoundCube, CancelFlag, Point3D, RefreshError, Result, PROGRESS_CHUNK};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy)]
struct Node {
    /// Index into the borrowed point buffer.
    point: u32,
    left: Option<u32>,
    right: Option<u32>,
    /// Bounds of every point in this subtree, for pruning.
    bounds: BoundCube,
}

/// Max-heap entry: furthest current neighbour on top.
struct HeapEntry {
    dist_sq: f32,
    index: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.dist_sq == other.dist_sq
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist_sq.total_cmp(&other.dist_sq)
    }
}

pub struct KdTree<'a> {
    points: &'a [Point3D],
    nodes: Vec<Node>,
    root: Option<u32>,
}

impl<'a> KdTree<'a> {
    /// Build over `points`. The buffer must outlive the tree and is never
    /// copied.
    pub fn build(points: &'a [Point3D]) -> Self {
        Self::build_cancellable(points, &CancelFlag::new()).expect("uncancellable build")
    }

    /// Build with cancellation polling roughly every [`PROGRESS_CHUNK`]
    /// comparisons.
    pub fn build_cancellable(points: &'a [Point3D], cancel: &CancelFlag) -> Result<Self> {
        let mut indices: Vec<u32> = (0..points.len() as u32).collect();
        let mut tree = Self {
            points,
            nodes: Vec::with_capacity(points.len()),
            root: None,
        };
        let mut since_poll = 0usize;
        tree.root = tree.build_recursive(&mut indices, 0, cancel, &mut since_poll)?;
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Coordinates behind a query result index.
    pub fn point(&self, index: usize) -> Point3D {
        self.points[index]
    }

    fn build_recursive(
        &mut self,
        indices: &mut [u32],
        depth: usize,
        cancel: &CancelFlag,
        since_poll: &mut usize,
    ) -> Result<Option<u32>> {
        if indices.is_empty() {
            return Ok(None);
        }
        *since_poll += indices.len();
        if *since_poll >= PROGRESS_CHUNK {
            *since_poll = 0;
            if cancel.is_cancelled() {
                return Err(RefreshError::Aborted);
            }
        }

        let axis = depth % 3;
        let mid = indices.len() / 2;
        let points = self.points;
        indices.select_nth_unstable_by(mid, |&a, &b| {
            points[a as usize][axis].total_cmp(&points[b as usize][axis])
        });

        let mut bounds = BoundCube::inverse();
        for &i in indices.iter() {
            bounds.union_point(&points[i as usize]);
        }

        let point = indices[mid];
        let (lo, rest) = indices.split_at_mut(mid);
        let hi = &mut rest[1..];
        let left = self.build_recursive(lo, depth + 1, cancel, since_poll)?;
        let right = self.build_recursive(hi, depth + 1, cancel, since_poll)?;

        self.nodes.push(Node {
            point,
            left,
            right,
            bounds,
        });
        Ok(Some(self.nodes.len() as u32 - 1))
    }

    /// Nearest point to `q` inside `domain`, strictly further than
    /// `dead_dist_sq`. Returns an index into the point buffer.
    pub fn find_nearest(
        &self,
        q: &Point3D,
        domain: &BoundCube,
        dead_dist_sq: f32,
    ) -> Option<usize> {
        let mut best: Option<(f32, usize)> = None;
        if let Some(root) = self.root {
            self.nearest_recursive(root, q, domain, dead_dist_sq, &mut best);
        }
        best.map(|(_, i)| i)
    }

    fn nearest_recursive(
        &self,
        node_id: u32,
        q: &Point3D,
        domain: &BoundCube,
        dead_dist_sq: f32,
        best: &mut Option<(f32, usize)>,
    ) {
        let node = &self.nodes[node_id as usize];

        // Prune: subtree entirely further than the current best, or
        // entirely outside the domain.
        let lower = node.bounds.sqr_distance_to(q);
        if let Some((best_d, _)) = best {
            if lower >= *best_d {
                return;
            }
        }
        if !cubes_intersect(&node.bounds, domain) {
            return;
        }

        let p = &self.points[node.point as usize];
        let d = q.sqr_distance(p);
        if d > dead_dist_sq && domain.contains(p) && best.map_or(true, |(bd, _)| d < bd) {
            *best = Some((d, node.point as usize));
        }

        // Descend nearer child first.
        let children = match (node.left, node.right) {
            (Some(l), Some(r)) => {
                let dl = self.nodes[l as usize].bounds.sqr_distance_to(q);
                let dr = self.nodes[r as usize].bounds.sqr_distance_to(q);
                if dl <= dr {
                    [Some(l), Some(r)]
                } else {
                    [Some(r), Some(l)]
                }
            }
            (l, r) => [l, r],
        };
        for child in children.into_iter().flatten() {
            self.nearest_recursive(child, q, domain, dead_dist_sq, best);
        }
    }

    /// The `k` nearest points to `q` inside `domain`, nearest first and
    /// furthest last. Fewer than `k` results when the domain runs dry.
    pub fn find_k_nearest(&self, q: &Point3D, domain: &BoundCube, k: usize) -> Vec<usize> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(k + 1);
        if let Some(root) = self.root {
            self.knn_recursive(root, q, domain, k, &mut heap);
        }
        let mut out: Vec<HeapEntry> = heap.into_vec();
        out.sort_by(|a, b| a.dist_sq.total_cmp(&b.dist_sq));
        out.into_iter().map(|e| e.index).collect()
    }

    fn knn_recursive(
        &self,
        node_id: u32,
        q: &Point3D,
        domain: &BoundCube,
        k: usize,
        heap: &mut BinaryHeap<HeapEntry>,
    ) {
        let node = &self.nodes[node_id as usize];

        let lower = node.bounds.sqr_distance_to(q);
        if heap.len() == k && lower >= heap.peek().expect("nonempty").dist_sq {
            return;
        }
        if !cubes_intersect(&node.bounds, domain) {
            return;
        }

        let p = &self.points[node.point as usize];
        if domain.contains(p) {
            let d = q.sqr_distance(p);
            if heap.len() < k {
                heap.push(HeapEntry {
                    dist_sq: d,
                    index: node.point as usize,
                });
            } else if d < heap.peek().expect("nonempty").dist_sq {
                heap.pop();
                heap.push(HeapEntry {
                    dist_sq: d,
                    index: node.point as usize,
                });
            }
        }

        let children = match (node.left, node.right) {
            (Some(l), Some(r)) => {
                let dl = self.nodes[l as usize].bounds.sqr_distance_to(q);
                let dr = self.nodes[r as usize].bounds.sqr_distance_to(q);
                if dl <= dr {
                    [Some(l), Some(r)]
                } else {
                    [Some(r), Some(l)]
                }
            }
            (l, r) => [l, r],
        };
        for child in children.into_iter().flatten() {
            self.knn_recursive(child, q, domain, k, heap);
        }
    }
}

fn cubes_intersect(a: &BoundCube, b: &BoundCube) -> bool {
    a.is_valid()
        && b.is_valid()
        && (0..3).all(|axis| {
            a.bound(axis, false) <= b.bound(axis, true)
                && b.bound(axis, false) <= a.bound(axis, true)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn everything() -> BoundCube {
        BoundCube::from_corners(
            Point3D::new(-1e9, -1e9, -1e9),
            Point3D::new(1e9, 1e9, 1e9),
        )
    }

    fn grid_points() -> Vec<Point3D> {
        let mut pts = Vec::new();
        for x in 0..5 {
            for y in 0..5 {
                for z in 0..5 {
                    pts.push(Point3D::new(x as f32, y as f32, z as f32));
                }
            }
        }
        pts
    }

    #[test]
    fn test_nearest_excludes_dead_distance() {
        let pts = grid_points();
        let tree = KdTree::build(&pts);
        let q = Point3D::new(0.1, 0.0, 0.0);

        let first = tree.find_nearest(&q, &everything(), 0.0).unwrap();
        assert_eq!(pts[first], Point3D::new(0.0, 0.0, 0.0));

        // Exclude the first neighbour; next is (1,0,0).
        let d1 = q.sqr_distance(&pts[first]);
        let second = tree.find_nearest(&q, &everything(), d1).unwrap();
        assert_eq!(pts[second], Point3D::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_knn_matches_brute_force() {
        let pts = grid_points();
        let tree = KdTree::build(&pts);
        let q = Point3D::new(2.2, 1.9, 2.4);

        let got = tree.find_k_nearest(&q, &everything(), 7);
        assert_eq!(got.len(), 7);

        let mut brute: Vec<usize> = (0..pts.len()).collect();
        brute.sort_by(|&a, &b| q.sqr_distance(&pts[a]).total_cmp(&q.sqr_distance(&pts[b])));
        let want: Vec<f32> = brute[..7].iter().map(|&i| q.sqr_distance(&pts[i])).collect();
        let have: Vec<f32> = got.iter().map(|&i| q.sqr_distance(&pts[i])).collect();
        assert_eq!(have, want);
        // furthest last
        assert!(have.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_domain_restricts_results() {
        let pts = grid_points();
        let tree = KdTree::build(&pts);
        let domain =
            BoundCube::from_corners(Point3D::new(3.0, 0.0, 0.0), Point3D::new(4.0, 4.0, 4.0));
        let q = Point3D::new(0.0, 0.0, 0.0);

        let nearest = tree.find_nearest(&q, &domain, 0.0).unwrap();
        assert_eq!(pts[nearest], Point3D::new(3.0, 0.0, 0.0));

        // Domain holds only 2 of 125 columns: 50 points.
        let knn = tree.find_k_nearest(&q, &domain, 200);
        assert_eq!(knn.len(), 50);
        assert!(knn.iter().all(|&i| pts[i].x >= 3.0));
    }

    #[test]
    fn test_empty_and_single() {
        let pts: Vec<Point3D> = Vec::new();
        let tree = KdTree::build(&pts);
        assert!(tree.find_nearest(&Point3D::ZERO, &everything(), 0.0).is_none());

        let one = vec![Point3D::new(1.0, 1.0, 1.0)];
        let tree = KdTree::build(&one);
        assert_eq!(tree.find_nearest(&Point3D::ZERO, &everything(), 0.0), Some(0));
        assert_eq!(tree.find_k_nearest(&Point3D::ZERO, &everything(), 5), vec![0]);
    }

    #[test]
    fn test_cancelled_build_aborts() {
        let pts = vec![Point3D::ZERO; 20000];
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert_eq!(
            KdTree::build_cancellable(&pts, &cancel).err(),
            Some(RefreshError::Aborted)
        );
    }
}
