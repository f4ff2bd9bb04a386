//! Nearest-neighbour and radial distance histograms.

use crate::kdtree::KdTree;
use ionvue_core::{BoundCube, CancelFlag, Point3D, RefreshError, Result, PROGRESS_CHUNK};

/// A binned distance distribution with a fixed bin width.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceHistogram {
    pub bin_width: f32,
    pub counts: Vec<u64>,
}

impl DistanceHistogram {
    fn new(bin_width: f32, bins: usize) -> Self {
        Self {
            bin_width,
            counts: vec![0; bins],
        }
    }

    fn record(&mut self, distance: f32) {
        if self.bin_width <= 0.0 {
            return;
        }
        let bin = (distance / self.bin_width) as usize;
        if let Some(c) = self.counts.get_mut(bin) {
            *c += 1;
        }
    }

    /// Bin centres paired with counts, ready for a plot series.
    pub fn xy(&self) -> Vec<(f32, f32)> {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &c)| ((i as f32 + 0.5) * self.bin_width, c as f32))
            .collect()
    }

    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

fn search_domain() -> BoundCube {
    BoundCube::from_corners(
        Point3D::new(f32::MIN, f32::MIN, f32::MIN),
        Point3D::new(f32::MAX, f32::MAX, f32::MAX),
    )
}

/// One histogram per neighbour rank 1..=`k_max`.
///
/// Each rank's bin width auto-scales to that rank's maximum observed
/// distance over `num_bins`. Source points with fewer than `k_max`
/// neighbours contribute the ranks they have.
pub fn nn_histograms(
    sources: &[Point3D],
    targets: &KdTree<'_>,
    k_max: usize,
    num_bins: usize,
    cancel: &CancelFlag,
) -> Result<Vec<DistanceHistogram>> {
    assert!(k_max > 0 && num_bins > 0);
    let domain = search_domain();

    // Gather per-rank distances first; widths depend on the maxima.
    let mut rank_distances: Vec<Vec<f32>> = vec![Vec::with_capacity(sources.len()); k_max];
    for (n, src) in sources.iter().enumerate() {
        // Exclude the query point itself when it is also a target.
        let neighbours = targets.find_k_nearest(src, &domain, k_max + 1);
        let mut rank = 0usize;
        for idx in neighbours {
            let d = src.sqr_distance(&targets.point(idx));
            if d <= f32::EPSILON {
                continue;
            }
            if rank < k_max {
                rank_distances[rank].push(d.sqrt());
                rank += 1;
            }
        }

        if n % PROGRESS_CHUNK == 0 && cancel.is_cancelled() {
            return Err(RefreshError::Aborted);
        }
    }

    let mut out = Vec::with_capacity(k_max);
    for distances in rank_distances {
        let max = distances.iter().copied().fold(0.0f32, f32::max);
        let width = if max > 0.0 {
            max / num_bins as f32
        } else {
            1.0
        };
        let mut hist = DistanceHistogram::new(width, num_bins);
        for d in distances {
            // The furthest observation lands in the last bin.
            let bin = ((d / width) as usize).min(num_bins - 1);
            hist.counts[bin] += 1;
        }
        out.push(hist);
    }
    Ok(out)
}

/// Single distance histogram on [0, `r_max`] over `num_bins`, counting
/// every target within `r_max` of each source.
///
/// Sources are independent, so the walk fans out over the rayon pool
/// with per-thread partial histograms merged at the end; workers observe
/// the shared abort flag every [`PROGRESS_CHUNK`] sources.
pub fn radial_histogram(
    sources: &[Point3D],
    targets: &KdTree<'_>,
    r_max: f32,
    num_bins: usize,
    cancel: &CancelFlag,
) -> Result<DistanceHistogram> {
    use rayon::prelude::*;

    assert!(r_max > 0.0 && num_bins > 0);
    let domain = search_domain();
    let r_max_sq = r_max * r_max;
    let bin_width = r_max / num_bins as f32;
    let polled = std::sync::atomic::AtomicUsize::new(0);

    sources
        .par_iter()
        .try_fold(
            || DistanceHistogram::new(bin_width, num_bins),
            |mut hist, src| {
                let n = polled.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                if n % PROGRESS_CHUNK == 0 && cancel.is_cancelled() {
                    return Err(RefreshError::Aborted);
                }
                // Walk successive neighbours until past the radius cap.
                let mut dead = 0.0f32;
                while let Some(idx) = targets.find_nearest(src, &domain, dead) {
                    let d_sq = src.sqr_distance(&targets.point(idx));
                    if d_sq > r_max_sq {
                        break;
                    }
                    if d_sq > f32::EPSILON {
                        hist.record(d_sq.sqrt());
                    }
                    dead = d_sq;
                }
                Ok(hist)
            },
        )
        .try_reduce(
            || DistanceHistogram::new(bin_width, num_bins),
            |mut a, b| {
                for (ac, bc) in a.counts.iter_mut().zip(&b.counts) {
                    *ac += bc;
                }
                Ok(a)
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_point_nn_histogram() {
        let pts = vec![Point3D::new(0.0, 0.0, 0.0), Point3D::new(0.0, 0.0, 1.0)];
        let tree = KdTree::build(&pts);
        let hists = nn_histograms(&pts, &tree, 1, 10, &CancelFlag::new()).unwrap();
        assert_eq!(hists.len(), 1);
        // Both points see one neighbour at distance 1.
        assert_eq!(hists[0].total(), 2);
        assert!(hists[0].max_count() > 0);
        assert_eq!(*hists[0].counts.last().unwrap(), 2);
    }

    #[test]
    fn test_radial_histogram_counts_pairs_in_range() {
        let pts = vec![Point3D::new(0.0, 0.0, 0.0), Point3D::new(0.0, 0.0, 1.0)];
        let tree = KdTree::build(&pts);
        let hist = radial_histogram(&pts, &tree, 2.0, 8, &CancelFlag::new()).unwrap();
        assert!(hist.total() > 0);
        // distance 1.0 lands in bin 4 of 8 over [0,2)
        assert_eq!(hist.counts[4], 2);
    }

    #[test]
    fn test_radial_histogram_ignores_far_targets() {
        let pts = vec![Point3D::new(0.0, 0.0, 0.0), Point3D::new(0.0, 0.0, 50.0)];
        let tree = KdTree::build(&pts);
        let hist = radial_histogram(&pts, &tree, 2.0, 8, &CancelFlag::new()).unwrap();
        assert_eq!(hist.total(), 0);
    }
}
