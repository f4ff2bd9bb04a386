//! Uniform sampling without replacement, with cancellation polling.

use crate::error::{RefreshError, Result};
use crate::progress::{CancelFlag, PROGRESS_CHUNK};
use rand::prelude::*;
use std::collections::BTreeSet;

/// Pick `count` unique indices uniformly from `0..max`, sorted ascending.
///
/// Sorted output keeps the subsequent seek-reads moving forward through
/// the file. For small draws a rejection set is cheapest; when asked for
/// more than half the population it is cheaper to draw the complement.
/// The cancel flag is polled roughly every [`PROGRESS_CHUNK`] draws.
pub fn random_unique_indices(
    count: usize,
    max: usize,
    rng: &mut StdRng,
    cancel: &CancelFlag,
) -> Result<Vec<usize>> {
    assert!(count <= max, "sample larger than population");

    if count == max {
        return Ok((0..max).collect());
    }

    let invert = count > max / 2;
    let draw = if invert { max - count } else { count };

    let mut chosen = BTreeSet::new();
    let mut polls = 0usize;
    while chosen.len() < draw {
        chosen.insert(rng.gen_range(0..max));

        polls += 1;
        if polls % PROGRESS_CHUNK == 0 && cancel.is_cancelled() {
            return Err(RefreshError::Aborted);
        }
    }

    let out: Vec<usize> = if invert {
        (0..max).filter(|i| !chosen.contains(i)).collect()
    } else {
        chosen.into_iter().collect()
    };
    Ok(out)
}

/// Fisher–Yates shuffle with periodic cancellation polling.
pub fn shuffle_cancellable<T>(data: &mut [T], rng: &mut StdRng, cancel: &CancelFlag) -> Result<()> {
    for i in (1..data.len()).rev() {
        data.swap(i, rng.gen_range(0..=i));
        if i % PROGRESS_CHUNK == 0 && cancel.is_cancelled() {
            return Err(RefreshError::Aborted);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_indices_unique_sorted_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let cancel = CancelFlag::new();
        for &(count, max) in &[(10usize, 1000usize), (900, 1000), (0, 5), (5, 5)] {
            let idx = random_unique_indices(count, max, &mut rng, &cancel).unwrap();
            assert_eq!(idx.len(), count);
            assert!(idx.windows(2).all(|w| w[0] < w[1]));
            assert!(idx.iter().all(|&i| i < max));
        }
    }

    #[test]
    fn test_shuffle_preserves_multiset() {
        let mut rng = StdRng::seed_from_u64(3);
        let cancel = CancelFlag::new();
        let mut v: Vec<u32> = (0..100).collect();
        shuffle_cancellable(&mut v, &mut rng, &cancel).unwrap();
        let mut sorted = v.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..100).collect::<Vec<_>>());
    }
}
