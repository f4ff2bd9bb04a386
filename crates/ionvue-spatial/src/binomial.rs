//! Binomial frequency-distribution statistics.
//!
//! The standard randomness test for a solid solution: partition the
//! dataset into equal-count blocks, count one species per block, and
//! compare the observed block-count distribution with the binomial
//! expected under random mixing. A chi-squared statistic summarises the
//! departure; clustering inflates the tails.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BinomialError {
    #[error("Block size must be positive")]
    BadBlockSize,

    #[error("Not enough observations to form a single block")]
    TooFewObservations,
}

/// Observed-versus-expected comparison for one species.
#[derive(Debug, Clone, PartialEq)]
pub struct BinomialComparison {
    /// Ions per block used for the partition.
    pub block_size: usize,
    /// Overall species concentration across all blocks.
    pub concentration: f64,
    /// Observed number of blocks holding k species ions, k = 0..=n.
    pub observed: Vec<u64>,
    /// Expected block counts under the binomial at `concentration`.
    pub expected: Vec<f64>,
    /// Pearson chi-squared over bins with non-negligible expectation.
    pub chi_squared: f64,
    /// Degrees of freedom used for the statistic.
    pub degrees_of_freedom: usize,
}

/// Binomial probability mass `P(k; n, p)` computed in log space to stay
/// finite for large block sizes.
fn binomial_pmf(n: usize, k: usize, p: f64) -> f64 {
    if p <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    if p >= 1.0 {
        return if k == n { 1.0 } else { 0.0 };
    }
    let ln_choose = ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k);
    (ln_choose + k as f64 * p.ln() + (n - k) as f64 * (1.0 - p).ln()).exp()
}

fn ln_factorial(n: usize) -> f64 {
    (1..=n).map(|i| (i as f64).ln()).sum()
}

/// Run the comparison over a species-membership sequence.
///
/// `is_species` marks, in dataset order, whether each ion belongs to the
/// species under test. Consecutive runs of `block_size` ions form the
/// blocks; the trailing partial block is discarded.
pub fn binomial_comparison(
    is_species: &[bool],
    block_size: usize,
) -> Result<BinomialComparison, BinomialError> {
    if block_size == 0 {
        return Err(BinomialError::BadBlockSize);
    }
    let num_blocks = is_species.len() / block_size;
    if num_blocks == 0 {
        return Err(BinomialError::TooFewObservations);
    }

    let mut observed = vec![0u64; block_size + 1];
    let mut species_total = 0u64;
    for block in is_species.chunks_exact(block_size) {
        let k = block.iter().filter(|&&s| s).count();
        observed[k] += 1;
        species_total += k as u64;
    }
    let concentration = species_total as f64 / (num_blocks * block_size) as f64;

    let expected: Vec<f64> = (0..=block_size)
        .map(|k| num_blocks as f64 * binomial_pmf(block_size, k, concentration))
        .collect();

    // Pearson statistic over bins where the expectation is not
    // vanishingly small, the usual validity guard.
    const MIN_EXPECTED: f64 = 1.0e-3;
    let mut chi_squared = 0.0;
    let mut used_bins = 0usize;
    for (obs, exp) in observed.iter().zip(&expected) {
        if *exp < MIN_EXPECTED {
            continue;
        }
        let diff = *obs as f64 - exp;
        chi_squared += diff * diff / exp;
        used_bins += 1;
    }
    // One constraint for the total, one for the fitted concentration.
    let degrees_of_freedom = used_bins.saturating_sub(2);

    Ok(BinomialComparison {
        block_size,
        concentration,
        observed,
        expected,
        chi_squared,
        degrees_of_freedom,
    })
}

impl BinomialComparison {
    /// Reduced chi-squared; near 1 for a random solid solution, rising
    /// with clustering.
    pub fn reduced_chi_squared(&self) -> f64 {
        if self.degrees_of_freedom == 0 {
            return 0.0;
        }
        self.chi_squared / self.degrees_of_freedom as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pmf_sums_to_one() {
        let total: f64 = (0..=20).map(|k| binomial_pmf(20, k, 0.3)).sum();
        assert!((total - 1.0).abs() < 1e-9, "{total}");
    }

    #[test]
    fn test_pmf_degenerate_probabilities() {
        assert_eq!(binomial_pmf(10, 0, 0.0), 1.0);
        assert_eq!(binomial_pmf(10, 3, 0.0), 0.0);
        assert_eq!(binomial_pmf(10, 10, 1.0), 1.0);
    }

    #[test]
    fn test_alternating_sequence_is_unbinomially_narrow() {
        // A perfectly alternating membership has zero variance between
        // blocks: every block of 10 holds exactly 5. The chi-squared
        // must see that as a departure from binomial breadth.
        let seq: Vec<bool> = (0..1000).map(|i| i % 2 == 0).collect();
        let cmp = binomial_comparison(&seq, 10).unwrap();
        assert!((cmp.concentration - 0.5).abs() < 1e-9);
        assert_eq!(cmp.observed[5], 100);
        assert!(cmp.observed.iter().take(5).all(|&c| c == 0));
        assert!(cmp.reduced_chi_squared() > 1.0);
    }

    #[test]
    fn test_segregated_sequence_has_heavy_tails() {
        // Fully segregated: first half all species, second half none.
        let mut seq = vec![true; 500];
        seq.extend(vec![false; 500]);
        let cmp = binomial_comparison(&seq, 10).unwrap();
        assert_eq!(cmp.observed[10], 50);
        assert_eq!(cmp.observed[0], 50);
        assert!(cmp.reduced_chi_squared() > 10.0);
    }

    #[test]
    fn test_guards() {
        assert_eq!(
            binomial_comparison(&[true], 0),
            Err(BinomialError::BadBlockSize)
        );
        assert_eq!(
            binomial_comparison(&[true; 5], 10),
            Err(BinomialError::TooFewObservations)
        );
    }
}
