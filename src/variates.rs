//! Deterministic variate generation.
//!
//! Every variate is parameterized by a 64-bit hash value (see [`crate::hash`])
//! that uniquely names the decision being made. The hash seeds a ChaCha8
//! stream, and the requested distribution is sampled from that stream, so the
//! same `(hash, parameters)` pair yields the same variate on every process.
//!
//! Generation code never touches an entropy source; there is no other way to
//! obtain an RNG in this crate.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Binomial, Distribution, Geometric, Hypergeometric};

/// A ChaCha8 stream pinned to a hash value.
///
/// Used where a leaf draws several values from one decision coordinate (leaf
/// edge sampling, in-cell point coordinates). Single-draw call sites use the
/// free functions below.
#[derive(Debug, Clone)]
pub struct HashRng(ChaCha8Rng);

impl HashRng {
    #[must_use]
    pub fn new(h: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(h))
    }

    /// Uniform integer in `[0, n)`. `n` must be nonzero.
    #[must_use]
    pub fn below(&mut self, n: u64) -> u64 {
        debug_assert!(n > 0);
        self.0.random_range(0..n)
    }

    /// Uniform draw from the unit interval `[0, 1)`.
    #[must_use]
    pub fn unit(&mut self) -> f64 {
        self.0.random()
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.0
    }
}

/// Uniform integer in `[0, n)` for the decision named by `h`.
#[must_use]
pub fn uniform(h: u64, n: u64) -> u64 {
    HashRng::new(h).below(n)
}

/// Bernoulli trial with success probability `p` for the decision named by `h`.
#[must_use]
pub fn bernoulli(h: u64, p: f64) -> bool {
    if p <= 0.0 {
        return false;
    }
    if p >= 1.0 {
        return true;
    }
    HashRng::new(h).unit() < p
}

/// `Binomial(n, p)` variate for the decision named by `h`.
#[must_use]
pub fn binomial(h: u64, n: u64, p: f64) -> u64 {
    if n == 0 || p <= 0.0 {
        return 0;
    }
    if p >= 1.0 {
        return n;
    }
    // Parameters are range-checked above, so construction cannot fail.
    let dist = Binomial::new(n, p).unwrap();
    dist.sample(HashRng::new(h).rng())
}

/// Hypergeometric variate: the number of marked items among `draws` drawn
/// without replacement from a population of `total` containing `marked`
/// marked items. Caller guarantees `marked <= total` and `draws <= total`.
#[must_use]
pub fn hypergeometric(h: u64, total: u64, marked: u64, draws: u64) -> u64 {
    debug_assert!(marked <= total && draws <= total);
    if total == 0 || marked == 0 || draws == 0 {
        return 0;
    }
    if marked == total {
        return draws;
    }
    if draws == total {
        return marked;
    }
    let dist = Hypergeometric::new(total, marked, draws).unwrap();
    dist.sample(HashRng::new(h).rng())
}

/// Enumerate the Bernoulli(`p`) subset of `[0, universe)` by geometric skips,
/// as one stream seeded by `h`. Calls `visit` on each selected index in
/// ascending order.
pub fn skip_sample<F: FnMut(u64)>(h: u64, universe: u64, p: f64, mut visit: F) {
    if universe == 0 || p <= 0.0 {
        return;
    }
    if p >= 1.0 {
        for i in 0..universe {
            visit(i);
        }
        return;
    }
    let mut rng = HashRng::new(h);
    let dist = Geometric::new(p).unwrap();
    let mut next = dist.sample(rng.rng());
    while next < universe {
        visit(next);
        // Skip the geometric number of failures past the current success.
        let skip = dist.sample(rng.rng());
        match next.checked_add(1).and_then(|n| n.checked_add(skip)) {
            Some(n) => next = n,
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variates_are_reproducible() {
        assert_eq!(uniform(42, 1000), uniform(42, 1000));
        assert_eq!(binomial(42, 1000, 0.3), binomial(42, 1000, 0.3));
        assert_eq!(
            hypergeometric(42, 1000, 400, 100),
            hypergeometric(42, 1000, 400, 100)
        );
    }

    #[test]
    fn degenerate_parameters() {
        assert_eq!(binomial(1, 0, 0.5), 0);
        assert_eq!(binomial(1, 10, 0.0), 0);
        assert_eq!(binomial(1, 10, 1.0), 10);
        assert_eq!(hypergeometric(1, 10, 10, 4), 4);
        assert_eq!(hypergeometric(1, 10, 4, 10), 4);
        assert_eq!(hypergeometric(1, 0, 0, 0), 0);
        assert!(!bernoulli(1, 0.0));
        assert!(bernoulli(1, 1.0));
    }

    #[test]
    fn binomial_mean_is_plausible() {
        let n = 10_000u64;
        let p = 0.25;
        let mean: f64 = (0..200)
            .map(|i| binomial(crate::hash::hash1(7, i), n, p) as f64)
            .sum::<f64>()
            / 200.0;
        let expected = n as f64 * p;
        // 3 sigma over 200 trials of B(10_000, 0.25).
        let sigma = (n as f64 * p * (1.0 - p)).sqrt() / (200f64).sqrt();
        assert!(
            (mean - expected).abs() < 3.0 * sigma,
            "mean {mean} too far from {expected}"
        );
    }

    #[test]
    fn hypergeometric_respects_bounds() {
        for i in 0..100u64 {
            let v = hypergeometric(crate::hash::hash1(3, i), 50, 20, 10);
            assert!(v <= 10);
            assert!(v <= 20);
        }
    }

    #[test]
    fn skip_sample_full_and_empty() {
        let mut hits = Vec::new();
        skip_sample(1, 10, 1.0, |i| hits.push(i));
        assert_eq!(hits, (0..10).collect::<Vec<_>>());

        hits.clear();
        skip_sample(1, 10, 0.0, |i| hits.push(i));
        assert!(hits.is_empty());
    }

    #[test]
    fn skip_sample_is_sorted_and_distinct() {
        let mut hits = Vec::new();
        skip_sample(99, 100_000, 0.01, |i| hits.push(i));
        assert!(hits.windows(2).all(|w| w[0] < w[1]));
        assert!(!hits.is_empty());
    }

    #[test]
    fn skip_sample_density_is_plausible() {
        let mut count = 0u64;
        for s in 0..50u64 {
            skip_sample(crate::hash::hash1(11, s), 10_000, 0.1, |_| count += 1);
        }
        let mean = count as f64 / 50.0;
        assert!((mean - 1000.0).abs() < 100.0, "mean {mean}");
    }
}
