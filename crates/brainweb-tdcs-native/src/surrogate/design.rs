//! Quasi-random design generation
//!
//! Halton sequence in `[0, 1]^d`, dimension `i` using the `i`-th prime as
//! radix. The first `burn_in` points are skipped, `burn_in` being the
//! largest prime in use. A non-zero seed applies a Cranley-Patterson
//! rotation (a uniform shift modulo 1 per dimension) drawn from a ChaCha
//! stream, which keeps the marginals uniform.

use brainweb_tdcs_core::ConfigError;
use nalgebra::DMatrix;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Halton design generator
#[derive(Clone, Debug, PartialEq)]
pub struct HaltonDesign {
    primes: Vec<u64>,
    burn_in: u64,
    shifts: Vec<f64>,
}

impl HaltonDesign {
    /// Create a generator for `dimensions` dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for zero dimensions.
    pub fn new(dimensions: usize, seed: u64) -> Result<Self, ConfigError> {
        if dimensions == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "dimensions",
                reason: "design needs at least one dimension".to_string(),
            });
        }

        let primes = first_primes(dimensions);
        let burn_in = primes.iter().copied().max().unwrap_or(0);

        let shifts = if seed == 0 {
            vec![0.0; dimensions]
        } else {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..dimensions).map(|_| rng.gen::<f64>()).collect()
        };

        Ok(Self { primes, burn_in, shifts })
    }

    /// Number of dimensions
    pub fn dimensions(&self) -> usize {
        self.primes.len()
    }

    /// Radix of each dimension
    pub fn primes(&self) -> &[u64] {
        &self.primes
    }

    /// Generate `count` points as a `count × d` matrix.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyDesign`] when `count` is zero.
    pub fn sample(&self, count: usize) -> Result<DMatrix<f64>, ConfigError> {
        if count == 0 {
            return Err(ConfigError::EmptyDesign);
        }

        Ok(DMatrix::from_fn(count, self.dimensions(), |row, dim| {
            let index = self.burn_in + row as u64 + 1;
            let value = radical_inverse(index, self.primes[dim]) + self.shifts[dim];
            value.fract()
        }))
    }
}

/// Van der Corput radical inverse of `index` in `base`
fn radical_inverse(mut index: u64, base: u64) -> f64 {
    let inv_base = 1.0 / base as f64;
    let mut scale = inv_base;
    let mut value = 0.0;

    while index > 0 {
        value += (index % base) as f64 * scale;
        index /= base;
        scale *= inv_base;
    }

    value
}

/// First `n` primes by trial division
fn first_primes(n: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(n);
    let mut candidate = 2u64;

    while primes.len() < n {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }

    primes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_primes() {
        assert_eq!(first_primes(5), vec![2, 3, 5, 7, 11]);
    }

    #[test]
    fn test_radical_inverse() {
        assert_eq!(radical_inverse(1, 2), 0.5);
        assert_eq!(radical_inverse(2, 2), 0.25);
        assert_eq!(radical_inverse(3, 2), 0.75);
        assert!((radical_inverse(1, 3) - 1.0 / 3.0).abs() < 1e-15);
        assert!((radical_inverse(5, 3) - (2.0 / 3.0 + 1.0 / 9.0)).abs() < 1e-15);
    }

    #[test]
    fn test_unseeded_design_skips_burn_in() {
        let design = HaltonDesign::new(5, 0).unwrap();
        let points = design.sample(3).unwrap();
        // First point is index 12: 12 = 0b1100 -> 0.0011b = 0.1875
        assert_eq!(points[(0, 0)], 0.1875);
        // 12 = 110 in base 3 -> 0.011 = 1/9 + 1/27
        assert!((points[(0, 1)] - (1.0 / 9.0 + 1.0 / 27.0)).abs() < 1e-15);
        // 12 = 12 in base 11 -> 0.11 = 1/11 + 1/121
        assert!((points[(0, 4)] - (1.0 / 11.0 + 1.0 / 121.0)).abs() < 1e-15);
    }

    #[test]
    fn test_design_is_reproducible() {
        for seed in [0, 1234] {
            let a = HaltonDesign::new(5, seed).unwrap().sample(20).unwrap();
            let b = HaltonDesign::new(5, seed).unwrap().sample(20).unwrap();
            let bits = |m: &DMatrix<f64>| m.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
            assert_eq!(bits(&a), bits(&b));
        }
    }

    #[test]
    fn test_seed_changes_design() {
        let a = HaltonDesign::new(5, 1).unwrap().sample(8).unwrap();
        let b = HaltonDesign::new(5, 2).unwrap().sample(8).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_points_in_unit_cube_with_uniform_marginals() {
        let points = HaltonDesign::new(5, 99).unwrap().sample(512).unwrap();
        assert!(points.iter().all(|&v| (0.0..1.0).contains(&v)));
        for dim in 0..5 {
            let column = points.column(dim);
            let mean = column.mean();
            let below_half = column.iter().filter(|&&v| v < 0.5).count();
            assert!((mean - 0.5).abs() < 0.02, "dim {dim} mean {mean}");
            assert!((below_half as i64 - 256).abs() < 16, "dim {dim} {below_half}");
        }
    }

    #[test]
    fn test_zero_count_rejected() {
        let design = HaltonDesign::new(5, 0).unwrap();
        assert_eq!(design.sample(0), Err(ConfigError::EmptyDesign));
        assert!(HaltonDesign::new(0, 0).is_err());
    }
}
