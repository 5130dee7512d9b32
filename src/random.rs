//! The uniform random stream consumed by weight initialization and input
//! corruption.

use rand::{Rng, RngCore};

/// A source of uniformly distributed values.
///
/// Every generator from `rand` is a `UniformSource`. Seed one explicitly
/// (for example `StdRng::seed_from_u64`) to make an experiment reproducible.
pub trait UniformSource {
    /// Returns a uniform value in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// Fills `dest` with uniform bytes.
    fn fill_bytes(&mut self, dest: &mut [u8]);

    /// Returns a uniform value in `[-1, 1)`.
    fn next_signed(&mut self) -> f64 {
        2.0 * self.next_f64() - 1.0
    }
}

impl<R> UniformSource for R
where
    R: RngCore + ?Sized,
{
    fn next_f64(&mut self) -> f64 {
        self.gen::<f64>()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        RngCore::fill_bytes(self, dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn values_are_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let x = rng.next_f64();
            assert!((0.0..1.0).contains(&x));
            let y = rng.next_signed();
            assert!((-1.0..1.0).contains(&y));
        }
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = StdRng::seed_from_u64(89677);
        let mut b = StdRng::seed_from_u64(89677);
        let mut bytes_a = [0u8; 16];
        let mut bytes_b = [0u8; 16];
        UniformSource::fill_bytes(&mut a, &mut bytes_a);
        UniformSource::fill_bytes(&mut b, &mut bytes_b);
        assert_eq!(bytes_a, bytes_b);
        assert_eq!(a.next_f64(), b.next_f64());
    }
}
