//! Activation and cost functions.

use itertools::izip;
use rayon::prelude::*;

/// Smallest number of units handed to a single rayon task.
const MIN_PARALLEL_LEN: usize = 64;

/// Added inside every logarithm so saturated units still give finite costs.
pub const LOG_EPSILON: f64 = 1e-10;

/// [Activation function](https://en.wikipedia.org/wiki/Activation_function)
/// types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activator {
    /// Pass-through.
    Identity,
    /// Logistic sigmoid, applied to every unit independently.
    Sigmoid,
    /// Normalized exponential over the whole layer.
    Softmax,
}

impl Activator {
    /// Activates the pre-activations produced by `x` into `result`.
    ///
    /// `x(i)` is the pre-activation of unit `i`. It is evaluated exactly once
    /// per unit, possibly from several threads, and never stored on its own.
    pub fn apply<F>(self, x: F, result: &mut [f64])
    where
        F: Fn(usize) -> f64 + Sync,
    {
        match self {
            Activator::Identity => {
                result
                    .par_iter_mut()
                    .with_min_len(MIN_PARALLEL_LEN)
                    .enumerate()
                    .for_each(|(i, y)| *y = x(i));
            }
            Activator::Sigmoid => {
                result
                    .par_iter_mut()
                    .with_min_len(MIN_PARALLEL_LEN)
                    .enumerate()
                    .for_each(|(i, y)| *y = sigmoid(x(i)));
            }
            Activator::Softmax => {
                result
                    .par_iter_mut()
                    .with_min_len(MIN_PARALLEL_LEN)
                    .enumerate()
                    .for_each(|(i, y)| *y = x(i));
                // Sequential reductions keep the result independent of how
                // rayon splits the work.
                let max = result.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mut sum = 0.0;
                for y in result.iter_mut() {
                    *y = (*y - max).exp();
                    sum += *y;
                }
                result
                    .par_iter_mut()
                    .with_min_len(MIN_PARALLEL_LEN)
                    .for_each(|y| *y /= sum);
            }
        }
    }
}

/// The logistic sigmoid `1 / (1 + e^-x)`.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Derivative of the sigmoid, expressed through its output `y`.
#[inline]
pub fn sigmoid_prime(y: f64) -> f64 {
    y * (1.0 - y)
}

/// Binary cross-entropy of `reconstruction` against the target `input`.
///
/// Both slices must hold values in `[0, 1]`.
pub fn binary_cross_entropy(input: &[f64], reconstruction: &[f64]) -> f64 {
    assert_eq!(input.len(), reconstruction.len());
    let mut cost = 0.0;
    for (&x, &z) in izip!(input, reconstruction) {
        cost -= x * (z + LOG_EPSILON).ln() + (1.0 - x) * (1.0 - z + LOG_EPSILON).ln();
    }
    cost
}

/// Multi-class cross-entropy of the distribution `output` against the
/// target distribution `expected`.
pub fn multi_class_cross_entropy(output: &[f64], expected: &[f64]) -> f64 {
    assert_eq!(output.len(), expected.len());
    let mut cost = 0.0;
    for (&y, &t) in izip!(output, expected) {
        cost -= t * (y + LOG_EPSILON).ln();
    }
    cost
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn sigmoid_values() {
        let input = [0.0, 2.0, -2.0];
        let mut output = [0.0; 3];
        Activator::Sigmoid.apply(|i| input[i], &mut output);
        assert!(close(output[0], 0.5));
        assert!(close(output[1], 0.8807970779778823));
        assert!(close(output[1] + output[2], 1.0));
        assert!(close(sigmoid_prime(output[0]), 0.25));
    }

    #[test]
    fn identity_passes_through() {
        let mut output = [0.0; 200];
        Activator::Identity.apply(|i| i as f64 * 0.5, &mut output);
        for (i, &y) in output.iter().enumerate() {
            assert_eq!(y, i as f64 * 0.5);
        }
    }

    #[test]
    fn softmax_sums_to_one() {
        let input = [0.6, 0.7, 0.4];
        let mut output = [0.0; 3];
        Activator::Softmax.apply(|i| input[i], &mut output);
        assert!((output[0] - 0.34200877).abs() < 1e-7);
        assert!((output[1] - 0.37797814).abs() < 1e-7);
        assert!((output[2] - 0.28001309).abs() < 1e-7);
        assert!(close(output.iter().sum::<f64>(), 1.0));
    }

    #[test]
    fn softmax_does_not_overflow() {
        let input = [1000.0, 1001.0, -1000.0];
        let mut output = [0.0; 3];
        Activator::Softmax.apply(|i| input[i], &mut output);
        assert!(output.iter().all(|y| y.is_finite()));
        assert!(close(output.iter().sum::<f64>(), 1.0));
        assert!(output[1] > output[0]);
        assert!(output[2] < 1e-12);
    }

    #[test]
    fn cross_entropy_stays_finite() {
        let input = [1.0, 0.0];
        let saturated = [0.0, 1.0];
        let cost = binary_cross_entropy(&input, &saturated);
        assert!(cost.is_finite());
        assert!(close(cost, -2.0 * LOG_EPSILON.ln()));

        let perfect = binary_cross_entropy(&input, &input);
        assert!(perfect.abs() < 1e-9);
    }

    #[test]
    fn multi_class_cross_entropy_values() {
        let output = [0.25, 0.75];
        let expected = [0.0, 1.0];
        assert!(close(
            multi_class_cross_entropy(&output, &expected),
            -(0.75 + LOG_EPSILON).ln()
        ));
    }
}
