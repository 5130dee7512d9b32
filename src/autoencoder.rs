//! Greedy layer-wise pretraining by denoising autoencoding.
//!
//! An autoencoder is paired with one hidden layer of a stack. It encodes with
//! that layer's weights and biases and decodes with the transpose of the same
//! weights plus a visible bias of its own, so every step it takes trains the
//! layer in place.

use crate::activator::{binary_cross_entropy, sigmoid_prime, Activator};
use crate::dataset::Sample;
use crate::error::{Error, Result};
use crate::gradient::{GradientBuffer, LearningMode, ParameterGradients};
use crate::layer::{Layer, LayerKind, Parameters};
use crate::random::UniformSource;
use crate::utils::ZeroOut;

use itertools::izip;
use ndarray::{Array1, ArrayView1, Zip};

/// Settings for one autoencoder training pass.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DenoisingOptions {
    pub learning_rate: f64,
    /// Probability of zeroing each input coordinate.
    pub noise: f64,
    pub mode: LearningMode,
}

impl DenoisingOptions {
    pub fn validate(&self) -> Result<()> {
        check_noise(self.noise)?;
        self.mode.validate()
    }
}

fn check_noise(noise: f64) -> Result<()> {
    if (0.0..=1.0).contains(&noise) {
        Ok(())
    } else {
        Err(Error::InvalidNoise(noise))
    }
}

/// A denoising autoencoder tied to the hidden layer at `layer()` in a stack.
#[derive(Clone, Debug, PartialEq)]
pub struct DenoisingAutoencoder {
    layer: usize,
    visible_bias: Array1<f64>,
}

impl DenoisingAutoencoder {
    /// Pairs an autoencoder with hidden layer `layer`, whose input has
    /// `visible_len` units.
    pub fn new(layer: usize, visible_len: usize) -> Self {
        DenoisingAutoencoder {
            layer,
            visible_bias: Array1::zeros(visible_len),
        }
    }

    /// Index of the hidden layer this autoencoder trains.
    pub fn layer(&self) -> usize {
        self.layer
    }

    pub fn visible_bias(&self) -> &Array1<f64> {
        &self.visible_bias
    }

    /// Runs one training pass over `samples`.
    ///
    /// `layers` is the stack this autoencoder belongs to. Every sample is
    /// fed through the layers below the paired one, corrupted, and
    /// reconstructed. Returns the mean reconstruction cost of the pass.
    pub fn train<R>(
        &mut self,
        layers: &mut [Layer],
        samples: &[Sample],
        options: &DenoisingOptions,
        rng: &mut R,
    ) -> Result<f64>
    where
        R: UniformSource + ?Sized,
    {
        options.validate()?;
        self.check(layers, samples)?;
        let (lower, rest) = layers.split_at_mut(self.layer);
        let params = rest[0].parameters_mut();
        let rate = options.learning_rate;

        let mut cost = 0.0;
        match options.mode {
            LearningMode::Stochastic => {
                for sample in samples {
                    let step =
                        Step::new(lower, params, &self.visible_bias, sample, options.noise, rng);
                    cost += step.cost;
                    step.apply(
                        &mut ParameterGradients::Online(&mut *params),
                        &mut self.visible_bias,
                        rate,
                    );
                }
            }
            LearningMode::Batch(size) => {
                let mut buffer = GradientBuffer::new(params);
                let mut visible = Array1::zeros(self.visible_bias.raw_dim());
                for batch in samples.chunks(size) {
                    {
                        let snapshot: &Parameters = &*params;
                        for sample in batch {
                            let step = Step::new(
                                lower,
                                snapshot,
                                &self.visible_bias,
                                sample,
                                options.noise,
                                rng,
                            );
                            cost += step.cost;
                            let mut gradients = ParameterGradients::Batch {
                                snapshot,
                                buffer: &mut buffer,
                            };
                            step.apply(&mut gradients, &mut visible, rate);
                        }
                    }
                    buffer.update_parameters(params, batch.len());
                    let count = batch.len() as f64;
                    Zip::from(&mut self.visible_bias)
                        .and(&visible)
                        .for_each(|v, &g| *v += g / count);
                    visible.zero_out();
                }
            }
        }
        Ok(cost / samples.len() as f64)
    }

    /// Mean reconstruction cost of `samples` corrupted with `noise`, without
    /// training.
    pub fn cost<R>(
        &self,
        layers: &[Layer],
        samples: &[Sample],
        noise: f64,
        rng: &mut R,
    ) -> Result<f64>
    where
        R: UniformSource + ?Sized,
    {
        check_noise(noise)?;
        self.check(layers, samples)?;
        let (lower, rest) = layers.split_at(self.layer);
        let params = rest[0].parameters();
        let mut cost = 0.0;
        for sample in samples {
            cost += Step::new(lower, params, &self.visible_bias, sample, noise, rng).cost;
        }
        Ok(cost / samples.len() as f64)
    }

    fn check(&self, layers: &[Layer], samples: &[Sample]) -> Result<()> {
        let layer = layers.get(self.layer).ok_or(Error::LayerIndex {
            index: self.layer,
            count: layers.len(),
        })?;
        if layer.kind() != LayerKind::Hidden {
            return Err(Error::NotHidden(self.layer));
        }
        if layer.input_len() != self.visible_bias.len() {
            return Err(Error::BiasShape {
                expected: layer.input_len(),
                actual: self.visible_bias.len(),
            });
        }
        if samples.is_empty() {
            return Err(Error::EmptyDataset);
        }
        let input_len = layers[0].input_len();
        for sample in samples {
            if sample.image().len() != input_len {
                return Err(Error::InputLength {
                    expected: input_len,
                    actual: sample.image().len(),
                });
            }
        }
        Ok(())
    }
}

/// Feeds `image` through `layers`.
pub(crate) fn forward(layers: &[Layer], image: &[f64]) -> Vec<f64> {
    let mut activation = image.to_vec();
    for layer in layers {
        activation = layer.compute(&activation);
    }
    activation
}

/// Zeroes each coordinate of `input` with probability `noise`.
///
/// Draws exactly one value from `rng` per coordinate, in order.
pub fn corrupt<R>(input: &[f64], noise: f64, rng: &mut R) -> Vec<f64>
where
    R: UniformSource + ?Sized,
{
    input
        .iter()
        .map(|&x| if rng.next_f64() < noise { 0.0 } else { x })
        .collect()
}

/// Everything one sample contributes to a training step, computed from the
/// parameters before the step.
struct Step {
    corrupted: Array1<f64>,
    latent: Array1<f64>,
    /// Reconstruction error of each visible unit.
    visible_error: Array1<f64>,
    /// Back-propagated error of each latent unit.
    latent_error: Array1<f64>,
    cost: f64,
}

impl Step {
    fn new<R>(
        lower: &[Layer],
        params: &Parameters,
        visible_bias: &Array1<f64>,
        sample: &Sample,
        noise: f64,
        rng: &mut R,
    ) -> Self
    where
        R: UniformSource + ?Sized,
    {
        let input = forward(lower, sample.image());
        let corrupted = Array1::from(corrupt(&input, noise, rng));

        let mut latent = vec![0.0; params.output_len()];
        Activator::Sigmoid.apply(|i| params.pre_activation(i, &corrupted.view()), &mut latent);
        let latent = Array1::from(latent);

        let mut reconstruction = vec![0.0; params.input_len()];
        Activator::Sigmoid.apply(
            |j| params.weights.column(j).dot(&latent) + visible_bias[j],
            &mut reconstruction,
        );
        let cost = binary_cross_entropy(&input, &reconstruction);

        let visible_error: Array1<f64> = izip!(&reconstruction, &input)
            .map(|(&z, &x)| z - x)
            .collect();
        let latent_error = Zip::from(params.weights.rows())
            .and(&latent)
            .par_map_collect(|row, &y| row.dot(&visible_error) * sigmoid_prime(y));

        Step {
            corrupted,
            latent,
            visible_error,
            latent_error,
            cost,
        }
    }

    fn apply(
        &self,
        gradients: &mut ParameterGradients,
        visible_target: &mut Array1<f64>,
        rate: f64,
    ) {
        let corrupted: ArrayView1<f64> = self.corrupted.view();
        let visible_error = &self.visible_error;
        let (weights, biases) = gradients.targets();
        Zip::from(weights.rows_mut())
            .and(biases)
            .and(&self.latent)
            .and(&self.latent_error)
            .par_for_each(|mut row, b, &y, &h| {
                Zip::from(&mut row)
                    .and(visible_error)
                    .and(&corrupted)
                    .for_each(|w, &o, &c| *w -= rate * (o * y + h * c));
                *b -= rate * h;
            });
        Zip::from(visible_target)
            .and(visible_error)
            .for_each(|v, &o| *v -= rate * o);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn binary_samples() -> Vec<Sample> {
        vec![
            Sample::new(0, vec![1.0, 1.0, 0.0, 0.0, 1.0, 0.0]),
            Sample::new(1, vec![0.0, 0.0, 1.0, 1.0, 0.0, 1.0]),
            Sample::new(0, vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
            Sample::new(1, vec![0.0, 1.0, 1.0, 1.0, 0.0, 1.0]),
            Sample::new(0, vec![1.0, 1.0, 0.0, 1.0, 1.0, 0.0]),
        ]
    }

    fn stack(seed: u64) -> Vec<Layer> {
        let mut rng = StdRng::seed_from_u64(seed);
        vec![Layer::hidden(6, 5, &mut rng), Layer::hidden(5, 3, &mut rng)]
    }

    #[test]
    fn full_noise_zeroes_everything() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(corrupt(&[0.3, 1.0, 0.7], 1.0, &mut rng), vec![0.0; 3]);
        assert_eq!(corrupt(&[0.3, 1.0, 0.7], 0.0, &mut rng), vec![0.3, 1.0, 0.7]);
    }

    #[test]
    fn full_noise_cost() {
        let layers = stack(11);
        let autoencoder = DenoisingAutoencoder::new(1, 5);
        let samples = binary_samples();
        let mut rng = StdRng::seed_from_u64(0);
        let cost = autoencoder.cost(&layers, &samples, 1.0, &mut rng).unwrap();

        // A fully corrupted input leaves only the biases to encode.
        let params = layers[1].parameters();
        let latent: Vec<f64> = params
            .biases()
            .iter()
            .map(|&b| crate::activator::sigmoid(b))
            .collect();
        let reconstruction: Vec<f64> = (0..5)
            .map(|j| {
                let pre: f64 = (0..3).map(|i| params.weights()[[i, j]] * latent[i]).sum();
                crate::activator::sigmoid(pre)
            })
            .collect();
        let expected = samples
            .iter()
            .map(|s| binary_cross_entropy(&layers[0].compute(s.image()), &reconstruction))
            .sum::<f64>()
            / samples.len() as f64;
        assert!((cost - expected).abs() < 1e-9);
    }

    #[test]
    fn noiseless_cost_does_not_increase() {
        let mut layers = stack(5);
        let mut autoencoder = DenoisingAutoencoder::new(0, 6);
        let samples = binary_samples();
        let options = DenoisingOptions {
            learning_rate: 0.01,
            noise: 0.0,
            mode: LearningMode::Batch(samples.len()),
        };
        let mut rng = StdRng::seed_from_u64(3);
        let mut last = f64::INFINITY;
        for _ in 0..20 {
            let cost = autoencoder.train(&mut layers, &samples, &options, &mut rng).unwrap();
            assert!(cost <= last);
            last = cost;
        }
    }

    #[test]
    fn online_matches_batch_of_one() {
        let samples = binary_samples();
        let mut results = Vec::new();
        for &mode in &[LearningMode::Stochastic, LearningMode::Batch(1)] {
            let mut layers = stack(21);
            let mut autoencoder = DenoisingAutoencoder::new(1, 5);
            let options = DenoisingOptions {
                learning_rate: 0.1,
                noise: 0.3,
                mode,
            };
            let mut rng = StdRng::seed_from_u64(99);
            let costs: Vec<f64> = (0..3)
                .map(|_| autoencoder.train(&mut layers, &samples, &options, &mut rng).unwrap())
                .collect();
            results.push((costs, layers[1].parameters().clone(), autoencoder));
        }
        assert_eq!(results[0], results[1]);
    }

    fn max_difference<'a, A, B>(a: A, b: B) -> f64
    where
        A: IntoIterator<Item = &'a f64>,
        B: IntoIterator<Item = &'a f64>,
    {
        a.into_iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn batch_step_is_the_mean_of_online_steps() {
        let samples = binary_samples();
        let start = stack(13);
        let fresh = DenoisingAutoencoder::new(1, 5);
        let options = DenoisingOptions {
            learning_rate: 0.5,
            noise: 0.0,
            mode: LearningMode::Stochastic,
        };

        // One online step from the shared start for each sample on its own.
        let singles: Vec<(Parameters, Array1<f64>)> = samples[..2]
            .iter()
            .map(|sample| {
                let mut layers = start.clone();
                let mut autoencoder = fresh.clone();
                let mut rng = StdRng::seed_from_u64(0);
                autoencoder
                    .train(&mut layers, std::slice::from_ref(sample), &options, &mut rng)
                    .unwrap();
                (layers[1].parameters().clone(), autoencoder.visible_bias().clone())
            })
            .collect();

        let mut layers = start.clone();
        let mut autoencoder = fresh.clone();
        let mut rng = StdRng::seed_from_u64(0);
        let batch = DenoisingOptions {
            mode: LearningMode::Batch(2),
            ..options
        };
        autoencoder
            .train(&mut layers, &samples[..2], &batch, &mut rng)
            .unwrap();

        let origin = start[1].parameters();
        let (a, b) = (&singles[0], &singles[1]);
        let mean = |s: f64, x: f64, y: f64| s + ((x - s) + (y - s)) / 2.0;
        let weights: Vec<f64> = izip!(origin.weights(), a.0.weights(), b.0.weights())
            .map(|(&s, &x, &y)| mean(s, x, y))
            .collect();
        let biases: Vec<f64> = izip!(origin.biases(), a.0.biases(), b.0.biases())
            .map(|(&s, &x, &y)| mean(s, x, y))
            .collect();
        let visible: Vec<f64> = izip!(&a.1, &b.1).map(|(&x, &y)| mean(0.0, x, y)).collect();

        let trained = layers[1].parameters();
        assert!(max_difference(trained.weights().iter(), weights.iter()) < 1e-12);
        assert!(max_difference(trained.biases().iter(), biases.iter()) < 1e-12);
        assert!(max_difference(autoencoder.visible_bias().iter(), visible.iter()) < 1e-12);
        assert_ne!(trained, origin);
        assert_eq!(layers[0].parameters(), start[0].parameters());
    }

    #[test]
    fn rejects_mismatched_pairing() {
        let mut rng = StdRng::seed_from_u64(2);
        let samples = binary_samples();
        let options = DenoisingOptions {
            learning_rate: 0.1,
            noise: 0.1,
            mode: LearningMode::Stochastic,
        };

        let mut layers = stack(2);
        let before = layers[1].parameters().clone();
        let mut autoencoder = DenoisingAutoencoder::new(1, 4);
        let expected = Err(Error::BiasShape {
            expected: 5,
            actual: 4,
        });
        assert_eq!(
            autoencoder.train(&mut layers, &samples, &options, &mut rng),
            expected
        );
        assert_eq!(autoencoder.cost(&layers, &samples, 0.1, &mut rng), expected);
        assert_eq!(layers[1].parameters(), &before);

        let mut layers = vec![Layer::hidden(6, 5, &mut rng), Layer::output(5, 2)];
        let before = layers[1].parameters().clone();
        let mut autoencoder = DenoisingAutoencoder::new(1, 5);
        assert_eq!(
            autoencoder.train(&mut layers, &samples, &options, &mut rng),
            Err(Error::NotHidden(1))
        );
        assert_eq!(
            autoencoder.cost(&layers, &samples, 0.1, &mut rng),
            Err(Error::NotHidden(1))
        );
        assert_eq!(layers[1].parameters(), &before);
        assert_eq!(autoencoder.visible_bias(), &Array1::<f64>::zeros(5));
    }

    #[test]
    fn training_only_touches_its_layer() {
        let mut layers = stack(8);
        let below = layers[0].parameters().clone();
        let before = layers[1].parameters().clone();
        let mut autoencoder = DenoisingAutoencoder::new(1, 5);
        let options = DenoisingOptions {
            learning_rate: 0.1,
            noise: 0.2,
            mode: LearningMode::Batch(2),
        };
        let mut rng = StdRng::seed_from_u64(4);
        autoencoder
            .train(&mut layers, &binary_samples(), &options, &mut rng)
            .unwrap();
        assert_eq!(layers[0].parameters(), &below);
        assert_ne!(layers[1].parameters(), &before);
        assert!(autoencoder.visible_bias().iter().any(|&v| v != 0.0));
    }

    #[test]
    fn rejects_bad_options() {
        let mut layers = stack(1);
        let mut autoencoder = DenoisingAutoencoder::new(0, 6);
        let mut rng = StdRng::seed_from_u64(1);
        let mut options = DenoisingOptions {
            learning_rate: 0.1,
            noise: 1.5,
            mode: LearningMode::Stochastic,
        };
        assert_eq!(
            autoencoder.train(&mut layers, &binary_samples(), &options, &mut rng),
            Err(Error::InvalidNoise(1.5))
        );
        options.noise = 0.1;
        options.mode = LearningMode::Batch(0);
        assert_eq!(
            autoencoder.train(&mut layers, &binary_samples(), &options, &mut rng),
            Err(Error::ZeroBatchSize)
        );
        options.mode = LearningMode::Stochastic;
        assert_eq!(
            autoencoder.train(&mut layers, &[], &options, &mut rng),
            Err(Error::EmptyDataset)
        );
    }
}
