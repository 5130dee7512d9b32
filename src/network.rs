//! A stacked denoising autoencoder: a feed-forward classifier whose hidden
//! layers are pretrained one at a time as denoising autoencoders before the
//! whole stack is fine-tuned.
//!
//! # Example
//!
//! Let's pretrain and fine-tune a tiny network that tells two points apart:
//!
//! ```
//! # use sdae::{DenoisingOptions, LearningMode, Sample, StackedNetwork};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let samples = vec![Sample::new(0, vec![1.0, 0.0]), Sample::new(1, vec![0.0, 1.0])];
//!
//! // Two inputs, one hidden layer of three units, two classes
//! let mut network = StackedNetwork::from_layer_sizes(&[2, 3, 2], &mut rng)?;
//!
//! let options = DenoisingOptions {
//!     learning_rate: 0.1,
//!     noise: 0.1,
//!     mode: LearningMode::Stochastic,
//! };
//! network.pretrain(0, &samples, 5, &options, &mut rng)?;
//! for _ in 0..200 {
//!     network.fine_tune(&samples, 0.5, LearningMode::Stochastic)?;
//! }
//!
//! assert_eq!(network.predict(&[1.0, 0.0])?, 0);
//! assert_eq!(network.predict(&[0.0, 1.0])?, 1);
//! assert_eq!(network.error_rate(&samples)?, 0.0);
//! # Ok::<(), sdae::Error>(())
//! ```

use crate::activator::multi_class_cross_entropy;
use crate::autoencoder::{forward, DenoisingAutoencoder, DenoisingOptions};
use crate::dataset::{validate_samples, Sample};
use crate::error::{Error, Result};
use crate::gradient::{GradientBuffer, LearningMode, ParameterGradients};
use crate::layer::{Layer, LayerKind, Parameters};
use crate::random::UniformSource;
use crate::utils::{argmax, io_layers};

use tracing::debug;

/// A stack of hidden layers topped by a softmax output layer.
///
/// Hidden layers can be added and replaced until the output layer is set.
/// After that the structure is fixed.
#[derive(Clone, Debug)]
pub struct StackedNetwork {
    input_len: usize,
    /// Hidden layers, then the output layer once it is set.
    layers: Vec<Layer>,
    /// One autoencoder per hidden layer.
    autoencoders: Vec<DenoisingAutoencoder>,
}

impl StackedNetwork {
    /// Creates a network with no layers yet.
    pub fn new(input_len: usize) -> Result<Self> {
        if input_len == 0 {
            return Err(Error::ZeroWidth);
        }
        Ok(StackedNetwork {
            input_len,
            layers: Vec::new(),
            autoencoders: Vec::new(),
        })
    }

    /// Builds a complete network from the width of every layer, input first
    /// and class count last.
    pub fn from_layer_sizes<R>(layer_sizes: &[usize], rng: &mut R) -> Result<Self>
    where
        R: UniformSource + ?Sized,
    {
        if layer_sizes.len() < 2 {
            return Err(Error::TooFewLayers(layer_sizes.len()));
        }
        if layer_sizes.iter().any(|&size| size == 0) {
            return Err(Error::ZeroWidth);
        }
        let (&classes, widths) = layer_sizes.split_last().ok_or(Error::TooFewLayers(0))?;
        let mut network = StackedNetwork::new(widths[0])?;
        for &width in &widths[1..] {
            network.add_hidden_layer(width, rng)?;
        }
        network.finalize_output_layer(classes)?;
        Ok(network)
    }

    /// Returns the size of the input layer to the network.
    pub fn input_len(&self) -> usize {
        self.input_len
    }

    /// Returns the number of classes, or `None` before the output layer is
    /// set.
    pub fn classes(&self) -> Option<usize> {
        self.output_layer().map(Layer::output_len)
    }

    pub fn is_finalized(&self) -> bool {
        self.layers.len() > self.autoencoders.len()
    }

    /// All layers, bottom first.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn hidden_layers(&self) -> &[Layer] {
        &self.layers[..self.autoencoders.len()]
    }

    pub fn output_layer(&self) -> Option<&Layer> {
        if self.is_finalized() {
            self.layers.last()
        } else {
            None
        }
    }

    pub fn autoencoders(&self) -> &[DenoisingAutoencoder] {
        &self.autoencoders
    }

    /// Width of whatever the next layer would be stacked on.
    fn top_len(&self) -> usize {
        self.layers.last().map_or(self.input_len, Layer::output_len)
    }

    fn check_mutable(&self) -> Result<()> {
        if self.is_finalized() {
            Err(Error::Finalized)
        } else {
            Ok(())
        }
    }

    fn push_hidden(&mut self, layer: Layer) {
        let index = self.layers.len();
        self.autoencoders
            .push(DenoisingAutoencoder::new(index, layer.input_len()));
        self.layers.push(layer);
    }

    /// Stacks a randomly initialized hidden layer of `width` units.
    pub fn add_hidden_layer<R>(&mut self, width: usize, rng: &mut R) -> Result<()>
    where
        R: UniformSource + ?Sized,
    {
        self.check_mutable()?;
        if width == 0 {
            return Err(Error::ZeroWidth);
        }
        let layer = Layer::hidden(self.top_len(), width, rng);
        self.push_hidden(layer);
        Ok(())
    }

    /// Replaces hidden layer `index` with a fresh layer of `width` units, or
    /// stacks a new one when `index` equals the number of hidden layers.
    ///
    /// The layer above a replaced one is rebuilt to accept the new width.
    /// Both lose their training, as do their autoencoders.
    pub fn set_hidden_layer<R>(&mut self, index: usize, width: usize, rng: &mut R) -> Result<()>
    where
        R: UniformSource + ?Sized,
    {
        self.check_mutable()?;
        let count = self.layers.len();
        if index > count {
            return Err(Error::LayerIndex { index, count });
        }
        if width == 0 {
            return Err(Error::ZeroWidth);
        }
        if index == count {
            return self.add_hidden_layer(width, rng);
        }

        let inputs = self.layers[index].input_len();
        self.layers[index] = Layer::hidden(inputs, width, rng);
        self.autoencoders[index] = DenoisingAutoencoder::new(index, inputs);
        if index + 1 < count {
            let outputs = self.layers[index + 1].output_len();
            self.layers[index + 1] = Layer::hidden(width, outputs, rng);
            self.autoencoders[index + 1] = DenoisingAutoencoder::new(index + 1, width);
        }
        Ok(())
    }

    /// Stacks a hidden layer that starts from `params`.
    pub fn push_hidden_parameters(&mut self, params: Parameters) -> Result<()> {
        self.check_mutable()?;
        self.check_shape(&params)?;
        self.push_hidden(Layer::from_parameters(LayerKind::Hidden, params));
        Ok(())
    }

    /// Sets a zero-initialized output layer for `classes` classes and freezes
    /// the hidden layers.
    pub fn finalize_output_layer(&mut self, classes: usize) -> Result<()> {
        self.check_mutable()?;
        if classes == 0 {
            return Err(Error::ZeroWidth);
        }
        let layer = Layer::output(self.top_len(), classes);
        self.layers.push(layer);
        Ok(())
    }

    /// Sets an output layer that starts from `params` and freezes the hidden
    /// layers.
    pub fn finalize_output_parameters(&mut self, params: Parameters) -> Result<()> {
        self.check_mutable()?;
        self.check_shape(&params)?;
        self.layers
            .push(Layer::from_parameters(LayerKind::Output, params));
        Ok(())
    }

    fn check_shape(&self, params: &Parameters) -> Result<()> {
        let expected_cols = self.top_len();
        if params.input_len() != expected_cols {
            return Err(Error::WeightShape {
                expected_rows: params.output_len(),
                expected_cols,
                rows: params.output_len(),
                cols: params.input_len(),
            });
        }
        Ok(())
    }

    fn check_input(&self, input: &[f64]) -> Result<()> {
        if input.len() != self.input_len {
            return Err(Error::InputLength {
                expected: self.input_len,
                actual: input.len(),
            });
        }
        Ok(())
    }

    /// Checks that `samples` fit the finished network.
    fn check_samples(&self, samples: &[Sample]) -> Result<usize> {
        let classes = self.classes().ok_or(Error::NotFinalized)?;
        if samples.is_empty() {
            return Err(Error::EmptyDataset);
        }
        validate_samples(samples, self.input_len, classes)?;
        Ok(classes)
    }

    /// Trains hidden layer `layer` as a denoising autoencoder for `epochs`
    /// passes over `samples`.
    ///
    /// Returns the mean reconstruction cost of every pass.
    pub fn pretrain<R>(
        &mut self,
        layer: usize,
        samples: &[Sample],
        epochs: usize,
        options: &DenoisingOptions,
        rng: &mut R,
    ) -> Result<Vec<f64>>
    where
        R: UniformSource + ?Sized,
    {
        let count = self.autoencoders.len();
        let autoencoder = self
            .autoencoders
            .get_mut(layer)
            .ok_or(Error::LayerIndex { index: layer, count })?;
        let mut costs = Vec::with_capacity(epochs);
        for epoch in 0..epochs {
            let cost = autoencoder.train(&mut self.layers, samples, options, rng)?;
            debug!(layer, epoch, cost, "pretraining pass");
            costs.push(cost);
        }
        Ok(costs)
    }

    /// Mean reconstruction cost of hidden layer `layer` on `samples`.
    pub fn pretraining_cost<R>(
        &self,
        layer: usize,
        samples: &[Sample],
        noise: f64,
        rng: &mut R,
    ) -> Result<f64>
    where
        R: UniformSource + ?Sized,
    {
        let autoencoder = self.autoencoders.get(layer).ok_or(Error::LayerIndex {
            index: layer,
            count: self.autoencoders.len(),
        })?;
        autoencoder.cost(&self.layers, samples, noise, rng)
    }

    /// Runs one supervised pass over `samples`, back-propagating through
    /// every layer.
    ///
    /// Returns the mean cross-entropy of the pass, measured before each
    /// sample's update lands.
    pub fn fine_tune(
        &mut self,
        samples: &[Sample],
        learning_rate: f64,
        mode: LearningMode,
    ) -> Result<f64> {
        mode.validate()?;
        let classes = self.check_samples(samples)?;

        let mut cost = 0.0;
        match mode {
            LearningMode::Stochastic => {
                for sample in samples {
                    let activations = self.activations(sample.image());
                    let mut upper_info = one_hot(sample.label(), classes);
                    cost += output_cost(&activations, &upper_info);
                    for (n, layer) in self.layers.iter_mut().enumerate().rev() {
                        let (input, output) = io_layers(&activations, n);
                        upper_info = layer.train_online(input, output, &upper_info, learning_rate);
                    }
                }
            }
            LearningMode::Batch(size) => {
                let mut buffers: Vec<GradientBuffer> = self
                    .layers
                    .iter()
                    .map(|layer| GradientBuffer::new(layer.parameters()))
                    .collect();
                for batch in samples.chunks(size) {
                    for sample in batch {
                        let activations = self.activations(sample.image());
                        let mut upper_info = one_hot(sample.label(), classes);
                        cost += output_cost(&activations, &upper_info);
                        let layers = self.layers.iter().zip(buffers.iter_mut());
                        for (n, (layer, buffer)) in layers.enumerate().rev() {
                            let (input, output) = io_layers(&activations, n);
                            let mut gradients = ParameterGradients::Batch {
                                snapshot: layer.parameters(),
                                buffer,
                            };
                            let kind = layer.kind();
                            upper_info = kind.parameter_gradients(
                                input,
                                output,
                                &upper_info,
                                learning_rate,
                                &mut gradients,
                            );
                        }
                    }
                    for (layer, buffer) in self.layers.iter_mut().zip(buffers.iter_mut()) {
                        buffer.update_parameters(layer.parameters_mut(), batch.len());
                    }
                }
            }
        }
        let cost = cost / samples.len() as f64;
        debug!(cost, "fine-tuning pass");
        Ok(cost)
    }

    /// The activation of every layer for `input`, starting with the input
    /// itself.
    fn activations(&self, input: &[f64]) -> Vec<Vec<f64>> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_vec());
        for layer in &self.layers {
            let output = layer.compute(&activations[activations.len() - 1]);
            activations.push(output);
        }
        activations
    }

    /// Feeds `input` through every layer.
    pub fn compute(&self, input: &[f64]) -> Result<Vec<f64>> {
        self.check_input(input)?;
        Ok(forward(&self.layers, input))
    }

    /// Returns the most probable class for `input`.
    pub fn predict(&self, input: &[f64]) -> Result<usize> {
        if !self.is_finalized() {
            return Err(Error::NotFinalized);
        }
        Ok(argmax(&self.compute(input)?))
    }

    /// Fraction of `samples` whose prediction differs from their label.
    pub fn error_rate(&self, samples: &[Sample]) -> Result<f64> {
        self.check_samples(samples)?;
        let mut errors = 0;
        for sample in samples {
            if argmax(&forward(&self.layers, sample.image())) != sample.label() {
                errors += 1;
            }
        }
        Ok(errors as f64 / samples.len() as f64)
    }
}

fn one_hot(label: usize, classes: usize) -> Vec<f64> {
    let mut target = vec![0.0; classes];
    target[label] = 1.0;
    target
}

fn output_cost(activations: &[Vec<f64>], target: &[f64]) -> f64 {
    match activations.last() {
        Some(output) => multi_class_cross_entropy(output, target),
        None => 0.0,
    }
}
