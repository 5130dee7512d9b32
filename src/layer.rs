//! A single fully connected layer and the parameters it owns.

use crate::activator::{sigmoid_prime, Activator};
use crate::error::{Error, Result};
use crate::gradient::ParameterGradients;
use crate::random::UniformSource;

use ndarray::{Array1, Array2, ArrayView1, Zip};
use rayon::prelude::*;

/// Scale applied to the uniform initialization range of sigmoid units.
const SIGMOID_INIT_SCALE: f64 = 4.0;

/// The trainable state of one layer.
///
/// Weights are stored with one row per output unit, so `weights[[i, j]]`
/// connects input `j` to output `i`.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameters {
    pub(crate) weights: Array2<f64>,
    pub(crate) biases: Array1<f64>,
}

impl Parameters {
    /// Wraps caller-provided weights and biases.
    pub fn new(weights: Array2<f64>, biases: Array1<f64>) -> Result<Self> {
        let (rows, cols) = weights.dim();
        if rows == 0 || cols == 0 {
            return Err(Error::ZeroWidth);
        }
        if biases.len() != rows {
            return Err(Error::BiasShape {
                expected: rows,
                actual: biases.len(),
            });
        }
        Ok(Parameters { weights, biases })
    }

    /// All-zero parameters for a layer with `inputs` inputs and `outputs`
    /// units.
    pub fn zeros(inputs: usize, outputs: usize) -> Self {
        Parameters {
            weights: Array2::zeros((outputs, inputs)),
            biases: Array1::zeros(outputs),
        }
    }

    /// Uniformly distributed weights in `±4 * sqrt(6 / (inputs + outputs))`
    /// and zero biases.
    ///
    /// One value is drawn from `rng` per weight, in row-major order.
    pub fn random<R>(inputs: usize, outputs: usize, rng: &mut R) -> Self
    where
        R: UniformSource + ?Sized,
    {
        let bound = (6.0 / (inputs + outputs) as f64).sqrt() * SIGMOID_INIT_SCALE;
        let mut params = Parameters::zeros(inputs, outputs);
        for w in params.weights.iter_mut() {
            *w = rng.next_signed() * bound;
        }
        params
    }

    pub fn input_len(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_len(&self) -> usize {
        self.weights.nrows()
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn biases(&self) -> &Array1<f64> {
        &self.biases
    }

    /// The pre-activation of unit `i` for `input`.
    #[inline]
    pub(crate) fn pre_activation(&self, i: usize, input: &ArrayView1<f64>) -> f64 {
        self.weights.row(i).dot(input) + self.biases[i]
    }
}

/// How a layer activates its units and turns the signal from above into
/// deltas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LayerKind {
    /// Sigmoid units. The signal from above is back-propagated error.
    Hidden,
    /// Softmax units. The signal from above is the one-hot target.
    Output,
}

impl LayerKind {
    pub fn activator(self) -> Activator {
        match self {
            LayerKind::Hidden => Activator::Sigmoid,
            LayerKind::Output => Activator::Softmax,
        }
    }

    /// The gradient of the loss with respect to the pre-activation of unit
    /// `i`.
    #[inline]
    pub fn delta(self, i: usize, output: &[f64], upper_info: &[f64]) -> f64 {
        match self {
            LayerKind::Hidden => upper_info[i] * sigmoid_prime(output[i]),
            LayerKind::Output => output[i] - upper_info[i],
        }
    }

    /// Takes one gradient step for a layer of this kind.
    ///
    /// `input` and `output` are the activations recorded on the forward pass
    /// and `upper_info` is the signal from the layer above. The step
    /// `-learning_rate * delta_i * input_j` is written into the targets of
    /// `gradients`.
    ///
    /// Returns the signal for the layer below, computed from the weights as
    /// they were before this step.
    pub fn parameter_gradients(
        self,
        input: &[f64],
        output: &[f64],
        upper_info: &[f64],
        learning_rate: f64,
        gradients: &mut ParameterGradients,
    ) -> Vec<f64> {
        let snapshot = gradients.snapshot();
        assert_eq!(input.len(), snapshot.input_len());
        assert_eq!(output.len(), snapshot.output_len());
        assert_eq!(upper_info.len(), snapshot.output_len());

        let deltas: Array1<f64> = (0..output.len())
            .into_par_iter()
            .map(|i| self.delta(i, output, upper_info))
            .collect::<Vec<_>>()
            .into();
        let lower_info = snapshot.weights.t().dot(&deltas).to_vec();

        let input = ArrayView1::from(input);
        let (weights, biases) = gradients.targets();
        Zip::from(weights.rows_mut())
            .and(biases)
            .and(&deltas)
            .par_for_each(|mut row, b, &d| {
                row.zip_mut_with(&input, |w, &x| *w -= learning_rate * (d * x));
                *b -= learning_rate * d;
            });
        lower_info
    }
}

/// A fully connected layer.
#[derive(Clone, Debug)]
pub struct Layer {
    kind: LayerKind,
    params: Parameters,
}

impl Layer {
    /// A hidden layer with randomly initialized weights.
    pub fn hidden<R>(inputs: usize, outputs: usize, rng: &mut R) -> Self
    where
        R: UniformSource + ?Sized,
    {
        Layer {
            kind: LayerKind::Hidden,
            params: Parameters::random(inputs, outputs, rng),
        }
    }

    /// An output layer. Its weights and biases start at zero.
    pub fn output(inputs: usize, outputs: usize) -> Self {
        Layer {
            kind: LayerKind::Output,
            params: Parameters::zeros(inputs, outputs),
        }
    }

    /// A layer reusing existing parameters.
    pub fn from_parameters(kind: LayerKind, params: Parameters) -> Self {
        Layer { kind, params }
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.params
    }

    /// Returns the number of inputs to this layer.
    pub fn input_len(&self) -> usize {
        self.params.input_len()
    }

    /// Returns the number of units in this layer.
    pub fn output_len(&self) -> usize {
        self.params.output_len()
    }

    /// Feeds `input` forward through the layer.
    pub fn compute(&self, input: &[f64]) -> Vec<f64> {
        let mut output = vec![0.0; self.output_len()];
        self.compute_into(input, &mut output);
        output
    }

    /// Feeds `input` forward through the layer, writing into `output`.
    pub fn compute_into(&self, input: &[f64], output: &mut [f64]) {
        assert_eq!(input.len(), self.input_len());
        assert_eq!(output.len(), self.output_len());
        let input = ArrayView1::from(input);
        self.kind
            .activator()
            .apply(|i| self.params.pre_activation(i, &input), output);
    }

    /// Takes one online gradient step, updating the weights in place.
    pub fn train_online(
        &mut self,
        input: &[f64],
        output: &[f64],
        upper_info: &[f64],
        learning_rate: f64,
    ) -> Vec<f64> {
        let kind = self.kind;
        let mut gradients = ParameterGradients::Online(&mut self.params);
        kind.parameter_gradients(input, output, upper_info, learning_rate, &mut gradients)
    }
}
