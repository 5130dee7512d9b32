//! Where a gradient step lands: straight into the live parameters, or into
//! a buffer that is averaged in once a batch is done.

use crate::error::{Error, Result};
use crate::layer::Parameters;
use crate::utils::ZeroOut;

use ndarray::{Array1, Array2, Zip};

/// The learning mode to use for training
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LearningMode {
    /// Apply weight updates after every training example
    Stochastic,
    /// Apply the averaged weight updates once per batch of the provided size
    ///
    /// A trailing partial batch is averaged over its own length.
    Batch(usize),
}

impl LearningMode {
    pub fn validate(self) -> Result<()> {
        match self {
            LearningMode::Batch(0) => Err(Error::ZeroBatchSize),
            _ => Ok(()),
        }
    }
}

impl Default for LearningMode {
    fn default() -> Self {
        LearningMode::Stochastic
    }
}

/// Accumulated steps for one layer over a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct GradientBuffer {
    weights: Array2<f64>,
    biases: Array1<f64>,
}

impl GradientBuffer {
    /// Returns an empty buffer shaped like `params`.
    pub fn new(params: &Parameters) -> Self {
        GradientBuffer {
            weights: Array2::zeros(params.weights().raw_dim()),
            biases: Array1::zeros(params.biases().raw_dim()),
        }
    }

    /// Adds the mean of the accumulated steps over `count` samples into
    /// `params` and empties the buffer.
    pub fn update_parameters(&mut self, params: &mut Parameters, count: usize) {
        assert!(count > 0);
        assert_eq!(self.weights.dim(), params.weights.dim());
        let count = count as f64;
        Zip::from(&mut params.weights)
            .and(&self.weights)
            .par_for_each(|w, &g| *w += g / count);
        Zip::from(&mut params.biases)
            .and(&self.biases)
            .for_each(|b, &g| *b += g / count);
        self.zero_out();
    }

    /// Returns true if nothing has been accumulated since the last update.
    pub fn is_empty(&self) -> bool {
        self.weights.iter().chain(self.biases.iter()).all(|&g| g == 0.0)
    }
}

impl ZeroOut for GradientBuffer {
    fn zero_out(&mut self) {
        self.weights.zero_out();
        self.biases.zero_out();
    }
}

/// The destination of one layer's gradient step.
#[derive(Debug)]
pub enum ParameterGradients<'a> {
    /// Steps are applied to the live parameters immediately.
    Online(&'a mut Parameters),
    /// Steps accumulate in `buffer`. Every read during the batch sees
    /// `snapshot`, the parameters as they were when the batch started.
    Batch {
        snapshot: &'a Parameters,
        buffer: &'a mut GradientBuffer,
    },
}

impl<'a> ParameterGradients<'a> {
    /// The parameters gradients are computed against.
    pub fn snapshot(&self) -> &Parameters {
        match self {
            ParameterGradients::Online(params) => &**params,
            ParameterGradients::Batch { snapshot, .. } => *snapshot,
        }
    }

    /// The weights and biases a step is written into.
    pub fn targets(&mut self) -> (&mut Array2<f64>, &mut Array1<f64>) {
        match self {
            ParameterGradients::Online(params) => (&mut params.weights, &mut params.biases),
            ParameterGradients::Batch { buffer, .. } => (&mut buffer.weights, &mut buffer.biases),
        }
    }
}
