//! Two-phase training: greedy pretraining of every hidden layer, then
//! supervised fine-tuning of the whole stack.

use std::time::Instant;

use crate::autoencoder::DenoisingOptions;
use crate::dataset::{validate_samples, LearningSet};
use crate::error::{Error, Result};
use crate::gradient::LearningMode;
use crate::network::StackedNetwork;
use crate::random::UniformSource;

use tracing::info;

/// A builder for training stacked networks.
#[derive(Clone, Debug, PartialEq)]
pub struct Trainer {
    pretraining_epochs: usize,
    pretraining_rate: f64,
    corruption_levels: Vec<f64>,
    pretraining_mode: LearningMode,
    learning_rate: f64,
    learning_mode: LearningMode,
    logging: Logging,
    stop_condition: StopCondition,
}

impl Default for Trainer {
    fn default() -> Self {
        Trainer::new()
    }
}

impl Trainer {
    /// Creates a new Trainer instance.
    ///
    /// The trainer is initialized with some default values. These defaults are:
    ///
    /// * 15 pretraining epochs per hidden layer at a learning rate of 0.001.
    /// * Corruption levels of 0.1, 0.2 and 0.3 for three hidden layers.
    /// * A fine-tuning learning rate of 0.1.
    /// * Stochastic learning in both phases.
    /// * Stops fine-tuning once validation patience runs out.
    /// * Logs on training completion.
    pub fn new() -> Self {
        Trainer {
            pretraining_epochs: 15,
            pretraining_rate: 0.001,
            corruption_levels: vec![0.1, 0.2, 0.3],
            pretraining_mode: LearningMode::Stochastic,
            learning_rate: 0.1,
            learning_mode: LearningMode::Stochastic,
            logging: Logging::Completion,
            stop_condition: StopCondition::default(),
        }
    }

    /// Sets the number of pretraining passes for each hidden layer.
    pub fn pretraining_epochs(mut self, epochs: usize) -> Self {
        self.pretraining_epochs = epochs;
        self
    }

    /// Sets the learning rate used while pretraining.
    pub fn pretraining_rate(mut self, rate: f64) -> Self {
        self.pretraining_rate = rate;
        self
    }

    /// Sets the corruption level of each hidden layer, bottom first.
    pub fn corruption_levels<I>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        self.corruption_levels = levels.into_iter().collect();
        self
    }

    /// Sets the `LearningMode` to use for pretraining.
    pub fn pretraining_mode(mut self, mode: LearningMode) -> Self {
        self.pretraining_mode = mode;
        self
    }

    /// Sets the learning rate to use during fine-tuning.
    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    /// Sets the `LearningMode` to use for fine-tuning.
    pub fn learning_mode(mut self, mode: LearningMode) -> Self {
        self.learning_mode = mode;
        self
    }

    /// Sets the type of logging to be emitted during training.
    pub fn logging(mut self, logging: Logging) -> Self {
        self.logging = logging;
        self
    }

    /// Sets the condition to finish fine-tuning.
    pub fn stop_condition<C>(mut self, condition: C) -> Self
    where
        C: Into<StopCondition>,
    {
        self.stop_condition = condition.into();
        self
    }

    /// Pretrains and then fine-tunes `network` on `set`.
    ///
    /// Everything is validated before the network is touched, so an error
    /// leaves it unchanged.
    pub fn train<R>(
        &self,
        network: &mut StackedNetwork,
        set: &LearningSet,
        rng: &mut R,
    ) -> Result<TrainingReport>
    where
        R: UniformSource + ?Sized,
    {
        self.validate(network, set)?;
        let start_time = Instant::now();
        let mut report = TrainingReport::default();

        for (layer, &noise) in self.corruption_levels.iter().enumerate() {
            let options = DenoisingOptions {
                learning_rate: self.pretraining_rate,
                noise,
                mode: self.pretraining_mode,
            };
            let costs =
                network.pretrain(layer, set.training(), self.pretraining_epochs, &options, rng)?;
            for (epoch, &cost) in costs.iter().enumerate() {
                self.logging.pretraining_epoch(layer, epoch + 1, cost);
            }
            report.pretraining_costs.push(costs);
        }

        let batches = match self.learning_mode {
            LearningMode::Stochastic => set.training().len(),
            LearningMode::Batch(size) => (set.training().len() - 1) / size + 1,
        };
        let mut patience = self.stop_condition.initial_patience(batches);
        let mut best = f64::INFINITY;
        let mut epoch = 0;
        while !self
            .stop_condition
            .should_stop(epoch, batches.saturating_mul(epoch), patience)
        {
            let cost = network.fine_tune(set.training(), self.learning_rate, self.learning_mode)?;
            epoch += 1;
            report.fine_tuning_costs.push(cost);

            let validation = if set.validation().is_empty() {
                None
            } else {
                Some(network.error_rate(set.validation())?)
            };
            self.logging.epoch(epoch, cost, validation);

            let iteration = batches * epoch - 1;
            if let Some(error) = validation {
                if error < best {
                    if let StopCondition::Patience {
                        patience_increase,
                        improvement_threshold,
                        ..
                    } = self.stop_condition
                    {
                        if error < best * improvement_threshold {
                            patience = patience.max(iteration.saturating_mul(patience_increase));
                        }
                    }
                    best = error;
                    report.best_validation_error = Some(error);
                    report.best_epoch = epoch;
                    if !set.test().is_empty() {
                        let test_error = network.error_rate(set.test())?;
                        self.logging.improvement(epoch, test_error);
                        report.test_error = Some(test_error);
                    }
                }
            }
        }
        report.epochs = epoch;
        self.logging.completion(&report, start_time);
        Ok(report)
    }

    /// Verifies that all provided inputs to the `Trainer` are valid, returning
    /// an error if something is wrong.
    fn validate(&self, network: &StackedNetwork, set: &LearningSet) -> Result<()> {
        let classes = network.classes().ok_or(Error::NotFinalized)?;
        let hidden = network.hidden_layers().len();
        if self.corruption_levels.len() != hidden {
            return Err(Error::CorruptionLevels {
                expected: hidden,
                actual: self.corruption_levels.len(),
            });
        }
        for &noise in &self.corruption_levels {
            DenoisingOptions {
                learning_rate: self.pretraining_rate,
                noise,
                mode: self.pretraining_mode,
            }
            .validate()?;
        }
        self.learning_mode.validate()?;

        if set.training().is_empty() {
            return Err(Error::EmptyDataset);
        }
        if let StopCondition::Patience { .. } = self.stop_condition {
            if set.validation().is_empty() {
                return Err(Error::EmptyDataset);
            }
        }
        for samples in [set.training(), set.validation(), set.test()] {
            validate_samples(samples, network.input_len(), classes)?;
        }
        Ok(())
    }
}

/// What happened during a `Trainer::train` run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingReport {
    /// Reconstruction cost of every pretraining pass, one list per hidden
    /// layer.
    pub pretraining_costs: Vec<Vec<f64>>,
    /// Mean cross-entropy of every fine-tuning pass.
    pub fine_tuning_costs: Vec<f64>,
    /// Number of fine-tuning passes run.
    pub epochs: usize,
    /// Lowest validation error seen, if there is validation data.
    pub best_validation_error: Option<f64>,
    /// The pass that reached `best_validation_error`.
    pub best_epoch: usize,
    /// Test error measured when the best validation error was reached.
    pub test_error: Option<f64>,
}

/// Logging frequency to use during training
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Logging {
    /// No logs will be emitted
    Silent,
    /// A summary will be emitted at completion
    Completion,
    /// A summary will be emitted after every `n` epochs of each phase
    Epochs(usize),
}

impl Default for Logging {
    fn default() -> Self {
        Logging::Completion
    }
}

impl Logging {
    fn is_due(&self, epoch: usize) -> bool {
        match *self {
            Logging::Epochs(freq) => freq > 0 && epoch % freq == 0,
            _ => false,
        }
    }

    fn pretraining_epoch(&self, layer: usize, epoch: usize, cost: f64) {
        if self.is_due(epoch) {
            info!(layer, epoch, cost, "pretraining");
        }
    }

    fn epoch(&self, epoch: usize, cost: f64, validation_error: Option<f64>) {
        if self.is_due(epoch) {
            info!(epoch, cost, ?validation_error, "fine-tuning");
        }
    }

    fn logs_improvements(&self) -> bool {
        *self != Logging::Silent
    }

    fn improvement(&self, epoch: usize, test_error: f64) {
        if self.logs_improvements() {
            info!(epoch, test_error, "test error of best model");
        }
    }

    /// Performs logging at the end of training.
    fn completion(&self, report: &TrainingReport, start_time: Instant) {
        if let Logging::Silent = self {
            return;
        }
        info!(
            epochs = report.epochs,
            seconds = start_time.elapsed().as_secs_f64(),
            best_validation_error = ?report.best_validation_error,
            best_epoch = report.best_epoch,
            test_error = ?report.test_error,
            "training complete"
        );
    }
}

/// When to stop fine-tuning
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StopCondition {
    /// Stops after the provided number of fine-tuning epochs
    Epochs(usize),
    /// Stops once the validation error stops improving
    ///
    /// Training is allowed ten epochs' worth of batches up front. Whenever the
    /// validation error drops below `improvement_threshold` times the best so
    /// far, patience grows to `patience_increase` times the batches seen.
    /// Never runs more than `max_epochs` epochs.
    Patience {
        patience_increase: usize,
        improvement_threshold: f64,
        max_epochs: usize,
    },
}

impl Default for StopCondition {
    fn default() -> Self {
        StopCondition::Patience {
            patience_increase: 2,
            improvement_threshold: 0.995,
            max_epochs: 1000,
        }
    }
}

impl From<usize> for StopCondition {
    fn from(epochs: usize) -> StopCondition {
        StopCondition::Epochs(epochs)
    }
}

impl StopCondition {
    fn initial_patience(&self, batches: usize) -> usize {
        match *self {
            StopCondition::Epochs(_) => 0,
            StopCondition::Patience { .. } => batches.saturating_mul(10),
        }
    }

    /// Returns true if no further epoch should run, given the epochs and
    /// batch iterations completed so far.
    fn should_stop(&self, epoch: usize, iterations: usize, patience: usize) -> bool {
        match *self {
            StopCondition::Epochs(epochs) => epoch >= epochs,
            StopCondition::Patience { max_epochs, .. } => {
                iterations > patience || epoch >= max_epochs
            }
        }
    }
}
