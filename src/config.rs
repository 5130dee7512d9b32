//! Serializable description of a whole training experiment.

use crate::autoencoder::DenoisingOptions;
use crate::dataset::LearningSet;
use crate::error::{Error, Result};
use crate::gradient::LearningMode;
use crate::network::StackedNetwork;
use crate::trainer::{Logging, StopCondition, Trainer, TrainingReport};

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Settings for the pretraining phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PretrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    /// One corruption level per hidden layer, bottom first.
    pub corruption_levels: Vec<f64>,
    pub mode: LearningMode,
}

impl Default for PretrainingConfig {
    fn default() -> Self {
        PretrainingConfig {
            epochs: 15,
            learning_rate: 0.001,
            corruption_levels: vec![0.1, 0.2, 0.3],
            mode: LearningMode::Stochastic,
        }
    }
}

/// Settings for the fine-tuning phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FineTuningConfig {
    pub learning_rate: f64,
    pub mode: LearningMode,
    pub stop_condition: StopCondition,
}

impl Default for FineTuningConfig {
    fn default() -> Self {
        FineTuningConfig {
            learning_rate: 0.1,
            mode: LearningMode::Stochastic,
            stop_condition: StopCondition::default(),
        }
    }
}

/// Hidden layer widths plus everything needed to train them.
///
/// Input width and class count come from the `LearningSet`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub hidden_layers: Vec<usize>,
    pub pretraining: PretrainingConfig,
    pub fine_tuning: FineTuningConfig,
    pub logging: Logging,
    /// Seed for weight initialization and input corruption.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            hidden_layers: vec![100, 45, 45],
            pretraining: PretrainingConfig::default(),
            fine_tuning: FineTuningConfig::default(),
            logging: Logging::Completion,
            seed: 89677,
        }
    }
}

impl TrainingConfig {
    /// Checks the settings that do not depend on the data.
    pub fn validate(&self) -> Result<()> {
        if self.hidden_layers.iter().any(|&width| width == 0) {
            return Err(Error::ZeroWidth);
        }
        let levels = &self.pretraining.corruption_levels;
        if levels.len() != self.hidden_layers.len() {
            return Err(Error::CorruptionLevels {
                expected: self.hidden_layers.len(),
                actual: levels.len(),
            });
        }
        for &noise in levels {
            DenoisingOptions {
                learning_rate: self.pretraining.learning_rate,
                noise,
                mode: self.pretraining.mode,
            }
            .validate()?;
        }
        self.fine_tuning.mode.validate()
    }

    /// A trainer carrying these settings.
    pub fn trainer(&self) -> Trainer {
        Trainer::new()
            .pretraining_epochs(self.pretraining.epochs)
            .pretraining_rate(self.pretraining.learning_rate)
            .corruption_levels(self.pretraining.corruption_levels.iter().copied())
            .pretraining_mode(self.pretraining.mode)
            .learning_rate(self.fine_tuning.learning_rate)
            .learning_mode(self.fine_tuning.mode)
            .stop_condition(self.fine_tuning.stop_condition)
            .logging(self.logging)
    }

    /// Builds a network for `set` and trains it.
    pub fn run(&self, set: &LearningSet) -> Result<(StackedNetwork, TrainingReport)> {
        self.validate()?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut layer_sizes = Vec::with_capacity(self.hidden_layers.len() + 2);
        layer_sizes.push(set.input_len());
        layer_sizes.extend_from_slice(&self.hidden_layers);
        layer_sizes.push(set.classes());

        let mut network = StackedNetwork::from_layer_sizes(&layer_sizes, &mut rng)?;
        let report = self.trainer().train(&mut network, set, &mut rng)?;
        Ok((network, report))
    }
}
