//! Stacked denoising autoencoders.
//!
//! Hidden layers are pretrained greedily, bottom first, as denoising
//! autoencoders sharing their weights with the stack. The stack is then
//! fine-tuned end to end as a softmax classifier.

#[macro_use]
extern crate serde_derive;

pub mod activator;
pub mod autoencoder;
pub mod config;
pub mod dataset;
pub mod error;
pub mod gradient;
pub mod layer;
pub mod network;
pub mod random;
pub mod trainer;

mod utils;

pub use crate::autoencoder::{DenoisingAutoencoder, DenoisingOptions};
pub use crate::config::TrainingConfig;
pub use crate::dataset::{LearningSet, Sample};
pub use crate::error::{Error, Result};
pub use crate::gradient::LearningMode;
pub use crate::layer::{Layer, LayerKind, Parameters};
pub use crate::network::StackedNetwork;
pub use crate::random::UniformSource;
pub use crate::trainer::{Logging, StopCondition, Trainer, TrainingReport};
