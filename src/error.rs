//! Errors reported while building or training a network.

use thiserror::Error;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural and configuration errors.
///
/// Every variant is detected before any parameter is touched, so a failed
/// call never leaves a network half built or half trained.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A network needs an input width and at least one more layer width.
    #[error("a network needs at least 2 layer widths, got {0}")]
    TooFewLayers(usize),

    /// Layers with no units cannot be built.
    #[error("layer widths must be non-zero")]
    ZeroWidth,

    /// The output layer has been added, hidden layers are frozen.
    #[error("the output layer is already set, hidden layers can no longer change")]
    Finalized,

    /// The operation needs the output layer, which has not been added yet.
    #[error("the output layer has not been set")]
    NotFinalized,

    /// No hidden layer exists at this index.
    #[error("hidden layer index {index} is out of range for {count} hidden layers")]
    LayerIndex { index: usize, count: usize },

    /// The layer at this index is the output layer, not a hidden one.
    #[error("layer {0} is not a hidden layer")]
    NotHidden(usize),

    /// Supplied weights do not fit between the neighbouring layers.
    #[error("expected a {expected_rows}x{expected_cols} weight matrix, got {rows}x{cols}")]
    WeightShape {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    /// Supplied biases do not match the number of units.
    #[error("expected {expected} biases, got {actual}")]
    BiasShape { expected: usize, actual: usize },

    /// A sample's feature vector does not match the network input.
    #[error("expected an input of length {expected}, got {actual}")]
    InputLength { expected: usize, actual: usize },

    /// A sample's label has no matching output unit.
    #[error("label {label} is out of range for {classes} classes")]
    LabelOutOfRange { label: usize, classes: usize },

    /// Batches must hold at least one sample.
    #[error("batch size must be at least 1")]
    ZeroBatchSize,

    /// Corruption levels are probabilities.
    #[error("corruption level {0} is outside [0, 1]")]
    InvalidNoise(f64),

    /// Pretraining needs one corruption level per hidden layer.
    #[error("expected {expected} corruption levels, got {actual}")]
    CorruptionLevels { expected: usize, actual: usize },

    /// The operation needs at least one sample.
    #[error("dataset is empty")]
    EmptyDataset,
}
