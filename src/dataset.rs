//! Labelled samples and the training/validation/test split they come in.

use crate::error::{Error, Result};

/// A labelled feature vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    label: usize,
    image: Vec<f64>,
}

impl Sample {
    pub fn new(label: usize, image: Vec<f64>) -> Self {
        Sample { label, image }
    }

    pub fn label(&self) -> usize {
        self.label
    }

    pub fn image(&self) -> &[f64] {
        &self.image
    }
}

/// Checks that every sample has `input_len` features and a label below
/// `classes`.
pub fn validate_samples(samples: &[Sample], input_len: usize, classes: usize) -> Result<()> {
    for sample in samples {
        if sample.image.len() != input_len {
            return Err(Error::InputLength {
                expected: input_len,
                actual: sample.image.len(),
            });
        }
        if sample.label >= classes {
            return Err(Error::LabelOutOfRange {
                label: sample.label,
                classes,
            });
        }
    }
    Ok(())
}

/// Samples split into training, validation and test collections, with the
/// geometry of their images.
#[derive(Clone, Debug)]
pub struct LearningSet {
    training: Vec<Sample>,
    validation: Vec<Sample>,
    test: Vec<Sample>,
    rows: usize,
    columns: usize,
    classes: usize,
}

impl LearningSet {
    /// Builds a learning set from images of `rows` x `columns` features
    /// labelled with one of `classes` classes.
    pub fn new(
        training: Vec<Sample>,
        validation: Vec<Sample>,
        test: Vec<Sample>,
        rows: usize,
        columns: usize,
        classes: usize,
    ) -> Result<Self> {
        if rows == 0 || columns == 0 || classes == 0 {
            return Err(Error::ZeroWidth);
        }
        for samples in [&training, &validation, &test] {
            validate_samples(samples, rows * columns, classes)?;
        }
        Ok(LearningSet {
            training,
            validation,
            test,
            rows,
            columns,
            classes,
        })
    }

    /// Returns a copy holding at most the first `training`, `validation` and
    /// `test` samples of each collection.
    pub fn subset(&self, training: usize, validation: usize, test: usize) -> Self {
        fn head(samples: &[Sample], n: usize) -> Vec<Sample> {
            samples[..n.min(samples.len())].to_vec()
        }
        LearningSet {
            training: head(&self.training, training),
            validation: head(&self.validation, validation),
            test: head(&self.test, test),
            ..*self
        }
    }

    pub fn training(&self) -> &[Sample] {
        &self.training
    }

    pub fn validation(&self) -> &[Sample] {
        &self.validation
    }

    pub fn test(&self) -> &[Sample] {
        &self.test
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Number of features in every image.
    pub fn input_len(&self) -> usize {
        self.rows * self.columns
    }

    pub fn classes(&self) -> usize {
        self.classes
    }
}
