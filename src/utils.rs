use ndarray::{ArrayBase, DataMut, Dimension};

/// A trait to replace all elements in a container with zeros.
pub trait ZeroOut {
    fn zero_out(&mut self);
}

impl ZeroOut for f64 {
    fn zero_out(&mut self) {
        *self = 0.0;
    }
}

impl<T> ZeroOut for [T]
where
    T: ZeroOut,
{
    fn zero_out(&mut self) {
        for elem in self {
            elem.zero_out();
        }
    }
}

impl<T> ZeroOut for Vec<T>
where
    T: ZeroOut,
{
    fn zero_out(&mut self) {
        self.as_mut_slice().zero_out();
    }
}

impl<S, D> ZeroOut for ArrayBase<S, D>
where
    S: DataMut<Elem = f64>,
    D: Dimension,
{
    fn zero_out(&mut self) {
        self.fill(0.0);
    }
}

/// Index of the largest value. Ties go to the lowest index.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Splits activations into the input and output of layer `layer`.
pub fn io_layers(activations: &[Vec<f64>], layer: usize) -> (&[f64], &[f64]) {
    let (before, after) = activations[layer..].split_at(1);
    (&before[0], &after[0])
}
