use ndarray::{ArrayD, ArrayViewD};

use crate::error::{CapsError, Result};

/// Trait defining the interface a host graph uses to drive a layer.
///
/// Tensors cross this boundary dynamically ranked; each implementation
/// checks the arity and ranks it needs before doing any work.
pub trait Layer: Send + Sync {
    /// Short name of the layer kind
    fn name(&self) -> &str;

    /// Number of input tensors the layer consumes
    fn arity(&self) -> usize;

    /// Perform forward propagation for a batch of inputs
    fn forward(&mut self, inputs: &[ArrayViewD<f32>]) -> Result<ArrayD<f32>>;

    /// Infer the output shape from the input shapes
    fn output_shape(&self, input_shapes: &[&[usize]]) -> Result<Vec<usize>>;
}

/// Reject an input list whose length differs from `expected`.
pub(crate) fn check_arity(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(CapsError::ArityMismatch { expected, actual });
    }
    Ok(())
}
