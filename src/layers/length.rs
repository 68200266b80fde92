use ndarray::{Array, ArrayBase, ArrayD, ArrayViewD, Axis, Data, RemoveAxis};

use super::traits::{check_arity, Layer};
use crate::error::{CapsError, Result};

/// Converts capsules into scalar activations: the Euclidean norm of each
/// vector along the last axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct Length;

impl Length {
    pub fn new() -> Self {
        Length
    }

    /// `[..., num_capsules, capsule_dim]` -> `[..., num_capsules]`
    pub fn forward<S, D>(&self, capsules: &ArrayBase<S, D>) -> Result<Array<f32, D::Smaller>>
    where
        S: Data<Elem = f32>,
        D: RemoveAxis,
    {
        if capsules.ndim() == 0 {
            return Err(rank_zero());
        }
        let last = Axis(capsules.ndim() - 1);
        Ok(capsules.map_axis(last, |v| v.dot(&v).sqrt()))
    }

    pub fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        match input_shape.split_last() {
            Some((_, leading)) => Ok(leading.to_vec()),
            None => Err(rank_zero()),
        }
    }
}

fn rank_zero() -> CapsError {
    CapsError::RankMismatch {
        expected: "rank >= 1".to_string(),
        actual: "rank 0".to_string(),
    }
}

impl Layer for Length {
    fn name(&self) -> &str {
        "length"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[ArrayViewD<f32>]) -> Result<ArrayD<f32>> {
        check_arity(self.arity(), inputs.len())?;
        Length::forward(self, &inputs[0])
    }

    fn output_shape(&self, input_shapes: &[&[usize]]) -> Result<Vec<usize>> {
        check_arity(self.arity(), input_shapes.len())?;
        Length::output_shape(self, input_shapes[0])
    }
}
