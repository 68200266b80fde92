use ndarray::{Array2, Array3, ArrayD, ArrayView2, ArrayView3, ArrayViewD, Axis, Ix2, Ix3, Zip};

use super::length::Length;
use super::traits::{check_arity, Layer};
use crate::error::{CapsError, Result};

/// Keeps only the capsules picked by a selector and flattens the result,
/// feeding a reconstruction decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mask;

impl Mask {
    pub fn new() -> Self {
        Mask
    }

    /// `capsules [batch, num_capsules, capsule_dim]` times
    /// `selector [batch, num_capsules]`, flattened to
    /// `[batch, num_capsules * capsule_dim]`.
    pub fn forward(
        &self,
        capsules: ArrayView3<f32>,
        selector: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        let (batch, num_capsules, capsule_dim) = capsules.dim();
        if selector.dim() != (batch, num_capsules) {
            return Err(CapsError::shape_mismatch(
                format!("selector [{}, {}]", batch, num_capsules),
                format!("selector {:?}", selector.shape()),
            ));
        }

        let mut masked = Array3::<f32>::zeros((batch, num_capsules, capsule_dim));
        Zip::from(&mut masked)
            .and(&capsules)
            .and_broadcast(&selector.insert_axis(Axis(2)))
            .for_each(|m, &c, &s| *m = c * s);

        Ok(masked.into_shape((batch, num_capsules * capsule_dim))?)
    }

    /// Mask with the capsule of greatest length, for inference without labels.
    pub fn forward_predicted(&self, capsules: ArrayView3<f32>) -> Result<Array2<f32>> {
        let selector = one_hot_from_lengths(capsules)?;
        self.forward(capsules, selector.view())
    }

    pub fn output_shape(
        &self,
        capsules_shape: &[usize],
        selector_shape: &[usize],
    ) -> Result<Vec<usize>> {
        if capsules_shape.len() != 3 {
            return Err(CapsError::rank_mismatch(3, capsules_shape));
        }
        if selector_shape.len() != 2 {
            return Err(CapsError::rank_mismatch(2, selector_shape));
        }
        if selector_shape != &capsules_shape[..2] {
            return Err(CapsError::shape_mismatch(
                format!("selector {:?}", &capsules_shape[..2]),
                format!("selector {:?}", selector_shape),
            ));
        }
        Ok(vec![capsules_shape[0], capsules_shape[1] * capsules_shape[2]])
    }
}

/// One-hot selector `[batch, num_capsules]` marking the longest capsule of
/// each sample. Ties go to the lowest index.
pub fn one_hot_from_lengths(capsules: ArrayView3<f32>) -> Result<Array2<f32>> {
    let lengths = Length::new().forward(&capsules)?;
    let mut selector = Array2::<f32>::zeros(lengths.dim());
    for (row, mut out) in lengths.rows().into_iter().zip(selector.rows_mut()) {
        let best = row
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
                Some((_, b)) if b >= v => best,
                _ => Some((i, v)),
            });
        if let Some((i, _)) = best {
            out[i] = 1.0;
        }
    }
    Ok(selector)
}

impl Layer for Mask {
    fn name(&self) -> &str {
        "mask"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&mut self, inputs: &[ArrayViewD<f32>]) -> Result<ArrayD<f32>> {
        check_arity(self.arity(), inputs.len())?;
        let capsules = inputs[0]
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|_| CapsError::rank_mismatch(3, inputs[0].shape()))?;
        let selector = inputs[1]
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| CapsError::rank_mismatch(2, inputs[1].shape()))?;
        Ok(Mask::forward(self, capsules, selector)?.into_dyn())
    }

    fn output_shape(&self, input_shapes: &[&[usize]]) -> Result<Vec<usize>> {
        check_arity(self.arity(), input_shapes.len())?;
        Mask::output_shape(self, input_shapes[0], input_shapes[1])
    }
}
