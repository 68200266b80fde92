use ndarray::{Array, ArrayBase, Axis, Data, Dimension};

/// Softmax along `axis`, max-subtracted for numerical stability.
///
/// Every lane along `axis` of the result sums to one.
pub fn softmax<S, D>(x: &ArrayBase<S, D>, axis: Axis) -> Array<f32, D>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let mut output = x.to_owned();
    for mut lane in output.lanes_mut(axis) {
        let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        lane.mapv_inplace(|v| (v - max).exp());
        let sum = lane.sum();
        lane.mapv_inplace(|v| v / sum);
    }
    output
}
