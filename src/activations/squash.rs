use ndarray::{Array, ArrayBase, ArrayViewMut1, Axis, Data, Dimension};

/// Default stabilizing constant added under the square root of the norm.
pub const EPSILON: f32 = 1e-7;

/// Squash every vector along `axis` using the default [`EPSILON`].
///
/// `squash(x) = |x|^2 / (1 + |x|^2) * x / sqrt(|x|^2 + eps)`
///
/// The result has the same shape and direction as `x`, with every vector
/// norm in `[0, 1)`. Once `|x|^2` rounds to 1 in the scaling factor the
/// norm is 1 up to `f32` rounding, including vectors whose squared norm
/// overflows `f32`.
///
/// # Panics
/// If `axis` is out of bounds for `x`.
pub fn squash<S, D>(x: &ArrayBase<S, D>, axis: Axis) -> Array<f32, D>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    squash_with_epsilon(x, axis, EPSILON)
}

/// Squash with an explicit stabilizing constant.
pub fn squash_with_epsilon<S, D>(x: &ArrayBase<S, D>, axis: Axis, epsilon: f32) -> Array<f32, D>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let mut output = x.to_owned();
    for mut lane in output.lanes_mut(axis) {
        let squared_norm: f32 = lane.iter().map(|v| v * v).sum();
        if squared_norm.is_finite() {
            let safe_norm = (squared_norm + epsilon).sqrt();
            let factor = squared_norm / (1.0 + squared_norm) / safe_norm;
            lane.mapv_inplace(|v| v * factor);
        } else {
            normalize_rescaled(lane);
        }
    }
    output
}

/// Unit vector of a lane whose squared norm overflows.
///
/// The squash factor is 1 at that magnitude, so only the direction is left.
/// Dividing by the largest component first keeps the sum of squares finite.
/// Lanes holding NaN or infinite components stay non-finite.
fn normalize_rescaled(mut lane: ArrayViewMut1<f32>) {
    let scale = lane.fold(0.0f32, |m, &v| m.max(v.abs()));
    let scaled_norm = lane
        .iter()
        .map(|v| (v / scale) * (v / scale))
        .sum::<f32>()
        .sqrt();
    lane.mapv_inplace(|v| v / scale / scaled_norm);
}

/// The squash non-linearity as a value, carrying its epsilon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Squash {
    pub epsilon: f32,
}

impl Squash {
    pub fn new(epsilon: f32) -> Self {
        Squash { epsilon }
    }

    pub fn apply<S, D>(&self, x: &ArrayBase<S, D>, axis: Axis) -> Array<f32, D>
    where
        S: Data<Elem = f32>,
        D: Dimension,
    {
        squash_with_epsilon(x, axis, self.epsilon)
    }
}

impl Default for Squash {
    fn default() -> Self {
        Squash { epsilon: EPSILON }
    }
}
