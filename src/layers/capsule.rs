//! Capsule transformation and routing-by-agreement.
//!
//! Lower-level capsules `[batch, input_num_capsules, input_capsule_dim]` are
//! projected into one vote per output capsule through the transformation
//! matrix `W`, then pooled into `[batch, num_capsules, capsule_dim]` output
//! capsules by iteratively reweighting votes that agree with the pooled
//! estimate.

use ndarray::{
    Array3, Array4, Array5, ArrayD, ArrayView3, ArrayView5, ArrayViewD, ArrayViewMut5, Axis, Ix3,
    Zip,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, trace};

use super::initialization::WeightInit;
use super::traits::{check_arity, Layer};
use crate::activations::{softmax, Squash};
use crate::config::CapsuleConfig;
use crate::error::{CapsError, Result};

/// Lifecycle of the transformation matrix.
///
/// The only transition is `Uninitialized -> Initialized`, taken once when
/// the first input shape is known.
#[derive(Debug, Clone)]
enum CapsuleState {
    Uninitialized,
    Initialized { weights: Array5<f32> },
}

/// Result of a routing pass with the intermediate routing state exposed.
#[derive(Debug, Clone)]
pub struct RoutingOutput {
    /// Output capsules `[batch, num_capsules, capsule_dim]`
    pub capsules: Array3<f32>,

    /// Coupling coefficients of the final pass `[batch, input_num_capsules, num_capsules, 1]`
    pub coupling: Array4<f32>,

    /// Routing logits the final pass was computed from, same shape as `coupling`
    pub logits: Array4<f32>,
}

/// Capsule layer with dynamic routing between capsules
#[derive(Debug, Clone)]
pub struct CapsuleLayer {
    config: CapsuleConfig,
    squash: Squash,
    state: CapsuleState,
}

impl CapsuleLayer {
    /// Create a new capsule layer.
    ///
    /// # Arguments
    /// * `num_capsules` - Number of output capsules
    /// * `capsule_dim` - Dimension of each output capsule
    /// * `routing_iterations` - Number of routing passes, at least one
    /// * `weight_init` - Distribution for the transformation matrix
    pub fn new(
        num_capsules: usize,
        capsule_dim: usize,
        routing_iterations: usize,
        weight_init: WeightInit,
    ) -> Result<Self> {
        let mut config = CapsuleConfig::new(num_capsules, capsule_dim, routing_iterations);
        config.weight_init = weight_init;
        Self::from_config(config)
    }

    pub fn from_config(config: CapsuleConfig) -> Result<Self> {
        config.validate()?;
        Ok(CapsuleLayer {
            squash: Squash::new(config.epsilon),
            config,
            state: CapsuleState::Uninitialized,
        })
    }

    /// Install an externally supplied transformation matrix.
    ///
    /// `weights` must have shape
    /// `[1, input_num_capsules, num_capsules, capsule_dim, input_capsule_dim]`.
    /// On an already built layer the shape must equal the allocated one.
    pub fn with_weights(mut self, weights: Array5<f32>) -> Result<Self> {
        let (lead, _, num_capsules, capsule_dim, _) = weights.dim();
        if lead != 1
            || num_capsules != self.config.num_capsules
            || capsule_dim != self.config.capsule_dim
        {
            return Err(CapsError::shape_mismatch(
                format!(
                    "[1, input_num_capsules, {}, {}, input_capsule_dim]",
                    self.config.num_capsules, self.config.capsule_dim
                ),
                format!("{:?}", weights.shape()),
            ));
        }

        if let CapsuleState::Initialized { weights: current } = &self.state {
            if current.shape() != weights.shape() {
                return Err(CapsError::shape_mismatch(
                    format!("{:?}", current.shape()),
                    format!("{:?}", weights.shape()),
                ));
            }
        }

        self.state = CapsuleState::Initialized { weights };
        Ok(self)
    }

    pub fn config(&self) -> &CapsuleConfig {
        &self.config
    }

    pub fn num_capsules(&self) -> usize {
        self.config.num_capsules
    }

    pub fn capsule_dim(&self) -> usize {
        self.config.capsule_dim
    }

    pub fn routing_iterations(&self) -> usize {
        self.config.routing_iterations
    }

    pub fn is_built(&self) -> bool {
        matches!(self.state, CapsuleState::Initialized { .. })
    }

    /// Number of input capsules `W` was allocated for
    pub fn input_num_capsules(&self) -> Option<usize> {
        self.weights().map(|w| w.shape()[1])
    }

    /// Input capsule dimension `W` was allocated for
    pub fn input_capsule_dim(&self) -> Option<usize> {
        self.weights().map(|w| w.shape()[4])
    }

    /// Get reference to the transformation matrix
    pub fn weights(&self) -> Option<ArrayView5<'_, f32>> {
        match &self.state {
            CapsuleState::Initialized { weights } => Some(weights.view()),
            CapsuleState::Uninitialized => None,
        }
    }

    /// Get mutable access to the transformation matrix for parameter updates.
    /// The view cannot change the allocated shape.
    pub fn weights_mut(&mut self) -> Option<ArrayViewMut5<'_, f32>> {
        match &mut self.state {
            CapsuleState::Initialized { weights } => Some(weights.view_mut()),
            CapsuleState::Uninitialized => None,
        }
    }

    /// Allocate `W` for `input_shape = [batch, input_num_capsules, input_capsule_dim]`.
    ///
    /// Repeating the call with the same trailing dimensions is a no-op;
    /// different trailing dimensions are rejected and never reallocate.
    pub fn build(&mut self, input_shape: &[usize]) -> Result<()> {
        if input_shape.len() != 3 {
            return Err(CapsError::rank_mismatch(3, input_shape));
        }
        let (input_num_capsules, input_capsule_dim) = (input_shape[1], input_shape[2]);

        if let CapsuleState::Initialized { weights } = &self.state {
            return check_trailing_dims(weights, input_shape);
        }

        let shape = (
            1,
            input_num_capsules,
            self.config.num_capsules,
            self.config.capsule_dim,
            input_capsule_dim,
        );
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let weights = self.config.weight_init.initialize_transform(shape, &mut rng)?;

        debug!(
            input_num_capsules,
            input_capsule_dim,
            num_capsules = self.config.num_capsules,
            capsule_dim = self.config.capsule_dim,
            init = ?self.config.weight_init,
            "allocated capsule transformation matrix"
        );
        self.state = CapsuleState::Initialized { weights };
        Ok(())
    }

    /// Shape inference: `[batch, input_num_capsules, input_capsule_dim]`
    /// maps to `[batch, num_capsules, capsule_dim]`.
    pub fn output_shape(&self, input_shape: &[usize]) -> Result<(usize, usize, usize)> {
        if input_shape.len() != 3 {
            return Err(CapsError::rank_mismatch(3, input_shape));
        }
        if let CapsuleState::Initialized { weights } = &self.state {
            check_trailing_dims(weights, input_shape)?;
        }
        Ok((input_shape[0], self.config.num_capsules, self.config.capsule_dim))
    }

    /// Build on first use, then route.
    pub fn forward(&mut self, input: ArrayView3<f32>) -> Result<Array3<f32>> {
        self.build(input.shape())?;
        self.route(input)
    }

    /// Route a batch through an already built layer.
    pub fn route(&self, input: ArrayView3<f32>) -> Result<Array3<f32>> {
        Ok(self.route_with_coupling(input)?.capsules)
    }

    /// Route a batch and return the final coupling coefficients and logits
    /// alongside the output capsules.
    pub fn route_with_coupling(&self, input: ArrayView3<f32>) -> Result<RoutingOutput> {
        let weights = match &self.state {
            CapsuleState::Initialized { weights } => weights,
            CapsuleState::Uninitialized => return Err(CapsError::NotBuilt),
        };
        check_trailing_dims(weights, input.shape())?;

        let votes = compute_votes(weights, input);
        let (batch, input_num_capsules, num_capsules, _) = votes.dim();
        let mut logits = Array4::<f32>::zeros((batch, input_num_capsules, num_capsules, 1));

        // The final pass pools without touching the logits again
        for iteration in 1..self.config.routing_iterations {
            let (_, output) = self.pool(&votes, &logits);
            let agreement = (&votes * &output).sum_axis(Axis(3)).insert_axis(Axis(3));
            logits += &agreement;
            trace!(
                iteration,
                mean_agreement = agreement.mean().unwrap_or(0.0),
                "routing iteration"
            );
        }

        let (coupling, output) = self.pool(&votes, &logits);
        Ok(RoutingOutput {
            capsules: output.index_axis_move(Axis(1), 0),
            coupling,
            logits,
        })
    }

    /// One routing pass: coupling coefficients and squashed pooled capsules
    /// `[batch, 1, num_capsules, capsule_dim]`.
    fn pool(&self, votes: &Array4<f32>, logits: &Array4<f32>) -> (Array4<f32>, Array4<f32>) {
        let coupling = softmax(logits, Axis(2));
        let weighted = votes * &coupling;
        let pooled = weighted.sum_axis(Axis(1)).insert_axis(Axis(1));
        let output = self.squash.apply(&pooled, Axis(3));
        (coupling, output)
    }
}

/// `votes[b, i, j] = W[0, i, j] . u[b, i]`, data-parallel over input capsules.
fn compute_votes(weights: &Array5<f32>, input: ArrayView3<f32>) -> Array4<f32> {
    let (batch, input_num_capsules, _) = input.dim();
    let (_, _, num_capsules, capsule_dim, _) = weights.dim();
    let mut votes = Array4::<f32>::zeros((batch, input_num_capsules, num_capsules, capsule_dim));
    let transforms = weights.index_axis(Axis(0), 0);

    Zip::from(votes.axis_iter_mut(Axis(1)))
        .and(transforms.outer_iter())
        .and(input.axis_iter(Axis(1)))
        .par_for_each(|mut votes_i, w_i, u_i| {
            for (j, w_ij) in w_i.outer_iter().enumerate() {
                votes_i.index_axis_mut(Axis(1), j).assign(&u_i.dot(&w_ij.t()));
            }
        });

    votes
}

fn check_trailing_dims(weights: &Array5<f32>, input_shape: &[usize]) -> Result<()> {
    if input_shape.len() != 3 {
        return Err(CapsError::rank_mismatch(3, input_shape));
    }
    let expected = (weights.shape()[1], weights.shape()[4]);
    if (input_shape[1], input_shape[2]) != expected {
        return Err(CapsError::shape_mismatch(
            format!("[batch, {}, {}]", expected.0, expected.1),
            format!("{:?}", input_shape),
        ));
    }
    Ok(())
}

impl Layer for CapsuleLayer {
    fn name(&self) -> &str {
        "capsule"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[ArrayViewD<f32>]) -> Result<ArrayD<f32>> {
        check_arity(self.arity(), inputs.len())?;
        let input = inputs[0]
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|_| CapsError::rank_mismatch(3, inputs[0].shape()))?;
        Ok(CapsuleLayer::forward(self, input)?.into_dyn())
    }

    fn output_shape(&self, input_shapes: &[&[usize]]) -> Result<Vec<usize>> {
        check_arity(self.arity(), input_shapes.len())?;
        let (batch, num_capsules, capsule_dim) = CapsuleLayer::output_shape(self, input_shapes[0])?;
        Ok(vec![batch, num_capsules, capsule_dim])
    }
}
