use crate::activations::EPSILON;
use crate::config::CapsuleConfig;
use crate::error::{CapsError, Result};
use crate::layers::initialization::WeightInit;
use crate::layers::CapsuleLayer;

/// Builder for CapsuleLayer
pub struct CapsuleLayerBuilder {
    num_capsules: Option<usize>,
    capsule_dim: Option<usize>,
    routing_iterations: usize,
    weight_init: WeightInit,
    epsilon: f32,
    seed: Option<u64>,
}

impl CapsuleLayerBuilder {
    /// Create a new capsule layer builder
    pub fn new() -> Self {
        CapsuleLayerBuilder {
            num_capsules: None,
            capsule_dim: None,
            routing_iterations: 3,
            weight_init: WeightInit::default(),
            epsilon: EPSILON,
            seed: None,
        }
    }

    /// Set number of output capsules
    pub fn num_capsules(mut self, num_capsules: usize) -> Self {
        self.num_capsules = Some(num_capsules);
        self
    }

    /// Set dimension of each output capsule
    pub fn capsule_dim(mut self, capsule_dim: usize) -> Self {
        self.capsule_dim = Some(capsule_dim);
        self
    }

    /// Set number of routing iterations
    pub fn routing_iterations(mut self, iterations: usize) -> Self {
        self.routing_iterations = iterations;
        self
    }

    /// Set weight initialization
    pub fn weight_init(mut self, init: WeightInit) -> Self {
        self.weight_init = init;
        self
    }

    /// Set epsilon for numerical stability
    pub fn epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Seed the weight initialization
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the capsule layer
    pub fn build(self) -> Result<CapsuleLayer> {
        let num_capsules = self.num_capsules.ok_or_else(|| CapsError::InvalidParameter {
            name: "num_capsules".to_string(),
            reason: "Number of output capsules not specified".to_string(),
        })?;

        let capsule_dim = self.capsule_dim.ok_or_else(|| CapsError::InvalidParameter {
            name: "capsule_dim".to_string(),
            reason: "Capsule dimension not specified".to_string(),
        })?;

        CapsuleLayer::from_config(CapsuleConfig {
            num_capsules,
            capsule_dim,
            routing_iterations: self.routing_iterations,
            weight_init: self.weight_init,
            epsilon: self.epsilon,
            seed: self.seed,
        })
    }
}

impl Default for CapsuleLayerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
