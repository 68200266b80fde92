//! Serializable configuration for the capsule routing layer.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::activations::EPSILON;
use crate::error::{CapsError, Result};
use crate::layers::initialization::WeightInit;

fn default_routing_iterations() -> usize {
    3
}

fn default_epsilon() -> f32 {
    EPSILON
}

/// Hyperparameters of a [`CapsuleLayer`](crate::layers::CapsuleLayer).
///
/// ```rust
/// use capsnet::config::CapsuleConfig;
///
/// let json = r#"{"num_capsules": 10, "capsule_dim": 16}"#;
/// let config = CapsuleConfig::from_json_str(json).unwrap();
/// assert_eq!(config.routing_iterations, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapsuleConfig {
    /// Number of output capsules
    pub num_capsules: usize,

    /// Dimensionality of each output capsule vector
    pub capsule_dim: usize,

    /// Number of routing-by-agreement passes
    #[serde(default = "default_routing_iterations")]
    pub routing_iterations: usize,

    /// Distribution used to allocate the transformation matrix
    #[serde(default)]
    pub weight_init: WeightInit,

    /// Stabilizing constant of the squash norm
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,

    /// Seed for the initialization RNG; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl CapsuleConfig {
    pub fn new(num_capsules: usize, capsule_dim: usize, routing_iterations: usize) -> Self {
        CapsuleConfig {
            num_capsules,
            capsule_dim,
            routing_iterations,
            weight_init: WeightInit::default(),
            epsilon: EPSILON,
            seed: None,
        }
    }

    /// Reject zero sizes, a non-positive epsilon and invalid distributions.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("num_capsules", self.num_capsules),
            ("capsule_dim", self.capsule_dim),
            ("routing_iterations", self.routing_iterations),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(CapsError::invalid_parameter(name, "must be a positive integer"));
            }
        }

        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(CapsError::invalid_parameter(
                "epsilon".to_string(),
                format!("must be a small positive number, got {}", self.epsilon),
            ));
        }

        self.weight_init.validate()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: CapsuleConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
