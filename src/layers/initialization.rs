use ndarray::{Array5, Ix5};
use rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CapsError, Result};

/// Shape of the transformation matrix:
/// `[1, input_num_capsules, num_capsules, capsule_dim, input_capsule_dim]`.
pub type TransformShape = (usize, usize, usize, usize, usize);

/// Weight initialization strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightInit {
    /// Uniform distribution with custom range
    Uniform { min: f32, max: f32 },

    /// Normal distribution with custom mean and std
    Normal { mean: f32, std: f32 },

    /// Xavier/Glorot uniform initialization
    XavierUniform,

    /// Xavier/Glorot normal initialization
    XavierNormal,

    /// He/Kaiming uniform initialization
    HeUniform,

    /// He/Kaiming normal initialization
    HeNormal,

    /// All zeros
    Zeros,

    /// All ones
    Ones,
}

impl Default for WeightInit {
    fn default() -> Self {
        WeightInit::Uniform { min: -0.05, max: 0.05 }
    }
}

impl WeightInit {
    /// Check the distribution parameters without drawing anything.
    pub fn validate(&self) -> Result<()> {
        match self {
            WeightInit::Uniform { min, max } => {
                if !(min.is_finite() && max.is_finite()) || min >= max {
                    return Err(CapsError::invalid_parameter(
                        "weight_init".to_string(),
                        format!("uniform range [{}, {}) is empty or non-finite", min, max),
                    ));
                }
            }
            WeightInit::Normal { mean, std } => {
                if !mean.is_finite() || !std.is_finite() || *std <= 0.0 {
                    return Err(CapsError::invalid_parameter(
                        "weight_init".to_string(),
                        format!(
                            "normal distribution needs a finite mean and positive std, \
                             got mean {} std {}",
                            mean, std
                        ),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Initialize the transformation matrix of a capsule layer.
    ///
    /// Each vote is a `capsule_dim x input_capsule_dim` matrix-vector
    /// product, so fan-in is `input_capsule_dim` and fan-out is `capsule_dim`.
    pub fn initialize_transform<R: Rng + ?Sized>(
        &self,
        shape: TransformShape,
        rng: &mut R,
    ) -> Result<Array5<f32>> {
        self.validate()?;
        let (_, _, _, fan_out, fan_in) = shape;
        let shape = Ix5(shape.0, shape.1, shape.2, shape.3, shape.4);

        let weights = match self {
            WeightInit::Uniform { min, max } => {
                Array5::random_using(shape, Uniform::new(*min, *max), rng)
            }

            WeightInit::Normal { mean, std } => {
                Array5::random_using(shape, normal(*mean, *std)?, rng)
            }

            WeightInit::XavierUniform => {
                let limit = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
                Array5::random_using(shape, Uniform::new(-limit, limit), rng)
            }

            WeightInit::XavierNormal => {
                let std = (2.0 / (fan_in + fan_out).max(1) as f32).sqrt();
                Array5::random_using(shape, normal(0.0, std)?, rng)
            }

            WeightInit::HeUniform => {
                let limit = (6.0 / fan_in.max(1) as f32).sqrt();
                Array5::random_using(shape, Uniform::new(-limit, limit), rng)
            }

            WeightInit::HeNormal => {
                let std = (2.0 / fan_in.max(1) as f32).sqrt();
                Array5::random_using(shape, normal(0.0, std)?, rng)
            }

            WeightInit::Zeros => Array5::zeros(shape),

            WeightInit::Ones => Array5::ones(shape),
        };

        Ok(weights)
    }
}

fn normal(mean: f32, std: f32) -> Result<Normal<f32>> {
    Normal::new(mean, std).map_err(|e| {
        CapsError::invalid_parameter("weight_init".to_string(), e.to_string())
    })
}
