//! # Activations Module
//!
//! Vector non-linearities used by the capsule layers.
//!
//! - **Squash**: `|x|^2 / (1 + |x|^2) * x / |x|` - keeps the direction of a
//!   vector and maps its norm into `[0, 1)`, so capsule length reads as a
//!   presence probability
//! - **Softmax**: turns routing logits into coupling coefficients
//!
//! Both work on arrays of any rank along a chosen axis.
//!
//! ## Usage Example
//!
//! ```rust
//! use capsnet::activations::{squash, softmax};
//! use ndarray::{array, Axis};
//!
//! let capsules = array![[3.0f32, 4.0], [0.0, 0.0]];
//! let squashed = squash(&capsules, Axis(1));
//! assert!(squashed[[1, 0]] == 0.0);
//!
//! let coupling = softmax(&array![[0.0f32, 0.0]], Axis(1));
//! assert!((coupling[[0, 0]] - 0.5).abs() < 1e-6);
//! ```

pub mod softmax;
pub mod squash;

pub use softmax::softmax;
pub use squash::{squash, squash_with_epsilon, Squash, EPSILON};
