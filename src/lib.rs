//! # capsnet - Capsule Layers with Dynamic Routing
//!
//! capsnet implements the forward computation of a capsule network layer on
//! top of `ndarray`. Capsules are vectors rather than scalars: their
//! direction encodes the properties of an entity and their length encodes
//! the probability that it is present. Lower-level capsules vote for
//! higher-level ones through a learned transformation, and the votes are
//! pooled by iterative routing-by-agreement.
//!
//! ## Key Features
//!
//! - **Capsule layer**: vote computation and routing-by-agreement with a
//!   lazily allocated transformation matrix
//! - **Squash**: the bounded, direction-preserving vector non-linearity
//! - **Length / Mask**: adapters for classification and reconstruction heads
//! - **Host seam**: a dynamically ranked [`layers::LayerTrait`] for graphs
//!   that pass tensors around as lists
//!
//! Gradients, losses and training loops belong to the host framework; every
//! operation here is a plain differentiable tensor function.
//!
//! ## Quick Start
//!
//! ```rust
//! use capsnet::builders::CapsuleLayerBuilder;
//! use capsnet::layers::{Length, Mask};
//! use ndarray::{Array2, Array3};
//!
//! let mut digit_caps = CapsuleLayerBuilder::new()
//!     .num_capsules(10)
//!     .capsule_dim(16)
//!     .routing_iterations(3)
//!     .seed(0)
//!     .build()
//!     .unwrap();
//!
//! let primary = Array3::<f32>::ones((2, 32, 8));
//! let capsules = digit_caps.forward(primary.view()).unwrap();
//! assert_eq!(capsules.dim(), (2, 10, 16));
//!
//! let scores = Length::new().forward(&capsules).unwrap();
//! assert_eq!(scores.dim(), (2, 10));
//!
//! let mut labels = Array2::<f32>::zeros((2, 10));
//! labels[[0, 3]] = 1.0;
//! labels[[1, 7]] = 1.0;
//! let decoder_input = Mask::new().forward(capsules.view(), labels.view()).unwrap();
//! assert_eq!(decoder_input.dim(), (2, 160));
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - Squash and softmax along an axis
//! - [`builders`] - Builder for the capsule layer
//! - [`config`] - Serializable layer configuration
//! - [`error`] - Error types and result handling
//! - [`layers`] - Capsule, Length and Mask layers, weight initialization
//! - [`logging`] - Tracing subscriber setup

pub mod activations;
pub mod builders;
pub mod config;
pub mod error;
pub mod layers;
pub mod logging;

pub use error::{CapsError, Result};
