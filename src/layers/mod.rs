pub mod traits;
pub mod initialization;
pub mod capsule;
pub mod length;
pub mod mask;

pub use traits::Layer as LayerTrait;
pub use initialization::WeightInit;
pub use capsule::{CapsuleLayer, RoutingOutput};
pub use length::Length;
pub use mask::{one_hot_from_lengths, Mask};
