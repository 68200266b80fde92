pub mod layers;

pub use layers::CapsuleLayerBuilder;
