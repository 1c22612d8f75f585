//! Per-user annotation layers.

pub mod layer;

pub use layer::{AnnotationLayer, FabricOverlay, TextOverlay};
