//! Per-user annotation layers kept outside the version chain.

pub mod service;

pub use service::AnnotationService;
