//! Document operations exposed to front ends.

pub mod compose;
pub mod export;
pub mod service;

pub use service::DocumentService;
