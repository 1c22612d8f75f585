//! # doceditor-transform
//!
//! Deterministic `(bytes, params) -> bytes` transforms. Nothing in this
//! crate touches storage; callers resolve the source bytes, run a
//! transform on a blocking worker and commit whatever comes back.

pub mod enhance;
pub mod operation;
pub mod overlay;
pub mod pdf;
pub mod raster;

pub use enhance::EnhanceOptions;
pub use operation::EditOperation;
