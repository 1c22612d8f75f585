//! Version chain management: commits, reverts, deletion and orphan sweeps.

pub mod manager;
pub mod sweep;

pub use manager::{FileGuard, VersionManager};
pub use sweep::{MissingBlob, SweepReport};
