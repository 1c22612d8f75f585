//! File domain entities.

pub mod model;
pub mod version;

pub use model::{File, FileRecord, FileType};
pub use version::FileVersion;
