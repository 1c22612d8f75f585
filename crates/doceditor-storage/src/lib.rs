//! # doceditor-storage
//!
//! Blob storage for DocEditor: the local filesystem provider and the
//! `originals/` + `versions/` key layout that maps every (file, version)
//! pair to exactly one object.

pub mod blob;
pub mod providers;

pub use blob::{BlobHandle, BlobStore};
pub use providers::local::LocalStorageProvider;
