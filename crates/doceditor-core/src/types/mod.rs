//! Core type definitions used across the DocEditor workspace.

pub mod id;
pub mod version_ref;

pub use id::FileId;
pub use version_ref::VersionRef;
