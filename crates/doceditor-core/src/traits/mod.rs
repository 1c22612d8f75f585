//! Core traits defined in `doceditor-core` and implemented by other crates.

pub mod storage;

pub use storage::StorageProvider;
