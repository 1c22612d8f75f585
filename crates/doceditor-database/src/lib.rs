//! # doceditor-database
//!
//! SQLite connection management and concrete repository implementations
//! for files, versions, audit entries and annotation layers.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
