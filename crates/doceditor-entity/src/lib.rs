//! # doceditor-entity
//!
//! Domain entity models for DocEditor. Every struct in this crate
//! represents a database row or a domain value object. All entities
//! derive `Debug`, `Clone`, `Serialize`, `Deserialize`, and database
//! rows additionally derive `sqlx::FromRow`.

pub mod annotation;
pub mod audit;
pub mod file;
