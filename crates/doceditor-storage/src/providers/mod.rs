//! Storage provider implementations.

pub mod local;
