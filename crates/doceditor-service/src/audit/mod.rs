//! Audit trail of state-changing actions.

pub mod service;

pub use service::AuditService;
