//! Repository implementations for all DocEditor entities.

pub mod annotation;
pub mod audit;
pub mod file;

pub use annotation::AnnotationLayerRepository;
pub use audit::AuditLogRepository;
pub use file::{FileRepository, VersionTx};
