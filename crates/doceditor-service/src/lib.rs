//! # doceditor-service
//!
//! Business logic service layer for DocEditor. The version manager owns
//! the append-only version chain; the document, annotation and audit
//! services build every user-facing operation on top of it.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod annotation;
pub mod audit;
pub mod document;
pub mod state;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;

pub use annotation::AnnotationService;
pub use audit::AuditService;
pub use document::DocumentService;
pub use state::AppState;
pub use version::{FileGuard, SweepReport, VersionManager};
