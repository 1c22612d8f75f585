//! Convenience result type alias for DocEditor.

use crate::error::AppError;

/// A specialized `Result` type for DocEditor operations.
pub type AppResult<T> = Result<T, AppError>;
