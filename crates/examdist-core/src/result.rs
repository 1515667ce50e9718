//! Convenience result type alias for ExamDist.

use crate::error::AppError;

/// A specialized `Result` type for ExamDist operations.
pub type AppResult<T> = Result<T, AppError>;
