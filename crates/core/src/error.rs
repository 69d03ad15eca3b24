use crate::types::DbId;

/// Domain-level error type shared across crates.
///
/// Validation errors are rejected before any mutation; conflict errors
/// may succeed after the caller resolves the conflict; not-found is
/// reported distinctly from both.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
