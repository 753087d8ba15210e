//! Error types for the Marquee system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarqueeError {
    /// The entity does not exist or is not visible to the caller's
    /// tenant. Both cases share this variant and its message.
    #[error("{entity} not found")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Requested units exceed remaining capacity: {available} available")]
    CapacityExceeded { available: i64 },

    #[error("Concurrent modification conflict: {0}")]
    Conflict(String),

    #[error("Timed out after {waited_ms} ms waiting for the allocation lock")]
    Timeout { waited_ms: u64 },

    #[error("Tenant context missing or invalid")]
    TenantContext,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarqueeError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        MarqueeError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        MarqueeError::Validation {
            message: message.into(),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MarqueeError::Conflict(_) | MarqueeError::Timeout { .. })
    }
}

pub type MarqueeResult<T> = Result<T, MarqueeError>;
