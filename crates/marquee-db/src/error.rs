//! Database-specific error types and conversions.

use std::time::Duration;

use marquee_core::error::MarqueeError;

/// Message thrown by a write block that passed its deadline.
pub(crate) const LOCK_TIMEOUT_MARKER: &str = "allocation lock timeout";

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("Duplicate {entity}")]
    Duplicate { entity: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Write abandoned after its {waited_ms} ms deadline")]
    LockTimeout { waited_ms: u64 },
}

impl DbError {
    /// Sort a failed query into conflict, duplicate or plain query errors.
    ///
    /// SurrealDB reports optimistic-concurrency failures and unique index
    /// violations only through their messages.
    pub(crate) fn classify(entity: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        let lower = message.to_lowercase();
        if lower.contains("conflict") || lower.contains("can be retried") {
            DbError::Conflict(message)
        } else if lower.contains("already contains") {
            DbError::Duplicate {
                entity: entity.into(),
            }
        } else {
            DbError::Query(message)
        }
    }

    /// [`DbError::classify`] for capacity-checked writes, which may also
    /// abort on their deadline.
    pub(crate) fn classify_write(entity: &str, err: surrealdb::Error, budget: Duration) -> Self {
        if err.to_string().contains(LOCK_TIMEOUT_MARKER) {
            return DbError::LockTimeout {
                waited_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            };
        }
        Self::classify(entity, err)
    }

    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

impl From<DbError> for MarqueeError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => MarqueeError::NotFound { entity, id },
            DbError::Duplicate { entity } => MarqueeError::AlreadyExists { entity },
            DbError::Conflict(msg) => MarqueeError::Conflict(msg),
            DbError::LockTimeout { waited_ms } => MarqueeError::Timeout { waited_ms },
            other => MarqueeError::Database(other.to_string()),
        }
    }
}
