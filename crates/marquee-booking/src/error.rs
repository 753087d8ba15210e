//! Allocation error types.

use marquee_core::error::MarqueeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("allocation lock not acquired within {waited_ms} ms")]
    LockTimeout { waited_ms: u64 },

    #[error("allocation still conflicting after {attempts} attempts: {reason}")]
    ConflictRetriesExhausted { attempts: u32, reason: String },
}

impl From<BookingError> for MarqueeError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::LockTimeout { waited_ms } => MarqueeError::Timeout { waited_ms },
            BookingError::ConflictRetriesExhausted { .. } => {
                MarqueeError::Conflict(err.to_string())
            }
        }
    }
}
