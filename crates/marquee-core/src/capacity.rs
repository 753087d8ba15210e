//! Capacity arithmetic for ticket offers.
//!
//! A show's offers may never hold more units, in total, than the show
//! has. When an offer is written, the units held by its *other* offers
//! are subtracted from the show's total to get what is still available;
//! the offer's own previous count never counts against itself.
//!
//! The numbers fed into [`CapacityCheck`] must be read inside the same
//! store transaction that persists the write. Nothing here caches them.

use serde::{Deserialize, Serialize};

use crate::error::{MarqueeError, MarqueeResult};

/// Reject non-positive unit counts before any store access.
pub fn validate_unit_count(requested: i64) -> MarqueeResult<()> {
    if requested <= 0 {
        return Err(MarqueeError::validation(format!(
            "unit count must be positive, got {requested}"
        )));
    }
    Ok(())
}

/// Reject a show capacity that cannot hold any offer.
pub fn validate_total_units(total_units: i64) -> MarqueeResult<()> {
    if total_units <= 0 {
        return Err(MarqueeError::validation(format!(
            "total units must be positive, got {total_units}"
        )));
    }
    Ok(())
}

/// Capacity state of one show as seen by one offer write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityCheck {
    pub total_units: i64,
    /// Units held by every offer of the show except the one being written.
    pub other_allocated: i64,
}

impl CapacityCheck {
    pub fn new(total_units: i64, other_allocated: i64) -> Self {
        Self {
            total_units,
            other_allocated,
        }
    }

    pub fn available(&self) -> i64 {
        self.total_units - self.other_allocated
    }

    /// Admit `requested` units, returning what remains afterwards.
    ///
    /// Taking exactly the available amount is allowed.
    pub fn admit(&self, requested: i64) -> MarqueeResult<i64> {
        let available = self.available();
        if requested > available {
            return Err(MarqueeError::CapacityExceeded { available });
        }
        Ok(available - requested)
    }
}

/// Check that a show can shrink to `new_total` given what its offers hold.
pub fn check_shrink(new_total: i64, allocated: i64) -> MarqueeResult<()> {
    if new_total < allocated {
        return Err(MarqueeError::validation(format!(
            "total units {new_total} is below the {allocated} units already allocated"
        )));
    }
    Ok(())
}

/// Aggregate capacity of a show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySummary {
    pub total_units: i64,
    pub allocated_units: i64,
    pub available_units: i64,
}

impl CapacitySummary {
    pub fn new(total_units: i64, allocated_units: i64) -> Self {
        Self {
            total_units,
            allocated_units,
            available_units: total_units - allocated_units,
        }
    }
}
