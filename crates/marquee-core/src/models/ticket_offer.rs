//! Ticket offer domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capacity::validate_unit_count;
use crate::error::{MarqueeError, MarqueeResult};

/// A priced block of units carved out of a show's capacity
/// (e.g. "Early bird", 200 units at 25.00).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketOffer {
    pub id: Uuid,
    pub show_id: Uuid,
    pub name: String,
    pub unit_price_cents: i64,
    pub unit_count: i64,
    /// Client-supplied correlation id. Immutable once set.
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTicketOffer {
    pub show_id: Uuid,
    pub name: String,
    pub unit_price_cents: i64,
    pub unit_count: i64,
    pub external_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTicketOffer {
    pub name: Option<String>,
    pub unit_price_cents: Option<i64>,
    pub unit_count: Option<i64>,
}

fn validate_name(name: &str) -> MarqueeResult<()> {
    if name.trim().is_empty() {
        return Err(MarqueeError::validation("offer name is required"));
    }
    Ok(())
}

fn validate_price(unit_price_cents: i64) -> MarqueeResult<()> {
    if unit_price_cents < 0 {
        return Err(MarqueeError::validation(format!(
            "unit price must not be negative, got {unit_price_cents}"
        )));
    }
    Ok(())
}

impl CreateTicketOffer {
    /// Input checks that need no store access.
    pub fn validate(&self) -> MarqueeResult<()> {
        validate_name(&self.name)?;
        validate_price(self.unit_price_cents)?;
        validate_unit_count(self.unit_count)
    }
}

impl UpdateTicketOffer {
    pub fn validate(&self) -> MarqueeResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(price) = self.unit_price_cents {
            validate_price(price)?;
        }
        if let Some(unit_count) = self.unit_count {
            validate_unit_count(unit_count)?;
        }
        Ok(())
    }
}
