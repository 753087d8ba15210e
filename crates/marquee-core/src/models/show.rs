//! Show domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A performance of an act at a venue with a fixed number of units
/// (seats, standing places) to sell.
///
/// Shows carry no tenant id; they belong to the tenant of their venue.
/// `venue_id` and `act_id` never change after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Show {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub act_id: Uuid,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub total_units: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShow {
    pub venue_id: Uuid,
    pub act_id: Uuid,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub total_units: i64,
}

/// Parent references are deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateShow {
    pub title: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    /// Rejected when lower than the units already allocated to offers.
    pub total_units: Option<i64>,
}
