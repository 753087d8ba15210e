//! Venue domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A place where shows happen. Owned directly by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    /// Free-form postal address; geocoding happens elsewhere.
    pub address: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVenue {
    /// Left `None` by tenant-scoped callers; the write interceptor fills
    /// it from the request's tenant context.
    pub tenant_id: Option<Uuid>,
    pub name: String,
    pub address: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateVenue {
    pub name: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub address: Option<Option<String>>,
    pub metadata: Option<serde_json::Value>,
}
