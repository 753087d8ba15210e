//! Tenant domain model.
//!
//! A tenant is the isolation boundary: every venue, act, show and ticket
//! offer belongs to exactly one tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Globally unique, URL-safe identifier (e.g., `riverside-arts`).
    pub slug: String,
    /// Inactive tenants keep their data but cannot create new resources.
    pub is_active: bool,
    /// Arbitrary key-value metadata.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub slug: String,
    pub metadata: Option<serde_json::Value>,
}

/// Fields that can be updated on an existing tenant. The slug is fixed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub metadata: Option<serde_json::Value>,
}
