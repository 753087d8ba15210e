//! SurrealDB repository implementations.

mod act;
mod show;
mod tenant;
mod ticket_offer;
mod venue;

pub use act::SurrealActRepository;
pub use show::SurrealShowRepository;
pub use tenant::SurrealTenantRepository;
pub use ticket_offer::SurrealTicketOfferRepository;
pub use venue::SurrealVenueRepository;

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, LOCK_TIMEOUT_MARKER};

/// Budget for one capacity-checked write unless configured otherwise.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Corrupt(format!("invalid {what} UUID: {e}")))
}

#[derive(Debug, SurrealValue)]
struct TenantStatusRow {
    is_active: bool,
}

/// Fail unless `tenant_id` names an existing, active tenant.
async fn ensure_active_tenant<C: surrealdb::Connection>(
    db: &surrealdb::Surreal<C>,
    tenant_id: Uuid,
) -> marquee_core::MarqueeResult<()> {
    let mut result = db
        .query("SELECT is_active FROM type::record('tenant', $id)")
        .bind(("id", tenant_id.to_string()))
        .await
        .map_err(DbError::from)?;

    let rows: Vec<TenantStatusRow> = result.take(0).map_err(DbError::from)?;
    match rows.into_iter().next() {
        None => Err(DbError::not_found("tenant", tenant_id).into()),
        Some(row) if !row.is_active => Err(marquee_core::MarqueeError::validation(
            "tenant is inactive",
        )),
        Some(_) => Ok(()),
    }
}

/// Absolute deadline for a write whose budget starts now.
///
/// Taken when the request is issued, so time spent queued before the
/// store starts the statement counts against the budget.
fn deadline_after(budget: Duration) -> DateTime<Utc> {
    Utc::now() + TimeDelta::from_std(budget).unwrap_or_else(|_| TimeDelta::days(1))
}

/// Aborts the enclosing statement, rolling back everything it did, once
/// `$deadline` has passed. Placed directly before the write.
fn deadline_guard() -> String {
    format!("IF time::now() >= $deadline {{ THROW '{LOCK_TIMEOUT_MARKER}'; }};")
}

// Outcome statuses returned by the serialized capacity blocks.
const OUTCOME_ACCEPTED: &str = "accepted";
const OUTCOME_REJECTED: &str = "rejected";
const OUTCOME_NOT_FOUND: &str = "not_found";

/// Owner column of a venue or act.
#[derive(Debug, SurrealValue)]
struct OwnerRow {
    tenant_id: String,
}
