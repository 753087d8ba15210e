//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Tenant-inheriting tables reference their
//! parent through record links so that tenant predicates can follow the
//! link at query time. Fields that may never change after creation are
//! declared READONLY.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global scope)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD slug ON TABLE tenant TYPE string READONLY;
DEFINE FIELD is_active ON TABLE tenant TYPE bool DEFAULT true;
DEFINE FIELD metadata ON TABLE tenant TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now() READONLY;
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_slug ON TABLE tenant COLUMNS slug UNIQUE;

-- =======================================================================
-- Venues (tenant scope)
-- =======================================================================
DEFINE TABLE venue SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE venue TYPE string READONLY;
DEFINE FIELD name ON TABLE venue TYPE string;
DEFINE FIELD address ON TABLE venue TYPE option<string>;
DEFINE FIELD metadata ON TABLE venue TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE venue TYPE datetime \
    DEFAULT time::now() READONLY;
DEFINE FIELD updated_at ON TABLE venue TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_venue_tenant ON TABLE venue COLUMNS tenant_id;

-- =======================================================================
-- Acts (tenant scope)
-- =======================================================================
DEFINE TABLE act SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE act TYPE string READONLY;
DEFINE FIELD name ON TABLE act TYPE string;
DEFINE FIELD description ON TABLE act TYPE string;
DEFINE FIELD metadata ON TABLE act TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE act TYPE datetime \
    DEFAULT time::now() READONLY;
DEFINE FIELD updated_at ON TABLE act TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_act_tenant ON TABLE act COLUMNS tenant_id;

-- =======================================================================
-- Shows (tenant inherited from venue)
-- =======================================================================
DEFINE TABLE show SCHEMAFULL;
DEFINE FIELD venue ON TABLE show TYPE record<venue> READONLY;
DEFINE FIELD act ON TABLE show TYPE record<act> READONLY;
DEFINE FIELD title ON TABLE show TYPE string;
DEFINE FIELD starts_at ON TABLE show TYPE datetime;
DEFINE FIELD total_units ON TABLE show TYPE int ASSERT $value > 0;
-- Bumped by every allocation write so concurrent writers on one show
-- conflict at commit.
DEFINE FIELD allocation_version ON TABLE show TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE show TYPE datetime \
    DEFAULT time::now() READONLY;
DEFINE FIELD updated_at ON TABLE show TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_show_venue ON TABLE show COLUMNS venue;

-- =======================================================================
-- Ticket offers (tenant inherited from show)
-- =======================================================================
DEFINE TABLE ticket_offer SCHEMAFULL;
DEFINE FIELD show ON TABLE ticket_offer TYPE record<show> READONLY;
DEFINE FIELD name ON TABLE ticket_offer TYPE string;
DEFINE FIELD unit_price_cents ON TABLE ticket_offer TYPE int \
    ASSERT $value >= 0;
DEFINE FIELD unit_count ON TABLE ticket_offer TYPE int \
    ASSERT $value > 0;
DEFINE FIELD external_ref ON TABLE ticket_offer TYPE option<string> \
    READONLY;
DEFINE FIELD created_at ON TABLE ticket_offer TYPE datetime \
    DEFAULT time::now() READONLY;
DEFINE FIELD updated_at ON TABLE ticket_offer TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_offer_show ON TABLE ticket_offer COLUMNS show;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn parent_links_are_readonly() {
        assert!(SCHEMA_V1.contains("venue ON TABLE show TYPE record<venue> READONLY"));
        assert!(SCHEMA_V1.contains("act ON TABLE show TYPE record<act> READONLY"));
        assert!(SCHEMA_V1.contains("show ON TABLE ticket_offer TYPE record<show> READONLY"));
    }
}
