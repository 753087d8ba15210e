//! SurrealDB implementation of [`TenantRepository`].

use chrono::{DateTime, Utc};
use marquee_core::error::{MarqueeError, MarqueeResult};
use marquee_core::interceptor::WriteInterceptor;
use marquee_core::models::tenant::{CreateTenant, Tenant, UpdateTenant};
use marquee_core::repository::{PaginatedResult, Pagination, TenantRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct TenantRow {
    name: String,
    slug: String,
    is_active: bool,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRow {
    fn into_tenant(self, id: Uuid) -> Tenant {
        Tenant {
            id,
            name: self.name,
            slug: self.slug,
            is_active: self.is_active,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct TenantRowWithId {
    record_id: String,
    name: String,
    slug: String,
    is_active: bool,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRowWithId {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id: parse_uuid(&self.record_id, "tenant")?,
            name: self.name,
            slug: self.slug,
            is_active: self.is_active,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
    interceptor: WriteInterceptor,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self::with_interceptor(db, WriteInterceptor::default())
    }

    pub fn with_interceptor(db: Surreal<C>, interceptor: WriteInterceptor) -> Self {
        Self { db, interceptor }
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> MarqueeResult<Tenant> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let metadata = input
            .metadata
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let result = self
            .db
            .query(
                "CREATE type::record('tenant', $id) SET \
                 name = $name, slug = $slug, is_active = true, \
                 metadata = $metadata",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("slug", input.slug))
            .bind(("metadata", metadata))
            .await
            .map_err(|e| DbError::classify("tenant", e))?;

        let mut result = result.check().map_err(|e| DbError::classify("tenant", e))?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("tenant", &id_str))?;

        Ok(row.into_tenant(id))
    }

    async fn get_by_id(&self, id: Uuid) -> MarqueeResult<Tenant> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('tenant', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("tenant", &id_str))?;

        Ok(row.into_tenant(id))
    }

    async fn get_by_slug(&self, slug: &str) -> MarqueeResult<Tenant> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM tenant WHERE slug = $slug")
            .bind(("slug", slug.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("tenant", format!("slug={slug}")))?;

        Ok(row.try_into_tenant()?)
    }

    async fn provision(&self, slug: &str, name: &str) -> MarqueeResult<Tenant> {
        match self.get_by_slug(slug).await {
            Ok(tenant) => return Ok(tenant),
            Err(MarqueeError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let created = self
            .create(CreateTenant {
                name: name.to_string(),
                slug: slug.to_string(),
                metadata: None,
            })
            .await;

        match created {
            Ok(tenant) => {
                info!(tenant_id = %tenant.id, slug, "Provisioned tenant");
                Ok(tenant)
            }
            // Another request provisioned the same slug first.
            Err(MarqueeError::AlreadyExists { .. }) => self.get_by_slug(slug).await,
            Err(e) => Err(e),
        }
    }

    async fn update(&self, id: Uuid, input: UpdateTenant) -> MarqueeResult<Tenant> {
        let id_str = id.to_string();
        let stamp = self.interceptor.on_update();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        if input.metadata.is_some() {
            sets.push("metadata = $metadata");
        }
        sets.push("updated_at = $updated_at");

        let query = format!("UPDATE type::record('tenant', $id) SET {}", sets.join(", "));

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("updated_at", stamp.updated_at));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }
        if let Some(metadata) = input.metadata {
            builder = builder.bind(("metadata", metadata));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::classify("tenant", e))?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("tenant", &id_str))?;

        Ok(row.into_tenant(id))
    }

    async fn list(&self, pagination: Pagination) -> MarqueeResult<PaginatedResult<Tenant>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM tenant GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM tenant \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_tenant())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
