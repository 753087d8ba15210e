//! SurrealDB implementation of [`VenueRepository`].

use chrono::{DateTime, Utc};
use marquee_core::context::TenantContext;
use marquee_core::error::MarqueeResult;
use marquee_core::filter::{EntityKind, TENANT_PARAM, TenantFilter};
use marquee_core::interceptor::WriteInterceptor;
use marquee_core::models::venue::{CreateVenue, UpdateVenue, Venue};
use marquee_core::repository::{PaginatedResult, Pagination, VenueRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, ensure_active_tenant, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct VenueRow {
    tenant_id: String,
    name: String,
    address: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl VenueRow {
    fn into_venue(self, id: Uuid) -> Result<Venue, DbError> {
        Ok(Venue {
            id,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            name: self.name,
            address: self.address,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct VenueRowWithId {
    record_id: String,
    tenant_id: String,
    name: String,
    address: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl VenueRowWithId {
    fn try_into_venue(self) -> Result<Venue, DbError> {
        let id = parse_uuid(&self.record_id, "venue")?;
        VenueRow {
            tenant_id: self.tenant_id,
            name: self.name,
            address: self.address,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_venue(id)
    }
}

/// SurrealDB implementation of the Venue repository.
#[derive(Clone)]
pub struct SurrealVenueRepository<C: Connection> {
    db: Surreal<C>,
    interceptor: WriteInterceptor,
}

impl<C: Connection> SurrealVenueRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self::with_interceptor(db, WriteInterceptor::default())
    }

    pub fn with_interceptor(db: Surreal<C>, interceptor: WriteInterceptor) -> Self {
        Self { db, interceptor }
    }
}

impl<C: Connection> VenueRepository for SurrealVenueRepository<C> {
    async fn create(&self, ctx: &TenantContext, input: CreateVenue) -> MarqueeResult<Venue> {
        let stamp = self
            .interceptor
            .on_create(EntityKind::Venue, input.tenant_id, ctx)?;
        let tenant_id = stamp.owner()?;
        ensure_active_tenant(&self.db, tenant_id).await?;

        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let metadata = input
            .metadata
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let result = self
            .db
            .query(
                "CREATE type::record('venue', $id) SET \
                 tenant_id = $owner, name = $name, address = $address, \
                 metadata = $metadata, \
                 created_at = $created_at, updated_at = $updated_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("owner", tenant_id.to_string()))
            .bind(("name", input.name))
            .bind(("address", input.address))
            .bind(("metadata", metadata))
            .bind(("created_at", stamp.created_at))
            .bind(("updated_at", stamp.updated_at))
            .await
            .map_err(|e| DbError::classify("venue", e))?;

        let mut result = result.check().map_err(|e| DbError::classify("venue", e))?;

        let rows: Vec<VenueRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("venue", &id_str))?;

        Ok(row.into_venue(id)?)
    }

    async fn get_by_id(&self, ctx: &TenantContext, id: Uuid) -> MarqueeResult<Venue> {
        let filter = TenantFilter::new(ctx);
        let id_str = id.to_string();

        let query = format!(
            "SELECT * FROM type::record('venue', $id) WHERE {}",
            filter.predicate(EntityKind::Venue)
        );

        let mut result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind((TENANT_PARAM, filter.binding()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<VenueRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("venue", &id_str))?;

        Ok(row.into_venue(id)?)
    }

    async fn update(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        input: UpdateVenue,
    ) -> MarqueeResult<Venue> {
        let filter = TenantFilter::new(ctx);
        let id_str = id.to_string();
        let stamp = self.interceptor.on_update();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.address.is_some() {
            sets.push("address = $address");
        }
        if input.metadata.is_some() {
            sets.push("metadata = $metadata");
        }
        sets.push("updated_at = $updated_at");

        let query = format!(
            "UPDATE type::record('venue', $id) SET {} WHERE {}",
            sets.join(", "),
            filter.predicate(EntityKind::Venue)
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind((TENANT_PARAM, filter.binding()))
            .bind(("updated_at", stamp.updated_at));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(address) = input.address {
            builder = builder.bind(("address", address));
        }
        if let Some(metadata) = input.metadata {
            builder = builder.bind(("metadata", metadata));
        }

        let result = builder.await.map_err(|e| DbError::classify("venue", e))?;
        let mut result = result.check().map_err(|e| DbError::classify("venue", e))?;

        let rows: Vec<VenueRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("venue", &id_str))?;

        Ok(row.into_venue(id)?)
    }

    async fn list(
        &self,
        ctx: &TenantContext,
        pagination: Pagination,
    ) -> MarqueeResult<PaginatedResult<Venue>> {
        let filter = TenantFilter::new(ctx);
        let predicate = filter.predicate(EntityKind::Venue);

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM venue WHERE {predicate} GROUP ALL"
            ))
            .bind((TENANT_PARAM, filter.binding()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM venue \
                 WHERE {predicate} \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset"
            ))
            .bind((TENANT_PARAM, filter.binding()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<VenueRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_venue())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
