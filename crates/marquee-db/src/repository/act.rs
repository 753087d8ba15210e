//! SurrealDB implementation of [`ActRepository`].

use chrono::{DateTime, Utc};
use marquee_core::context::TenantContext;
use marquee_core::error::MarqueeResult;
use marquee_core::filter::{EntityKind, TENANT_PARAM, TenantFilter};
use marquee_core::interceptor::WriteInterceptor;
use marquee_core::models::act::{Act, CreateAct, UpdateAct};
use marquee_core::repository::{ActRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, ensure_active_tenant, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ActRow {
    tenant_id: String,
    name: String,
    description: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn row_to_act(row: ActRow, id: Uuid) -> Result<Act, DbError> {
    Ok(Act {
        id,
        tenant_id: parse_uuid(&row.tenant_id, "tenant")?,
        name: row.name,
        description: row.description,
        metadata: row.metadata,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[derive(Debug, SurrealValue)]
struct ActRowWithId {
    record_id: String,
    tenant_id: String,
    name: String,
    description: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ActRowWithId {
    fn try_into_act(self) -> Result<Act, DbError> {
        Ok(Act {
            id: parse_uuid(&self.record_id, "act")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            name: self.name,
            description: self.description,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Act repository.
#[derive(Clone)]
pub struct SurrealActRepository<C: Connection> {
    db: Surreal<C>,
    interceptor: WriteInterceptor,
}

impl<C: Connection> SurrealActRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self::with_interceptor(db, WriteInterceptor::default())
    }

    pub fn with_interceptor(db: Surreal<C>, interceptor: WriteInterceptor) -> Self {
        Self { db, interceptor }
    }
}

impl<C: Connection> ActRepository for SurrealActRepository<C> {
    async fn create(&self, ctx: &TenantContext, input: CreateAct) -> MarqueeResult<Act> {
        let stamp = self
            .interceptor
            .on_create(EntityKind::Act, input.tenant_id, ctx)?;
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
                "CREATE type::record('act', $id) SET \
                 tenant_id = $owner, name = $name, description = $description, \
                 metadata = $metadata, \
                 created_at = $created_at, updated_at = $updated_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("owner", tenant_id.to_string()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("metadata", metadata))
            .bind(("created_at", stamp.created_at))
            .bind(("updated_at", stamp.updated_at))
            .await
            .map_err(|e| DbError::classify("act", e))?;

        let mut result = result.check().map_err(|e| DbError::classify("act", e))?;

        let rows: Vec<ActRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("act", &id_str))?;

        row_to_act(row, id).map_err(Into::into)
    }

    async fn get_by_id(&self, ctx: &TenantContext, id: Uuid) -> MarqueeResult<Act> {
        let filter = TenantFilter::new(ctx);
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "SELECT * FROM type::record('act', $id) WHERE {}",
                filter.predicate(EntityKind::Act)
            ))
            .bind(("id", id_str.clone()))
            .bind((TENANT_PARAM, filter.binding()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ActRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("act", &id_str))?;

        row_to_act(row, id).map_err(Into::into)
    }

    async fn update(&self, ctx: &TenantContext, id: Uuid, input: UpdateAct) -> MarqueeResult<Act> {
        let filter = TenantFilter::new(ctx);
        let id_str = id.to_string();
        let stamp = self.interceptor.on_update();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.metadata.is_some() {
            sets.push("metadata = $metadata");
        }
        sets.push("updated_at = $updated_at");

        let query = format!(
            "UPDATE type::record('act', $id) SET {} WHERE {}",
            sets.join(", "),
            filter.predicate(EntityKind::Act)
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
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(metadata) = input.metadata {
            builder = builder.bind(("metadata", metadata));
        }

        let result = builder.await.map_err(|e| DbError::classify("act", e))?;
        let mut result = result.check().map_err(|e| DbError::classify("act", e))?;

        let rows: Vec<ActRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("act", &id_str))?;

        row_to_act(row, id).map_err(Into::into)
    }

    async fn list(
        &self,
        ctx: &TenantContext,
        pagination: Pagination,
    ) -> MarqueeResult<PaginatedResult<Act>> {
        let filter = TenantFilter::new(ctx);
        let predicate = filter.predicate(EntityKind::Act);

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM act WHERE {predicate} GROUP ALL"
            ))
            .bind((TENANT_PARAM, filter.binding()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM act \
                 WHERE {predicate} \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset"
            ))
            .bind((TENANT_PARAM, filter.binding()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ActRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_act())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
