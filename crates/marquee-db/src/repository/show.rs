//! SurrealDB implementation of [`ShowRepository`].
//!
//! Shows store record links to their venue and act instead of a tenant
//! id, so every query filters on `venue.tenant_id`. Capacity edits take
//! the same per-show write (`allocation_version`) as offer writes and are
//! therefore serialized against them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use marquee_core::capacity::{self, CapacitySummary};
use marquee_core::context::TenantContext;
use marquee_core::error::{MarqueeError, MarqueeResult};
use marquee_core::filter::{EntityKind, TENANT_PARAM, TenantFilter};
use marquee_core::interceptor::WriteInterceptor;
use marquee_core::models::show::{CreateShow, Show, UpdateShow};
use marquee_core::repository::{PaginatedResult, Pagination, ShowRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{
    CountRow, DEFAULT_LOCK_TIMEOUT, OUTCOME_ACCEPTED, OUTCOME_NOT_FOUND, OUTCOME_REJECTED,
    OwnerRow, deadline_after, deadline_guard, parse_uuid,
};
use crate::error::DbError;

/// Projection shared by every show read.
const SHOW_FIELDS: &str = "meta::id(id) AS record_id, \
                           meta::id(venue) AS venue_id, \
                           meta::id(act) AS act_id, \
                           title, starts_at, total_units, created_at, updated_at";

#[derive(Debug, SurrealValue)]
struct ShowRowWithId {
    record_id: String,
    venue_id: String,
    act_id: String,
    title: String,
    starts_at: DateTime<Utc>,
    total_units: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShowRowWithId {
    fn try_into_show(self) -> Result<Show, DbError> {
        Ok(Show {
            id: parse_uuid(&self.record_id, "show")?,
            venue_id: parse_uuid(&self.venue_id, "venue")?,
            act_id: parse_uuid(&self.act_id, "act")?,
            title: self.title,
            starts_at: self.starts_at,
            total_units: self.total_units,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct ShrinkOutcomeRow {
    status: String,
    allocated: i64,
}

#[derive(Debug, SurrealValue)]
struct SummaryRow {
    total_units: i64,
    allocated_units: i64,
}

fn validate_title(title: &str) -> MarqueeResult<()> {
    if title.trim().is_empty() {
        return Err(MarqueeError::validation("show title is required"));
    }
    Ok(())
}

/// SurrealDB implementation of the Show repository.
#[derive(Clone)]
pub struct SurrealShowRepository<C: Connection> {
    db: Surreal<C>,
    interceptor: WriteInterceptor,
    lock_timeout: Duration,
}

impl<C: Connection> SurrealShowRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self::with_interceptor(db, WriteInterceptor::default())
    }

    pub fn with_interceptor(db: Surreal<C>, interceptor: WriteInterceptor) -> Self {
        Self {
            db,
            interceptor,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Budget for each update, measured from the moment the request is
    /// issued. An update still running when it expires is rolled back.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Resolve the venue and the act of a new show under one filter and
    /// return their common tenant.
    async fn resolve_parents(
        &self,
        filter: &TenantFilter<'_>,
        venue_id: Uuid,
        act_id: Uuid,
    ) -> MarqueeResult<Uuid> {
        let query = format!(
            "SELECT tenant_id FROM type::record('venue', $venue_id) WHERE {}; \
             SELECT tenant_id FROM type::record('act', $act_id) WHERE {};",
            filter.predicate(EntityKind::Venue),
            filter.predicate(EntityKind::Act),
        );

        let mut result = self
            .db
            .query(query)
            .bind(("venue_id", venue_id.to_string()))
            .bind(("act_id", act_id.to_string()))
            .bind((TENANT_PARAM, filter.binding()))
            .await
            .map_err(DbError::from)?;

        let venues: Vec<OwnerRow> = result.take(0).map_err(DbError::from)?;
        let acts: Vec<OwnerRow> = result.take(1).map_err(DbError::from)?;

        let venue = venues
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("venue", venue_id))?;
        let act = acts
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("act", act_id))?;

        // Only reachable for unscoped callers; scoped filters already
        // confine both lookups to one tenant.
        if venue.tenant_id != act.tenant_id {
            return Err(MarqueeError::validation(
                "venue and act belong to different tenants",
            ));
        }

        Ok(parse_uuid(&venue.tenant_id, "tenant")?)
    }
}

impl<C: Connection> ShowRepository for SurrealShowRepository<C> {
    async fn create(&self, ctx: &TenantContext, input: CreateShow) -> MarqueeResult<Show> {
        validate_title(&input.title)?;
        capacity::validate_total_units(input.total_units)?;

        let filter = TenantFilter::new(ctx);
        let stamp = self.interceptor.on_create(EntityKind::Show, None, ctx)?;
        self.resolve_parents(&filter, input.venue_id, input.act_id)
            .await?;

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let query = format!(
            "CREATE type::record('show', $id) SET \
             venue = type::record('venue', $venue_id), \
             act = type::record('act', $act_id), \
             title = $title, starts_at = $starts_at, total_units = $total_units, \
             created_at = $created_at, updated_at = $updated_at \
             RETURN NONE; \
             SELECT {SHOW_FIELDS} FROM type::record('show', $id);"
        );

        let result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("venue_id", input.venue_id.to_string()))
            .bind(("act_id", input.act_id.to_string()))
            .bind(("title", input.title))
            .bind(("starts_at", input.starts_at))
            .bind(("total_units", input.total_units))
            .bind(("created_at", stamp.created_at))
            .bind(("updated_at", stamp.updated_at))
            .await
            .map_err(|e| DbError::classify("show", e))?;

        let mut result = result.check().map_err(|e| DbError::classify("show", e))?;

        let rows: Vec<ShowRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("show", &id_str))?;

        Ok(row.try_into_show()?)
    }

    async fn get_by_id(&self, ctx: &TenantContext, id: Uuid) -> MarqueeResult<Show> {
        let filter = TenantFilter::new(ctx);
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "SELECT {SHOW_FIELDS} FROM type::record('show', $id) WHERE {}",
                filter.predicate(EntityKind::Show)
            ))
            .bind(("id", id_str.clone()))
            .bind((TENANT_PARAM, filter.binding()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ShowRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("show", &id_str))?;

        Ok(row.try_into_show()?)
    }

    async fn update(&self, ctx: &TenantContext, id: Uuid, input: UpdateShow) -> MarqueeResult<Show> {
        if let Some(title) = &input.title {
            validate_title(title)?;
        }
        if let Some(total_units) = input.total_units {
            capacity::validate_total_units(total_units)?;
        }

        let filter = TenantFilter::new(ctx);
        let id_str = id.to_string();
        let stamp = self.interceptor.on_update();

        let mut sets = Vec::new();
        if input.title.is_some() {
            sets.push("title = $title");
        }
        if input.starts_at.is_some() {
            sets.push("starts_at = $starts_at");
        }
        if input.total_units.is_some() {
            sets.push("total_units = $total_units");
        }
        sets.push("updated_at = $updated_at");

        // A capacity change is checked against the allocated sum inside
        // the same statement, after taking the per-show write.
        let shrink_check = if input.total_units.is_some() {
            format!(
                "UPDATE $show SET allocation_version += 1 RETURN NONE; \
                 LET $allocated = math::sum((SELECT VALUE unit_count FROM ticket_offer \
                     WHERE show = $show)); \
                 IF $total_units < $allocated {{ \
                     RETURN {{ status: '{OUTCOME_REJECTED}', allocated: $allocated }}; \
                 }};"
            )
        } else {
            "LET $allocated = 0;".to_string()
        };

        let query = format!(
            "RETURN {{ \
                 LET $show = (SELECT VALUE id FROM type::record('show', $id) WHERE {predicate})[0]; \
                 IF $show = NONE {{ \
                     RETURN {{ status: '{OUTCOME_NOT_FOUND}', allocated: 0 }}; \
                 }}; \
                 {shrink_check} \
                 {deadline} \
                 UPDATE $show SET {sets} RETURN NONE; \
                 RETURN {{ status: '{OUTCOME_ACCEPTED}', allocated: $allocated }}; \
             }}; \
             SELECT {SHOW_FIELDS} FROM type::record('show', $id);",
            predicate = filter.predicate(EntityKind::Show),
            sets = sets.join(", "),
            deadline = deadline_guard(),
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("deadline", deadline_after(self.lock_timeout)))
            .bind((TENANT_PARAM, filter.binding()))
            .bind(("updated_at", stamp.updated_at));

        if let Some(title) = input.title {
            builder = builder.bind(("title", title));
        }
        if let Some(starts_at) = input.starts_at {
            builder = builder.bind(("starts_at", starts_at));
        }
        if let Some(total_units) = input.total_units {
            builder = builder.bind(("total_units", total_units));
        }

        let result = builder
            .await
            .map_err(|e| DbError::classify_write("show", e, self.lock_timeout))?;
        let mut result = result
            .check()
            .map_err(|e| DbError::classify_write("show", e, self.lock_timeout))?;

        let outcome: Option<ShrinkOutcomeRow> = result.take(0).map_err(DbError::from)?;
        let outcome = outcome.ok_or_else(|| DbError::Query("missing show update outcome".into()))?;

        match outcome.status.as_str() {
            OUTCOME_NOT_FOUND => return Err(DbError::not_found("show", &id_str).into()),
            OUTCOME_REJECTED => {
                let requested = input.total_units.unwrap_or_default();
                capacity::check_shrink(requested, outcome.allocated)?;
                return Err(MarqueeError::Internal(format!(
                    "store rejected total units {requested} with {} allocated",
                    outcome.allocated
                )));
            }
            OUTCOME_ACCEPTED => {}
            other => {
                return Err(DbError::Query(format!("unknown show update outcome: {other}")).into());
            }
        }

        let rows: Vec<ShowRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("show", &id_str))?;

        Ok(row.try_into_show()?)
    }

    async fn list(
        &self,
        ctx: &TenantContext,
        pagination: Pagination,
    ) -> MarqueeResult<PaginatedResult<Show>> {
        let filter = TenantFilter::new(ctx);
        let predicate = filter.predicate(EntityKind::Show);

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM show WHERE {predicate} GROUP ALL"
            ))
            .bind((TENANT_PARAM, filter.binding()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "SELECT {SHOW_FIELDS} FROM show \
                 WHERE {predicate} \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset"
            ))
            .bind((TENANT_PARAM, filter.binding()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ShowRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_show())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_by_venue(&self, ctx: &TenantContext, venue_id: Uuid) -> MarqueeResult<Vec<Show>> {
        let filter = TenantFilter::new(ctx);

        let query = format!(
            "SELECT tenant_id FROM type::record('venue', $venue_id) WHERE {}; \
             SELECT {SHOW_FIELDS} FROM show \
             WHERE venue = type::record('venue', $venue_id) AND {} \
             ORDER BY starts_at ASC;",
            filter.predicate(EntityKind::Venue),
            filter.predicate(EntityKind::Show),
        );

        let mut result = self
            .db
            .query(query)
            .bind(("venue_id", venue_id.to_string()))
            .bind((TENANT_PARAM, filter.binding()))
            .await
            .map_err(DbError::from)?;

        let venues: Vec<OwnerRow> = result.take(0).map_err(DbError::from)?;
        if venues.is_empty() {
            return Err(DbError::not_found("venue", venue_id).into());
        }

        let rows: Vec<ShowRowWithId> = result.take(1).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_show())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }

    async fn capacity_summary(&self, ctx: &TenantContext, id: Uuid) -> MarqueeResult<CapacitySummary> {
        let filter = TenantFilter::new(ctx);
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "SELECT total_units, \
                 math::sum((SELECT VALUE unit_count FROM ticket_offer \
                     WHERE show = type::record('show', $id))) AS allocated_units \
                 FROM type::record('show', $id) WHERE {}",
                filter.predicate(EntityKind::Show)
            ))
            .bind(("id", id_str.clone()))
            .bind((TENANT_PARAM, filter.binding()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SummaryRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("show", &id_str))?;

        Ok(CapacitySummary::new(row.total_units, row.allocated_units))
    }
}
