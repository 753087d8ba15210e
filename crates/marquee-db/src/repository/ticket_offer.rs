//! SurrealDB implementation of [`TicketOfferRepository`].
//!
//! Offer creates and unit-count updates run as a single SurrealQL
//! statement, which SurrealDB executes as one transaction:
//!
//! 1. resolve the show under the tenant filter,
//! 2. bump the show's `allocation_version`,
//! 3. sum the unit counts of the show's other offers,
//! 4. write the offer only if the requested count still fits and the
//!    write's deadline has not passed.
//!
//! Step 2 makes every concurrent writer on the same show write the same
//! row, so at most one of them commits; the others fail with a
//! transaction conflict and leave nothing behind. A block that reaches
//! the write after its deadline throws, which also leaves nothing behind,
//! even when the caller has already stopped waiting for the answer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use marquee_core::capacity::CapacityCheck;
use marquee_core::context::TenantContext;
use marquee_core::error::{MarqueeError, MarqueeResult};
use marquee_core::filter::{EntityKind, TENANT_PARAM, TenantFilter};
use marquee_core::interceptor::WriteInterceptor;
use marquee_core::models::ticket_offer::{CreateTicketOffer, TicketOffer, UpdateTicketOffer};
use marquee_core::repository::TicketOfferRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{
    DEFAULT_LOCK_TIMEOUT, OUTCOME_ACCEPTED, OUTCOME_NOT_FOUND, OUTCOME_REJECTED, deadline_after,
    deadline_guard, parse_uuid,
};
use crate::error::DbError;

/// Projection shared by every offer read.
const OFFER_FIELDS: &str = "meta::id(id) AS record_id, \
                            meta::id(show) AS show_id, \
                            name, unit_price_cents, unit_count, external_ref, \
                            created_at, updated_at";

#[derive(Debug, SurrealValue)]
struct OfferRowWithId {
    record_id: String,
    show_id: String,
    name: String,
    unit_price_cents: i64,
    unit_count: i64,
    external_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OfferRowWithId {
    fn try_into_offer(self) -> Result<TicketOffer, DbError> {
        Ok(TicketOffer {
            id: parse_uuid(&self.record_id, "ticket offer")?,
            show_id: parse_uuid(&self.show_id, "show")?,
            name: self.name,
            unit_price_cents: self.unit_price_cents,
            unit_count: self.unit_count,
            external_ref: self.external_ref,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Result of a serialized allocation block.
#[derive(Debug, SurrealValue)]
struct AllocationOutcomeRow {
    status: String,
    total_units: i64,
    other_allocated: i64,
}

#[derive(Debug, SurrealValue)]
struct StatusRow {
    status: String,
}

#[derive(Debug, SurrealValue)]
struct TotalRow {
    total_units: i64,
}

/// Statements that take the show's write, compute what its other offers
/// hold and return early with a rejection when `$unit_count` does not
/// fit. Expects `$show` (record id) and `$offer_ref` (record id of the
/// offer being written) to be in scope.
fn capacity_guard() -> String {
    format!(
        "UPDATE $show SET allocation_version += 1 RETURN NONE; \
         LET $total = (SELECT VALUE total_units FROM $show)[0]; \
         LET $other = math::sum((SELECT VALUE unit_count FROM ticket_offer \
             WHERE show = $show AND id != $offer_ref)); \
         IF $unit_count > $total - $other {{ \
             RETURN {{ status: '{OUTCOME_REJECTED}', total_units: $total, \
                 other_allocated: $other }}; \
         }};"
    )
}

/// Map a block outcome to success or to the error it stands for.
fn interpret(
    outcome: Option<AllocationOutcomeRow>,
    requested: Option<i64>,
    id_str: &str,
    entity: &str,
) -> MarqueeResult<()> {
    let outcome = outcome.ok_or_else(|| DbError::Query("missing allocation outcome".into()))?;
    match outcome.status.as_str() {
        OUTCOME_ACCEPTED => Ok(()),
        OUTCOME_NOT_FOUND => Err(DbError::not_found(entity, id_str).into()),
        OUTCOME_REJECTED => {
            let check = CapacityCheck::new(outcome.total_units, outcome.other_allocated);
            let requested = requested.unwrap_or_default();
            check.admit(requested)?;
            Err(MarqueeError::Internal(format!(
                "store rejected {requested} units with {} available",
                check.available()
            )))
        }
        other => Err(DbError::Query(format!("unknown allocation outcome: {other}")).into()),
    }
}

/// SurrealDB implementation of the TicketOffer repository.
#[derive(Clone)]
pub struct SurrealTicketOfferRepository<C: Connection> {
    db: Surreal<C>,
    interceptor: WriteInterceptor,
    lock_timeout: Duration,
}

impl<C: Connection> SurrealTicketOfferRepository<C> {
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

    /// Budget for each create or update, measured from the moment the
    /// request is issued. A write still running when it expires is rolled
    /// back by the store.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

impl<C: Connection> TicketOfferRepository for SurrealTicketOfferRepository<C> {
    async fn create(
        &self,
        ctx: &TenantContext,
        input: CreateTicketOffer,
    ) -> MarqueeResult<TicketOffer> {
        input.validate()?;

        let filter = TenantFilter::new(ctx);
        let stamp = self
            .interceptor
            .on_create(EntityKind::TicketOffer, None, ctx)?;

        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let show_id_str = input.show_id.to_string();
        let requested = input.unit_count;

        let query = format!(
            "RETURN {{ \
                 LET $show = (SELECT VALUE id FROM type::record('show', $show_id) \
                     WHERE {predicate})[0]; \
                 IF $show = NONE {{ \
                     RETURN {{ status: '{OUTCOME_NOT_FOUND}', total_units: 0, \
                         other_allocated: 0 }}; \
                 }}; \
                 LET $offer_ref = type::record('ticket_offer', $id); \
                 {guard} \
                 {deadline} \
                 CREATE $offer_ref SET \
                     show = $show, name = $name, \
                     unit_price_cents = $unit_price_cents, unit_count = $unit_count, \
                     external_ref = $external_ref, \
                     created_at = $created_at, updated_at = $updated_at \
                     RETURN NONE; \
                 RETURN {{ status: '{OUTCOME_ACCEPTED}', total_units: $total, \
                     other_allocated: $other }}; \
             }}; \
             SELECT {OFFER_FIELDS} FROM type::record('ticket_offer', $id);",
            predicate = filter.predicate(EntityKind::Show),
            guard = capacity_guard(),
            deadline = deadline_guard(),
        );

        let result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("deadline", deadline_after(self.lock_timeout)))
            .bind(("show_id", show_id_str.clone()))
            .bind((TENANT_PARAM, filter.binding()))
            .bind(("name", input.name))
            .bind(("unit_price_cents", input.unit_price_cents))
            .bind(("unit_count", input.unit_count))
            .bind(("external_ref", input.external_ref))
            .bind(("created_at", stamp.created_at))
            .bind(("updated_at", stamp.updated_at))
            .await
            .map_err(|e| DbError::classify_write("ticket_offer", e, self.lock_timeout))?;

        let mut result = result
            .check()
            .map_err(|e| DbError::classify_write("ticket_offer", e, self.lock_timeout))?;

        let outcome: Option<AllocationOutcomeRow> = result.take(0).map_err(DbError::from)?;
        interpret(outcome, Some(requested), &show_id_str, "show")?;

        let rows: Vec<OfferRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("ticket_offer", &id_str))?;

        Ok(row.try_into_offer()?)
    }

    async fn get_by_id(&self, ctx: &TenantContext, id: Uuid) -> MarqueeResult<TicketOffer> {
        let filter = TenantFilter::new(ctx);
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "SELECT {OFFER_FIELDS} FROM type::record('ticket_offer', $id) WHERE {}",
                filter.predicate(EntityKind::TicketOffer)
            ))
            .bind(("id", id_str.clone()))
            .bind((TENANT_PARAM, filter.binding()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OfferRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("ticket_offer", &id_str))?;

        Ok(row.try_into_offer()?)
    }

    async fn update(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        input: UpdateTicketOffer,
    ) -> MarqueeResult<TicketOffer> {
        input.validate()?;

        let filter = TenantFilter::new(ctx);
        let id_str = id.to_string();
        let stamp = self.interceptor.on_update();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.unit_price_cents.is_some() {
            sets.push("unit_price_cents = $unit_price_cents");
        }
        if input.unit_count.is_some() {
            sets.push("unit_count = $unit_count");
        }
        sets.push("updated_at = $updated_at");

        // Only a unit count change needs the capacity guard.
        let guard = if input.unit_count.is_some() {
            capacity_guard()
        } else {
            "LET $total = 0; LET $other = 0;".to_string()
        };

        let query = format!(
            "RETURN {{ \
                 LET $found = (SELECT id, show FROM type::record('ticket_offer', $id) \
                     WHERE {predicate})[0]; \
                 IF $found = NONE {{ \
                     RETURN {{ status: '{OUTCOME_NOT_FOUND}', total_units: 0, \
                         other_allocated: 0 }}; \
                 }}; \
                 LET $offer_ref = $found.id; \
                 LET $show = $found.show; \
                 {guard} \
                 {deadline} \
                 UPDATE $offer_ref SET {sets} RETURN NONE; \
                 RETURN {{ status: '{OUTCOME_ACCEPTED}', total_units: $total, \
                     other_allocated: $other }}; \
             }}; \
             SELECT {OFFER_FIELDS} FROM type::record('ticket_offer', $id);",
            predicate = filter.predicate(EntityKind::TicketOffer),
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

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(price) = input.unit_price_cents {
            builder = builder.bind(("unit_price_cents", price));
        }
        if let Some(unit_count) = input.unit_count {
            builder = builder.bind(("unit_count", unit_count));
        }

        let result = builder
            .await
            .map_err(|e| DbError::classify_write("ticket_offer", e, self.lock_timeout))?;
        let mut result = result
            .check()
            .map_err(|e| DbError::classify_write("ticket_offer", e, self.lock_timeout))?;

        let outcome: Option<AllocationOutcomeRow> = result.take(0).map_err(DbError::from)?;
        interpret(outcome, input.unit_count, &id_str, "ticket_offer")?;

        let rows: Vec<OfferRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("ticket_offer", &id_str))?;

        Ok(row.try_into_offer()?)
    }

    async fn delete(&self, ctx: &TenantContext, id: Uuid) -> MarqueeResult<()> {
        let filter = TenantFilter::new(ctx);
        let id_str = id.to_string();

        // Removing units can only free capacity, so no guard is taken.
        let query = format!(
            "RETURN {{ \
                 LET $offer = (SELECT VALUE id FROM type::record('ticket_offer', $id) \
                     WHERE {predicate})[0]; \
                 IF $offer = NONE {{ RETURN {{ status: '{OUTCOME_NOT_FOUND}' }}; }}; \
                 DELETE $offer; \
                 RETURN {{ status: '{OUTCOME_ACCEPTED}' }}; \
             }};",
            predicate = filter.predicate(EntityKind::TicketOffer),
        );

        let result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind((TENANT_PARAM, filter.binding()))
            .await
            .map_err(|e| DbError::classify("ticket_offer", e))?;
        let mut result = result
            .check()
            .map_err(|e| DbError::classify("ticket_offer", e))?;

        let outcome: Option<StatusRow> = result.take(0).map_err(DbError::from)?;
        match outcome.as_ref().map(|o| o.status.as_str()) {
            Some(OUTCOME_ACCEPTED) => Ok(()),
            Some(OUTCOME_NOT_FOUND) => Err(DbError::not_found("ticket_offer", &id_str).into()),
            other => Err(DbError::Query(format!("unexpected delete outcome: {other:?}")).into()),
        }
    }

    async fn list_by_show(
        &self,
        ctx: &TenantContext,
        show_id: Uuid,
    ) -> MarqueeResult<Vec<TicketOffer>> {
        let filter = TenantFilter::new(ctx);

        let query = format!(
            "SELECT total_units FROM type::record('show', $show_id) WHERE {}; \
             SELECT {OFFER_FIELDS} FROM ticket_offer \
             WHERE show = type::record('show', $show_id) AND {} \
             ORDER BY created_at ASC;",
            filter.predicate(EntityKind::Show),
            filter.predicate(EntityKind::TicketOffer),
        );

        let mut result = self
            .db
            .query(query)
            .bind(("show_id", show_id.to_string()))
            .bind((TENANT_PARAM, filter.binding()))
            .await
            .map_err(DbError::from)?;

        let shows: Vec<TotalRow> = result.take(0).map_err(DbError::from)?;
        if shows.is_empty() {
            return Err(DbError::not_found("show", show_id).into());
        }

        let rows: Vec<OfferRowWithId> = result.take(1).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_offer())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}
