//! Allocation service — capacity-checked offer writes.

use std::future::Future;

use marquee_core::capacity::{CapacitySummary, validate_unit_count};
use marquee_core::context::TenantContext;
use marquee_core::error::{MarqueeError, MarqueeResult};
use marquee_core::models::ticket_offer::{CreateTicketOffer, TicketOffer, UpdateTicketOffer};
use marquee_core::repository::{ShowRepository, TicketOfferRepository};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BookingConfig;
use crate::error::BookingError;

/// Lifecycle of a single allocation write.
///
/// `Received -> Validating -> {Accepted, Rejected}`. Input that fails the
/// local checks goes straight from `Received` to `Rejected` without
/// touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationState {
    Received,
    Validating,
    Accepted,
    Rejected,
}

impl AllocationState {
    pub fn can_advance_to(self, next: AllocationState) -> bool {
        use AllocationState::*;
        matches!(
            (self, next),
            (Received, Validating)
                | (Received, Rejected)
                | (Validating, Accepted)
                | (Validating, Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AllocationState::Accepted | AllocationState::Rejected)
    }
}

/// Tracks and logs the state of one write.
struct Allocation {
    op: &'static str,
    target: Uuid,
    state: AllocationState,
}

impl Allocation {
    fn received(op: &'static str, target: Uuid) -> Self {
        debug!(op, id = %target, "allocation received");
        Self {
            op,
            target,
            state: AllocationState::Received,
        }
    }

    fn advance(&mut self, next: AllocationState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal allocation transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(
            op = self.op,
            id = %self.target,
            from = ?self.state,
            to = ?next,
            "allocation state changed"
        );
        self.state = next;
    }

    fn reject(&mut self, err: &MarqueeError) {
        match err {
            MarqueeError::CapacityExceeded { available } => {
                info!(
                    op = self.op,
                    id = %self.target,
                    available,
                    "allocation rejected: capacity exceeded"
                );
            }
            e if e.is_retryable() => {
                warn!(op = self.op, id = %self.target, error = %e, "allocation abandoned");
            }
            e => {
                debug!(op = self.op, id = %self.target, error = %e, "allocation rejected");
            }
        }
        self.advance(AllocationState::Rejected);
    }

    fn settle<T>(&mut self, result: &MarqueeResult<T>) {
        match result {
            Ok(_) => self.advance(AllocationState::Accepted),
            Err(e) => self.reject(e),
        }
    }
}

/// Allocation service.
///
/// The only write path for ticket offers. Input is checked before any
/// store work; the capacity check and the write itself run as one atomic
/// unit inside the repository, bounded by the configured lock timeout.
pub struct AllocationService<S: ShowRepository, O: TicketOfferRepository> {
    shows: S,
    offers: O,
    config: BookingConfig,
}

impl<S: ShowRepository, O: TicketOfferRepository> AllocationService<S, O> {
    pub fn new(shows: S, offers: O, config: BookingConfig) -> Self {
        Self {
            shows,
            offers,
            config,
        }
    }

    /// Allocate `unit_count` units of a show to a new offer.
    pub async fn create_allocation(
        &self,
        ctx: &TenantContext,
        input: CreateTicketOffer,
    ) -> MarqueeResult<TicketOffer> {
        let mut allocation = Allocation::received("create", input.show_id);

        if let Err(e) = input.validate() {
            allocation.reject(&e);
            return Err(e);
        }

        allocation.advance(AllocationState::Validating);
        let result = self
            .serialized(|| self.offers.create(ctx, input.clone()))
            .await;
        allocation.settle(&result);
        result
    }

    /// Change an existing offer. A new unit count is checked against the
    /// other offers of the same show; the offer's own prior count is not
    /// counted.
    pub async fn update_allocation(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        input: UpdateTicketOffer,
    ) -> MarqueeResult<TicketOffer> {
        let mut allocation = Allocation::received("update", id);

        if let Err(e) = input.validate() {
            allocation.reject(&e);
            return Err(e);
        }

        allocation.advance(AllocationState::Validating);
        let result = self
            .serialized(|| self.offers.update(ctx, id, input.clone()))
            .await;
        allocation.settle(&result);
        result
    }

    /// Convenience for the common case of only changing the unit count.
    pub async fn resize_allocation(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        unit_count: i64,
    ) -> MarqueeResult<TicketOffer> {
        validate_unit_count(unit_count)?;
        self.update_allocation(
            ctx,
            id,
            UpdateTicketOffer {
                unit_count: Some(unit_count),
                ..Default::default()
            },
        )
        .await
    }

    /// Release an offer. Freeing units never needs a capacity check.
    pub async fn delete_allocation(&self, ctx: &TenantContext, id: Uuid) -> MarqueeResult<()> {
        self.offers.delete(ctx, id).await?;
        debug!(%id, "allocation released");
        Ok(())
    }

    pub async fn get_allocation(&self, ctx: &TenantContext, id: Uuid) -> MarqueeResult<TicketOffer> {
        self.offers.get_by_id(ctx, id).await
    }

    pub async fn list_allocations(
        &self,
        ctx: &TenantContext,
        show_id: Uuid,
    ) -> MarqueeResult<Vec<TicketOffer>> {
        self.offers.list_by_show(ctx, show_id).await
    }

    /// Totals for a show, computed from the store on every call.
    pub async fn get_capacity_summary(
        &self,
        ctx: &TenantContext,
        show_id: Uuid,
    ) -> MarqueeResult<CapacitySummary> {
        self.shows.capacity_summary(ctx, show_id).await
    }

    /// Run one capacity-checked write.
    ///
    /// A write that lost the commit race on its show persisted nothing and
    /// is re-run against fresh totals, up to the configured attempt count.
    /// Each re-run is logged. A write that passes its lock timeout is
    /// rolled back by the store and reported as `Timeout`. If the store
    /// does not answer within the lock timeout plus the response grace,
    /// the service stops waiting and also reports `Timeout`. Timeouts are
    /// never re-run here.
    async fn serialized<T, F, Fut>(&self, mut write: F) -> MarqueeResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MarqueeResult<T>>,
    {
        let limit = self.config.attempts();
        let mut attempt = 1;

        loop {
            match tokio::time::timeout(self.config.response_timeout(), write()).await {
                Err(_) => {
                    warn!(
                        waited_ms = self.config.lock_timeout_ms,
                        "no answer from the store within the response grace"
                    );
                    return Err(BookingError::LockTimeout {
                        waited_ms: self.config.lock_timeout_ms,
                    }
                    .into());
                }
                Ok(Err(MarqueeError::Conflict(reason))) => {
                    if attempt >= limit {
                        return Err(BookingError::ConflictRetriesExhausted {
                            attempts: attempt,
                            reason,
                        }
                        .into());
                    }
                    info!(attempt, %reason, "allocation conflicted, re-validating");
                    attempt += 1;
                }
                Ok(result) => return result,
            }
        }
    }
}
