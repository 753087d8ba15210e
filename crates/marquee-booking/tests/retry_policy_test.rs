//! Conflict re-attempt and lock timeout behaviour of the allocation
//! service, driven by scripted repositories.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::Utc;
use marquee_booking::{AllocationService, BookingConfig};
use marquee_core::capacity::CapacitySummary;
use marquee_core::context::TenantContext;
use marquee_core::error::{MarqueeError, MarqueeResult};
use marquee_core::models::show::{CreateShow, Show, UpdateShow};
use marquee_core::models::ticket_offer::{CreateTicketOffer, TicketOffer, UpdateTicketOffer};
use marquee_core::repository::{
    PaginatedResult, Pagination, ShowRepository, TicketOfferRepository,
};
use uuid::Uuid;

/// Show repository the retry paths never reach.
struct NoShows;

impl ShowRepository for NoShows {
    async fn create(&self, _ctx: &TenantContext, _input: CreateShow) -> MarqueeResult<Show> {
        unimplemented!()
    }
    async fn get_by_id(&self, _ctx: &TenantContext, _id: Uuid) -> MarqueeResult<Show> {
        unimplemented!()
    }
    async fn update(
        &self,
        _ctx: &TenantContext,
        _id: Uuid,
        _input: UpdateShow,
    ) -> MarqueeResult<Show> {
        unimplemented!()
    }
    async fn list(
        &self,
        _ctx: &TenantContext,
        _pagination: Pagination,
    ) -> MarqueeResult<PaginatedResult<Show>> {
        unimplemented!()
    }
    async fn list_by_venue(&self, _ctx: &TenantContext, _venue_id: Uuid) -> MarqueeResult<Vec<Show>> {
        unimplemented!()
    }
    async fn capacity_summary(
        &self,
        _ctx: &TenantContext,
        _id: Uuid,
    ) -> MarqueeResult<CapacitySummary> {
        unimplemented!()
    }
}

/// Fails the first `conflicts` writes with a commit conflict, optionally
/// stalling every write first.
struct ScriptedOffers {
    conflicts: AtomicU32,
    calls: Arc<AtomicU32>,
    stall: Option<Duration>,
}

impl ScriptedOffers {
    fn new(conflicts: u32, stall: Option<Duration>) -> Self {
        Self {
            conflicts: AtomicU32::new(conflicts),
            calls: Arc::new(AtomicU32::new(0)),
            stall,
        }
    }

    async fn write(&self, show_id: Uuid, unit_count: i64) -> MarqueeResult<TicketOffer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(MarqueeError::Conflict(
                "read or write conflict, can be retried".into(),
            ));
        }
        let now = Utc::now();
        Ok(TicketOffer {
            id: Uuid::new_v4(),
            show_id,
            name: "Scripted".into(),
            unit_price_cents: 0,
            unit_count,
            external_ref: None,
            created_at: now,
            updated_at: now,
        })
    }
}

impl TicketOfferRepository for ScriptedOffers {
    async fn create(
        &self,
        _ctx: &TenantContext,
        input: CreateTicketOffer,
    ) -> MarqueeResult<TicketOffer> {
        self.write(input.show_id, input.unit_count).await
    }
    async fn get_by_id(&self, _ctx: &TenantContext, _id: Uuid) -> MarqueeResult<TicketOffer> {
        unimplemented!()
    }
    async fn update(
        &self,
        _ctx: &TenantContext,
        _id: Uuid,
        input: UpdateTicketOffer,
    ) -> MarqueeResult<TicketOffer> {
        self.write(Uuid::nil(), input.unit_count.unwrap_or(1)).await
    }
    async fn delete(&self, _ctx: &TenantContext, _id: Uuid) -> MarqueeResult<()> {
        unimplemented!()
    }
    async fn list_by_show(
        &self,
        _ctx: &TenantContext,
        _show_id: Uuid,
    ) -> MarqueeResult<Vec<TicketOffer>> {
        unimplemented!()
    }
}

type Scripted = AllocationService<NoShows, ScriptedOffers>;

/// The service plus a counter of repository writes it issued.
fn service(offers: ScriptedOffers, config: BookingConfig) -> (Scripted, Arc<AtomicU32>) {
    let calls = Arc::clone(&offers.calls);
    (AllocationService::new(NoShows, offers, config), calls)
}

fn input() -> CreateTicketOffer {
    CreateTicketOffer {
        show_id: Uuid::new_v4(),
        name: "Stalls".into(),
        unit_price_cents: 1500,
        unit_count: 4,
        external_ref: None,
    }
}

fn ctx() -> TenantContext {
    TenantContext::for_tenant(Uuid::new_v4())
}

#[tokio::test]
async fn conflicts_are_revalidated_until_success() {
    let (svc, calls) = service(ScriptedOffers::new(2, None), BookingConfig::default());

    let offer = svc.create_allocation(&ctx(), input()).await.unwrap();

    assert_eq!(offer.unit_count, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_conflicts_surface_as_retryable() {
    let config = BookingConfig {
        max_conflict_attempts: 2,
        ..Default::default()
    };
    let (svc, calls) = service(ScriptedOffers::new(5, None), config);

    let err = svc.create_allocation(&ctx(), input()).await.unwrap_err();

    assert!(matches!(err, MarqueeError::Conflict(_)), "got {err:?}");
    assert!(err.is_retryable());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn zero_attempts_still_tries_once() {
    let config = BookingConfig {
        max_conflict_attempts: 0,
        ..Default::default()
    };
    let (svc, calls) = service(ScriptedOffers::new(0, None), config);

    svc.create_allocation(&ctx(), input()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn lock_timeout_is_reported_and_not_retried() {
    let config = BookingConfig {
        lock_timeout_ms: 20,
        response_grace_ms: 0,
        ..Default::default()
    };
    let (svc, calls) = service(
        ScriptedOffers::new(0, Some(Duration::from_millis(500))),
        config,
    );

    let err = svc.create_allocation(&ctx(), input()).await.unwrap_err();

    assert!(
        matches!(err, MarqueeError::Timeout { waited_ms: 20 }),
        "got {err:?}"
    );
    assert!(err.is_retryable());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn update_uses_the_same_policy() {
    let (svc, calls) = service(ScriptedOffers::new(1, None), BookingConfig::default());

    let offer = svc
        .resize_allocation(&ctx(), Uuid::new_v4(), 7)
        .await
        .unwrap();

    assert_eq!(offer.unit_count, 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalid_input_never_reaches_the_repository() {
    let (svc, calls) = service(ScriptedOffers::new(0, None), BookingConfig::default());

    let err = svc
        .create_allocation(
            &ctx(),
            CreateTicketOffer {
                unit_count: 0,
                ..input()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MarqueeError::Validation { .. }), "got {err:?}");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
