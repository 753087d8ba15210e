//! Integration tests for the TicketOffer repository: the capacity
//! invariant and isolation through the offer -> show -> venue chain.

mod common;

use marquee_core::capacity::CapacitySummary;
use marquee_core::context::TenantContext;
use marquee_core::error::MarqueeError;
use marquee_core::models::ticket_offer::{CreateTicketOffer, UpdateTicketOffer};
use marquee_core::repository::{ShowRepository, TicketOfferRepository};

fn resize(unit_count: i64) -> UpdateTicketOffer {
    UpdateTicketOffer {
        unit_count: Some(unit_count),
        ..Default::default()
    }
}

fn assert_capacity_exceeded(err: MarqueeError, expected_available: i64) {
    match err {
        MarqueeError::CapacityExceeded { available } => assert_eq!(available, expected_available),
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn allocation_scenarios_on_thousand_unit_show() {
    let fx = common::setup().await;
    let ctx = fx.ctx_a();
    let show = fx.show_a(1000).await;

    // A: 600 fits.
    fx.offer(&ctx, show.id, 600).await.unwrap();
    let summary = fx.shows().capacity_summary(&ctx, show.id).await.unwrap();
    assert_eq!(
        summary,
        CapacitySummary {
            total_units: 1000,
            allocated_units: 600,
            available_units: 400,
        }
    );

    // B: 500 does not, and the error reports what is left.
    let err = fx.offer(&ctx, show.id, 500).await.unwrap_err();
    assert_capacity_exceeded(err, 400);

    // C: exactly the remainder fits.
    fx.offer(&ctx, show.id, 400).await.unwrap();
    let summary = fx.shows().capacity_summary(&ctx, show.id).await.unwrap();
    assert_eq!(
        summary,
        CapacitySummary {
            total_units: 1000,
            allocated_units: 1000,
            available_units: 0,
        }
    );

    // D: another tenant cannot see the show at all.
    let err = fx.shows().get_by_id(&fx.ctx_b(), show.id).await.unwrap_err();
    assert!(matches!(err, MarqueeError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn boundary_is_inclusive() {
    let fx = common::setup().await;
    let ctx = fx.ctx_a();
    let show = fx.show_a(100).await;
    fx.offer(&ctx, show.id, 60).await.unwrap();

    let err = fx.offer(&ctx, show.id, 41).await.unwrap_err();
    assert_capacity_exceeded(err, 40);

    fx.offer(&ctx, show.id, 40).await.unwrap();
}

#[tokio::test]
async fn rejected_create_persists_nothing() {
    let fx = common::setup().await;
    let ctx = fx.ctx_a();
    let show = fx.show_a(10).await;

    fx.offer(&ctx, show.id, 11).await.unwrap_err();

    let offers = fx.offers().list_by_show(&ctx, show.id).await.unwrap();
    assert!(offers.is_empty());
}

#[tokio::test]
async fn update_excludes_own_prior_units() {
    let fx = common::setup().await;
    let ctx = fx.ctx_a();
    let show = fx.show_a(150).await;
    let offer = fx.offer(&ctx, show.id, 100).await.unwrap();

    let grown = fx.offers().update(&ctx, offer.id, resize(150)).await.unwrap();
    assert_eq!(grown.unit_count, 150);
    assert_eq!(grown.created_at, offer.created_at);
}

#[tokio::test]
async fn update_counts_siblings() {
    let fx = common::setup().await;
    let ctx = fx.ctx_a();
    let show = fx.show_a(100).await;
    let first = fx.offer(&ctx, show.id, 50).await.unwrap();
    fx.offer(&ctx, show.id, 50).await.unwrap();

    let err = fx.offers().update(&ctx, first.id, resize(60)).await.unwrap_err();
    assert_capacity_exceeded(err, 50);

    let unchanged = fx.offers().get_by_id(&ctx, first.id).await.unwrap();
    assert_eq!(unchanged.unit_count, 50);

    // Shrinking never needs headroom.
    let shrunk = fx.offers().update(&ctx, first.id, resize(10)).await.unwrap();
    assert_eq!(shrunk.unit_count, 10);
}

#[tokio::test]
async fn update_without_unit_count_skips_capacity() {
    let fx = common::setup().await;
    let ctx = fx.ctx_a();
    let show = fx.show_a(100).await;
    let offer = fx.offer(&ctx, show.id, 100).await.unwrap();

    let renamed = fx
        .offers()
        .update(
            &ctx,
            offer.id,
            UpdateTicketOffer {
                name: Some("Balcony".into()),
                unit_price_cents: Some(9900),
                unit_count: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(renamed.name, "Balcony");
    assert_eq!(renamed.unit_price_cents, 9900);
    assert_eq!(renamed.unit_count, 100);
}

#[tokio::test]
async fn non_positive_units_are_input_errors() {
    let fx = common::setup().await;
    let ctx = fx.ctx_a();
    let show = fx.show_a(100).await;

    for units in [0, -5] {
        let err = fx.offer(&ctx, show.id, units).await.unwrap_err();
        assert!(matches!(err, MarqueeError::Validation { .. }), "got {err:?}");
    }

    let offer = fx.offer(&ctx, show.id, 5).await.unwrap();
    let err = fx.offers().update(&ctx, offer.id, resize(0)).await.unwrap_err();
    assert!(matches!(err, MarqueeError::Validation { .. }), "got {err:?}");
}

#[tokio::test]
async fn cross_tenant_create_is_not_found_before_capacity() {
    let fx = common::setup().await;
    let show = fx.show_a(10).await;

    // Far over capacity, yet the caller only learns the show does not exist.
    let err = fx.offer(&fx.ctx_b(), show.id, 1000).await.unwrap_err();
    assert!(matches!(err, MarqueeError::NotFound { .. }), "got {err:?}");
    assert_eq!(err.to_string(), "show not found");

    let err = fx
        .offer(&fx.ctx_a(), uuid::Uuid::new_v4(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, MarqueeError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn cross_tenant_offer_access_is_not_found() {
    let fx = common::setup().await;
    let show = fx.show_a(100).await;
    let offer = fx.offer(&fx.ctx_a(), show.id, 10).await.unwrap();
    let other = fx.ctx_b();

    let err = fx.offers().get_by_id(&other, offer.id).await.unwrap_err();
    assert!(matches!(err, MarqueeError::NotFound { .. }), "got {err:?}");

    let err = fx.offers().update(&other, offer.id, resize(20)).await.unwrap_err();
    assert!(matches!(err, MarqueeError::NotFound { .. }), "got {err:?}");

    let err = fx.offers().delete(&other, offer.id).await.unwrap_err();
    assert!(matches!(err, MarqueeError::NotFound { .. }), "got {err:?}");

    let err = fx.offers().list_by_show(&other, show.id).await.unwrap_err();
    assert!(matches!(err, MarqueeError::NotFound { .. }), "got {err:?}");

    let still_there = fx.offers().get_by_id(&fx.ctx_a(), offer.id).await.unwrap();
    assert_eq!(still_there.unit_count, 10);
}

#[tokio::test]
async fn delete_frees_capacity() {
    let fx = common::setup().await;
    let ctx = fx.ctx_a();
    let show = fx.show_a(100).await;
    let offer = fx.offer(&ctx, show.id, 100).await.unwrap();

    fx.offers().delete(&ctx, offer.id).await.unwrap();

    let summary = fx.shows().capacity_summary(&ctx, show.id).await.unwrap();
    assert_eq!(summary.available_units, 100);

    let err = fx.offers().delete(&ctx, offer.id).await.unwrap_err();
    assert!(matches!(err, MarqueeError::NotFound { .. }), "got {err:?}");

    fx.offer(&ctx, show.id, 100).await.unwrap();
}

#[tokio::test]
async fn list_by_show_returns_offers_in_creation_order() {
    let fx = common::setup().await;
    let ctx = fx.ctx_a();
    let show = fx.show_a(100).await;
    let other_show = fx.show_a(100).await;

    let first = fx.offer(&ctx, show.id, 10).await.unwrap();
    let second = fx.offer(&ctx, show.id, 20).await.unwrap();
    fx.offer(&ctx, other_show.id, 30).await.unwrap();

    let offers = fx.offers().list_by_show(&ctx, show.id).await.unwrap();
    let ids: Vec<_> = offers.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);

    let everything = fx
        .offers()
        .list_by_show(&TenantContext::unscoped(), show.id)
        .await
        .unwrap();
    assert_eq!(everything.len(), 2);
}

#[tokio::test]
async fn external_ref_is_kept_and_immutable() {
    let fx = common::setup().await;
    let ctx = fx.ctx_a();
    let show = fx.show_a(100).await;

    let offer = fx
        .offers()
        .create(
            &ctx,
            CreateTicketOffer {
                external_ref: Some("box-office-17".into()),
                ..common::offer_input(show.id, 5)
            },
        )
        .await
        .unwrap();
    assert_eq!(offer.external_ref.as_deref(), Some("box-office-17"));

    let result = fx
        .db
        .query("UPDATE type::record('ticket_offer', $id) SET external_ref = 'other'")
        .bind(("id", offer.id.to_string()))
        .await
        .unwrap();
    assert!(result.check().is_err());

    let updated = fx.offers().update(&ctx, offer.id, resize(6)).await.unwrap();
    assert_eq!(updated.external_ref.as_deref(), Some("box-office-17"));
}

#[tokio::test]
async fn create_past_deadline_is_rolled_back() {
    let fx = common::setup().await;
    let ctx = fx.ctx_a();
    let show = fx.show_a(100).await;

    let err = fx
        .expired_offers()
        .create(&ctx, common::offer_input(show.id, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, MarqueeError::Timeout { waited_ms: 0 }), "got {err:?}");
    assert!(err.is_retryable());

    let summary = fx.shows().capacity_summary(&ctx, show.id).await.unwrap();
    assert_eq!(summary.allocated_units, 0);
    assert!(fx.offers().list_by_show(&ctx, show.id).await.unwrap().is_empty());

    // The show's write counter was rolled back with everything else, so a
    // retry goes through normally.
    fx.offer(&ctx, show.id, 10).await.unwrap();
}

#[tokio::test]
async fn update_past_deadline_keeps_prior_units() {
    let fx = common::setup().await;
    let ctx = fx.ctx_a();
    let show = fx.show_a(100).await;
    let offer = fx.offer(&ctx, show.id, 10).await.unwrap();

    let err = fx
        .expired_offers()
        .update(&ctx, offer.id, resize(90))
        .await
        .unwrap_err();
    assert!(matches!(err, MarqueeError::Timeout { .. }), "got {err:?}");

    let unchanged = fx.offers().get_by_id(&ctx, offer.id).await.unwrap();
    assert_eq!(unchanged.unit_count, 10);
    assert_eq!(unchanged.updated_at, offer.updated_at);

    let summary = fx.shows().capacity_summary(&ctx, show.id).await.unwrap();
    assert_eq!(summary.allocated_units, 10);
}

#[tokio::test]
async fn capacity_rejection_wins_over_deadline() {
    let fx = common::setup().await;
    let ctx = fx.ctx_a();
    let show = fx.show_a(5).await;

    let err = fx
        .expired_offers()
        .create(&ctx, common::offer_input(show.id, 6))
        .await
        .unwrap_err();
    assert_capacity_exceeded(err, 5);
}
