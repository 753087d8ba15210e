//! Shared fixtures: an in-memory store with two tenants, each owning one
//! venue and one act.

#![allow(dead_code)]

use std::time::Duration;

use chrono::{TimeZone, Utc};
use marquee_core::context::TenantContext;
use marquee_core::models::act::CreateAct;
use marquee_core::models::show::{CreateShow, Show};
use marquee_core::models::tenant::CreateTenant;
use marquee_core::models::ticket_offer::{CreateTicketOffer, TicketOffer};
use marquee_core::models::venue::CreateVenue;
use marquee_core::repository::{
    ActRepository, ShowRepository, TenantRepository, TicketOfferRepository, VenueRepository,
};
use marquee_db::repository::{
    SurrealActRepository, SurrealShowRepository, SurrealTenantRepository,
    SurrealTicketOfferRepository, SurrealVenueRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

pub struct Fixture {
    pub db: Surreal<Db>,
    pub tenant_a: Uuid,
    pub tenant_b: Uuid,
    pub venue_a: Uuid,
    pub act_a: Uuid,
    pub venue_b: Uuid,
    pub act_b: Uuid,
}

impl Fixture {
    pub fn ctx_a(&self) -> TenantContext {
        TenantContext::for_tenant(self.tenant_a)
    }

    pub fn ctx_b(&self) -> TenantContext {
        TenantContext::for_tenant(self.tenant_b)
    }

    pub fn shows(&self) -> SurrealShowRepository<Db> {
        SurrealShowRepository::new(self.db.clone())
    }

    pub fn offers(&self) -> SurrealTicketOfferRepository<Db> {
        SurrealTicketOfferRepository::new(self.db.clone())
    }

    /// Offer repository whose writes are already past their deadline when
    /// they reach the store.
    pub fn expired_offers(&self) -> SurrealTicketOfferRepository<Db> {
        self.offers().with_lock_timeout(Duration::ZERO)
    }

    /// A show of tenant A with the given capacity.
    pub async fn show_a(&self, total_units: i64) -> Show {
        self.shows()
            .create(
                &self.ctx_a(),
                CreateShow {
                    venue_id: self.venue_a,
                    act_id: self.act_a,
                    title: "Opening Night".into(),
                    starts_at: Utc.with_ymd_and_hms(2026, 11, 20, 20, 0, 0).unwrap(),
                    total_units,
                },
            )
            .await
            .unwrap()
    }

    pub async fn offer(
        &self,
        ctx: &TenantContext,
        show_id: Uuid,
        unit_count: i64,
    ) -> marquee_core::MarqueeResult<TicketOffer> {
        self.offers().create(ctx, offer_input(show_id, unit_count)).await
    }
}

pub fn offer_input(show_id: Uuid, unit_count: i64) -> CreateTicketOffer {
    CreateTicketOffer {
        show_id,
        name: format!("Block of {unit_count}"),
        unit_price_cents: 4500,
        unit_count,
        external_ref: None,
    }
}

pub async fn empty_db() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    marquee_db::run_migrations(&db).await.unwrap();
    db
}

pub async fn create_tenant(db: &Surreal<Db>, slug: &str) -> Uuid {
    SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: format!("Tenant {slug}"),
            slug: slug.into(),
            metadata: None,
        })
        .await
        .unwrap()
        .id
}

/// Helper: spin up in-memory DB, run migrations, create two tenants with a
/// venue and an act each.
pub async fn setup() -> Fixture {
    let db = empty_db().await;
    let tenant_a = create_tenant(&db, "north").await;
    let tenant_b = create_tenant(&db, "south").await;

    let venues = SurrealVenueRepository::new(db.clone());
    let acts = SurrealActRepository::new(db.clone());

    let mut owned = Vec::new();
    for tenant in [tenant_a, tenant_b] {
        let ctx = TenantContext::for_tenant(tenant);
        let venue = venues
            .create(
                &ctx,
                CreateVenue {
                    tenant_id: None,
                    name: "Main Hall".into(),
                    address: Some("1 Stage Road".into()),
                    metadata: None,
                },
            )
            .await
            .unwrap();
        let act = acts
            .create(
                &ctx,
                CreateAct {
                    tenant_id: None,
                    name: "The Regulars".into(),
                    description: "House band".into(),
                    metadata: None,
                },
            )
            .await
            .unwrap();
        owned.push((venue.id, act.id));
    }

    Fixture {
        db,
        tenant_a,
        tenant_b,
        venue_a: owned[0].0,
        act_a: owned[0].1,
        venue_b: owned[1].0,
        act_b: owned[1].1,
    }
}
