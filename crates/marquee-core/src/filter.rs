//! Tenant filter predicates.
//!
//! Every tenant-scoped entity kind maps to a predicate that is conjoined
//! to each query touching it. Owned kinds compare their own `tenant_id`;
//! dependent kinds follow their required parent link until they reach an
//! owned kind, so an offer is checked through `show.venue.tenant_id`.
//!
//! The same rule is available in memory through [`Scoped::is_visible`]
//! for callers that already hold a loaded parent chain.

use crate::context::TenantContext;
use crate::models::act::Act;
use crate::models::show::Show;
use crate::models::ticket_offer::TicketOffer;
use crate::models::venue::Venue;

/// Name of the query parameter the predicates compare against.
pub const TENANT_PARAM: &str = "tenant_id";

/// Tenant-scoped entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Venue,
    Act,
    Show,
    TicketOffer,
}

impl EntityKind {
    /// Table that stores this kind.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Venue => "venue",
            EntityKind::Act => "act",
            EntityKind::Show => "show",
            EntityKind::TicketOffer => "ticket_offer",
        }
    }

    /// The link field and kind that this kind inherits its tenant from.
    /// `None` for kinds that store a tenant id themselves.
    pub fn tenant_parent(self) -> Option<(&'static str, EntityKind)> {
        match self {
            EntityKind::Venue | EntityKind::Act => None,
            EntityKind::Show => Some(("venue", EntityKind::Venue)),
            EntityKind::TicketOffer => Some(("show", EntityKind::Show)),
        }
    }

    /// Whether rows of this kind store `tenant_id` directly.
    pub fn is_owned(self) -> bool {
        self.tenant_parent().is_none()
    }

    /// Field path from a row of this kind to the owning tenant id.
    pub fn tenant_path(self) -> String {
        match self.tenant_parent() {
            None => "tenant_id".to_string(),
            Some((link, parent)) => format!("{link}.{}", parent.tenant_path()),
        }
    }
}

/// Builds tenant predicates for one request's [`TenantContext`].
#[derive(Debug, Clone, Copy)]
pub struct TenantFilter<'a> {
    ctx: &'a TenantContext,
}

impl<'a> TenantFilter<'a> {
    pub fn new(ctx: &'a TenantContext) -> Self {
        Self { ctx }
    }

    /// Predicate restricting rows of `kind` to the current tenant.
    ///
    /// Always bind [`TenantFilter::binding`] under [`TENANT_PARAM`] next
    /// to it. Unscoped contexts get a predicate that matches every row.
    pub fn predicate(&self, kind: EntityKind) -> String {
        if self.ctx.is_unscoped() {
            return "true".to_string();
        }
        format!("{} = ${TENANT_PARAM}", kind.tenant_path())
    }

    /// Value bound to [`TENANT_PARAM`].
    pub fn binding(&self) -> Option<String> {
        self.ctx.current_tenant_id().map(|id| id.to_string())
    }
}

/// A loaded entity together with the parents that determine its tenant.
///
/// Public API for code outside the repositories that already holds a
/// parent chain, such as a caller that fetched a show and its venue
/// unscoped and must decide whether a tenant may see them. The
/// repositories apply the same rule in the store through
/// [`TenantFilter::predicate`].
#[derive(Debug, Clone, Copy)]
pub enum Scoped<'a> {
    Venue(&'a Venue),
    Act(&'a Act),
    Show {
        show: &'a Show,
        venue: &'a Venue,
    },
    TicketOffer {
        offer: &'a TicketOffer,
        show: &'a Show,
        venue: &'a Venue,
    },
}

impl Scoped<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Scoped::Venue(_) => EntityKind::Venue,
            Scoped::Act(_) => EntityKind::Act,
            Scoped::Show { .. } => EntityKind::Show,
            Scoped::TicketOffer { .. } => EntityKind::TicketOffer,
        }
    }

    /// Whether the entity is visible under `ctx`.
    ///
    /// A parent chain that does not actually link up (an offer paired
    /// with some other show) is never visible.
    pub fn is_visible(&self, ctx: &TenantContext) -> bool {
        match *self {
            Scoped::Venue(venue) => ctx.permits(venue.tenant_id),
            Scoped::Act(act) => ctx.permits(act.tenant_id),
            Scoped::Show { show, venue } => {
                show.venue_id == venue.id && Scoped::Venue(venue).is_visible(ctx)
            }
            Scoped::TicketOffer { offer, show, venue } => {
                offer.show_id == show.id && Scoped::Show { show, venue }.is_visible(ctx)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn venue(tenant_id: Uuid) -> Venue {
        Venue {
            id: Uuid::new_v4(),
            tenant_id,
            name: "Hall".into(),
            address: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn show(venue: &Venue) -> Show {
        Show {
            id: Uuid::new_v4(),
            venue_id: venue.id,
            act_id: Uuid::new_v4(),
            title: "Opening night".into(),
            starts_at: Utc::now(),
            total_units: 100,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn offer(show: &Show) -> TicketOffer {
        TicketOffer {
            id: Uuid::new_v4(),
            show_id: show.id,
            name: "General".into(),
            unit_price_cents: 2500,
            unit_count: 10,
            external_ref: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn tenant_paths_follow_parent_links() {
        assert_eq!(EntityKind::Venue.tenant_path(), "tenant_id");
        assert_eq!(EntityKind::Act.tenant_path(), "tenant_id");
        assert_eq!(EntityKind::Show.tenant_path(), "venue.tenant_id");
        assert_eq!(
            EntityKind::TicketOffer.tenant_path(),
            "show.venue.tenant_id"
        );
    }

    #[test]
    fn scoped_predicate_compares_against_parameter() {
        let ctx = TenantContext::for_tenant(Uuid::new_v4());
        let filter = TenantFilter::new(&ctx);
        assert_eq!(
            filter.predicate(EntityKind::TicketOffer),
            "show.venue.tenant_id = $tenant_id"
        );
        assert_eq!(
            filter.binding(),
            ctx.current_tenant_id().map(|id| id.to_string())
        );
    }

    #[test]
    fn unscoped_predicate_matches_everything() {
        let ctx = TenantContext::unscoped();
        let filter = TenantFilter::new(&ctx);
        assert_eq!(filter.predicate(EntityKind::Show), "true");
        assert!(filter.binding().is_none());
    }

    #[test]
    fn visibility_is_inherited_through_the_chain() {
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let v = venue(t1);
        let s = show(&v);
        let o = offer(&s);
        let entity = Scoped::TicketOffer {
            offer: &o,
            show: &s,
            venue: &v,
        };

        assert!(entity.is_visible(&TenantContext::for_tenant(t1)));
        assert!(!entity.is_visible(&TenantContext::for_tenant(t2)));
        assert!(entity.is_visible(&TenantContext::unscoped()));
        assert_eq!(entity.kind(), EntityKind::TicketOffer);
    }

    #[test]
    fn broken_chain_is_not_visible() {
        let t1 = Uuid::new_v4();
        let v = venue(t1);
        let s = show(&v);
        let other_venue = venue(t1);

        let entity = Scoped::Show {
            show: &s,
            venue: &other_venue,
        };
        assert!(!entity.is_visible(&TenantContext::for_tenant(t1)));
    }
}
