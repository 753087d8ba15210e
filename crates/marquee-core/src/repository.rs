//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Every tenant-scoped operation
//! takes the request's [`TenantContext`]; implementations must apply the
//! tenant filter to every read and report filtered-out rows exactly like
//! missing ones.

use uuid::Uuid;

use crate::capacity::CapacitySummary;
use crate::context::TenantContext;
use crate::error::MarqueeResult;
use crate::models::{
    act::{Act, CreateAct, UpdateAct},
    show::{CreateShow, Show, UpdateShow},
    tenant::{CreateTenant, Tenant, UpdateTenant},
    ticket_offer::{CreateTicketOffer, TicketOffer, UpdateTicketOffer},
    venue::{CreateVenue, UpdateVenue, Venue},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenants (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = MarqueeResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = MarqueeResult<Tenant>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = MarqueeResult<Tenant>> + Send;
    /// Return the tenant with `slug`, creating it on first sight.
    fn provision(
        &self,
        slug: &str,
        name: &str,
    ) -> impl Future<Output = MarqueeResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = MarqueeResult<Tenant>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = MarqueeResult<PaginatedResult<Tenant>>> + Send;
}

// ---------------------------------------------------------------------------
// Owned resources
// ---------------------------------------------------------------------------

pub trait VenueRepository: Send + Sync {
    fn create(
        &self,
        ctx: &TenantContext,
        input: CreateVenue,
    ) -> impl Future<Output = MarqueeResult<Venue>> + Send;
    fn get_by_id(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> impl Future<Output = MarqueeResult<Venue>> + Send;
    fn update(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        input: UpdateVenue,
    ) -> impl Future<Output = MarqueeResult<Venue>> + Send;
    fn list(
        &self,
        ctx: &TenantContext,
        pagination: Pagination,
    ) -> impl Future<Output = MarqueeResult<PaginatedResult<Venue>>> + Send;
}

pub trait ActRepository: Send + Sync {
    fn create(
        &self,
        ctx: &TenantContext,
        input: CreateAct,
    ) -> impl Future<Output = MarqueeResult<Act>> + Send;
    fn get_by_id(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> impl Future<Output = MarqueeResult<Act>> + Send;
    fn update(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        input: UpdateAct,
    ) -> impl Future<Output = MarqueeResult<Act>> + Send;
    fn list(
        &self,
        ctx: &TenantContext,
        pagination: Pagination,
    ) -> impl Future<Output = MarqueeResult<PaginatedResult<Act>>> + Send;
}

// ---------------------------------------------------------------------------
// Dependent resources
// ---------------------------------------------------------------------------

pub trait ShowRepository: Send + Sync {
    /// Create a show. The venue and the act are both resolved under the
    /// caller's tenant filter; either one missing is `NotFound`.
    fn create(
        &self,
        ctx: &TenantContext,
        input: CreateShow,
    ) -> impl Future<Output = MarqueeResult<Show>> + Send;
    fn get_by_id(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> impl Future<Output = MarqueeResult<Show>> + Send;
    /// Update a show. A new `total_units` is checked against the units
    /// already allocated in the same transaction that offer writes use.
    fn update(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        input: UpdateShow,
    ) -> impl Future<Output = MarqueeResult<Show>> + Send;
    fn list(
        &self,
        ctx: &TenantContext,
        pagination: Pagination,
    ) -> impl Future<Output = MarqueeResult<PaginatedResult<Show>>> + Send;
    fn list_by_venue(
        &self,
        ctx: &TenantContext,
        venue_id: Uuid,
    ) -> impl Future<Output = MarqueeResult<Vec<Show>>> + Send;
    fn capacity_summary(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> impl Future<Output = MarqueeResult<CapacitySummary>> + Send;
}

// ---------------------------------------------------------------------------
// Allocations
// ---------------------------------------------------------------------------

/// Ticket offer persistence.
///
/// `create` and `update` run the capacity check and the write as one
/// atomic unit that serializes against every other offer write on the
/// same show; there is no unchecked write path.
pub trait TicketOfferRepository: Send + Sync {
    fn create(
        &self,
        ctx: &TenantContext,
        input: CreateTicketOffer,
    ) -> impl Future<Output = MarqueeResult<TicketOffer>> + Send;
    fn get_by_id(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> impl Future<Output = MarqueeResult<TicketOffer>> + Send;
    fn update(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        input: UpdateTicketOffer,
    ) -> impl Future<Output = MarqueeResult<TicketOffer>> + Send;
    fn delete(&self, ctx: &TenantContext, id: Uuid)
    -> impl Future<Output = MarqueeResult<()>> + Send;
    /// Offers of one show. `NotFound` when the show itself is not visible.
    fn list_by_show(
        &self,
        ctx: &TenantContext,
        show_id: Uuid,
    ) -> impl Future<Output = MarqueeResult<Vec<TicketOffer>>> + Send;
}
