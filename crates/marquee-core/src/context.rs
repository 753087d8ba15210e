//! Per-request tenant context.

use uuid::Uuid;

use crate::error::{MarqueeError, MarqueeResult};

/// The tenant a request runs as.
///
/// Built once by the authentication layer when a request starts and never
/// mutated afterwards. An unscoped context (`current_tenant_id() == None`)
/// disables tenant filtering and is reserved for system and administrative
/// callers; ordinary user requests always carry a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    current_tenant_id: Option<Uuid>,
}

impl TenantContext {
    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self {
            current_tenant_id: Some(tenant_id),
        }
    }

    pub fn unscoped() -> Self {
        Self {
            current_tenant_id: None,
        }
    }

    pub fn current_tenant_id(&self) -> Option<Uuid> {
        self.current_tenant_id
    }

    pub fn is_unscoped(&self) -> bool {
        self.current_tenant_id.is_none()
    }

    /// The current tenant, or [`MarqueeError::TenantContext`] when the
    /// operation needs a tenant and none was resolved.
    pub fn require_tenant(&self) -> MarqueeResult<Uuid> {
        self.current_tenant_id.ok_or(MarqueeError::TenantContext)
    }

    /// Whether data owned by `owner` is visible under this context.
    pub fn permits(&self, owner: Uuid) -> bool {
        match self.current_tenant_id {
            None => true,
            Some(current) => current == owner,
        }
    }
}
