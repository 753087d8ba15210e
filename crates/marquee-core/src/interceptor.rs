//! Write interceptor — tenant and timestamp stamping for every write.
//!
//! Repositories ask the interceptor for the values to persist instead of
//! computing them inline, so that every create of an owned entity carries
//! the request's tenant and every modification carries a fresh
//! `updated_at`. Fields that are immutable after creation (`tenant_id`,
//! `created_at`, ids, parent links, client correlation ids) never appear
//! in an update stamp.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::context::TenantContext;
use crate::error::{MarqueeError, MarqueeResult};
use crate::filter::EntityKind;

/// Source of "now" for write stamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Values stamped onto a newly created row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateStamp {
    /// Set for owned kinds, `None` for kinds that inherit their tenant.
    pub tenant_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CreateStamp {
    /// Tenant id for an owned kind.
    pub fn owner(&self) -> MarqueeResult<Uuid> {
        self.tenant_id.ok_or(MarqueeError::TenantContext)
    }
}

/// Values stamped onto a modified row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateStamp {
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct WriteInterceptor {
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for WriteInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteInterceptor").finish_non_exhaustive()
    }
}

impl Default for WriteInterceptor {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl WriteInterceptor {
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
        }
    }

    /// Stamp a new row of `kind`.
    ///
    /// For owned kinds the tenant comes from `requested_tenant` when the
    /// caller set one, otherwise from the context. A scoped caller may not
    /// create rows for another tenant, and a create with no tenant from
    /// either source aborts with [`MarqueeError::TenantContext`].
    pub fn on_create(
        &self,
        kind: EntityKind,
        requested_tenant: Option<Uuid>,
        ctx: &TenantContext,
    ) -> MarqueeResult<CreateStamp> {
        let tenant_id = if kind.is_owned() {
            let tenant_id = match (requested_tenant, ctx.current_tenant_id()) {
                (Some(requested), Some(current)) if requested != current => {
                    return Err(MarqueeError::validation(format!(
                        "{} tenant does not match the request tenant",
                        kind.table()
                    )));
                }
                (Some(requested), _) => requested,
                (None, Some(current)) => current,
                (None, None) => return Err(MarqueeError::TenantContext),
            };
            Some(tenant_id)
        } else {
            None
        };

        let now = self.clock.now();
        Ok(CreateStamp {
            tenant_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Stamp a modification of an existing row.
    pub fn on_update(&self) -> UpdateStamp {
        UpdateStamp {
            updated_at: self.clock.now(),
        }
    }
}
