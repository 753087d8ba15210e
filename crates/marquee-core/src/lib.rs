//! Marquee Core — domain models, repository traits, tenant isolation
//! and capacity rules shared by every other crate.

pub mod capacity;
pub mod context;
pub mod error;
pub mod filter;
pub mod interceptor;
pub mod models;
pub mod repository;

pub use context::TenantContext;
pub use error::{MarqueeError, MarqueeResult};
pub use filter::{EntityKind, TenantFilter};
pub use interceptor::{Clock, SystemClock, WriteInterceptor};
