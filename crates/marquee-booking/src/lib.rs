//! Marquee Booking — capacity-checked allocation of ticket offers.

pub mod config;
pub mod error;
pub mod service;

pub use config::BookingConfig;
pub use error::BookingError;
pub use service::{AllocationService, AllocationState};
