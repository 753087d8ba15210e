//! Domain models for Marquee.
//!
//! Tenants own venues and acts directly. Shows reference a venue and an
//! act and inherit the venue's tenant. Ticket offers consume part of a
//! show's capacity and inherit the show's tenant.

pub mod act;
pub mod show;
pub mod tenant;
pub mod ticket_offer;
pub mod venue;
