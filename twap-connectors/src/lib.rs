//! TWAP Venue Connectors
//!
//! Adapters for the venue API (REST) and request signing.
//! Normalizes venue wire types (10^18-scaled strings) to domain types.

#![warn(clippy::all)]

// Public modules
pub mod scaling;
pub mod venue_rest;
pub mod wallet;

// Re-exports
pub use scaling::{from_venue_units, to_venue_units, VENUE_DECIMALS};
pub use venue_rest::{parse_status, VenueRestClient};
pub use wallet::HmacWallet;
