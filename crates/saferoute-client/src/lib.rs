//! SafeRoute Client - HTTP clients for external collaborators
//!
//! Talks to the accident risk API, an OSRM routing engine and a Nominatim
//! geocoder, and implements the overlay's risk zone and route seams
//! on top of them.

pub mod adapters;
pub mod client;
pub mod nominatim;
pub mod osrm;

pub use client::RiskApiClient;
pub use nominatim::{NominatimClient, DEFAULT_NOMINATIM_URL};
pub use osrm::{OsrmClient, OsrmRoute, DEFAULT_OSRM_URL};
