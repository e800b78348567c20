//! Web layer for the nearby service.
//!
//! Provides HTTP endpoints for nearby POI search and departure lookups.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::{AppState, Departures, NearbySearch};
