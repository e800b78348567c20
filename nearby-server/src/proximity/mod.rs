//! Nearest point-of-interest search.
//!
//! This module answers "what stops, stations and docks are near me?"
//! across several transit networks at once. The search grows a square
//! around the user until it holds enough results, deduplicates POIs seen
//! through several trips, and ranks them by distance.

mod config;
mod expand;
mod geo;
mod merge;
mod rank;

pub use config::ProximityConfig;
pub use expand::{ProximityError, ProximityExpander};
pub use geo::{covered_radius_m, distance_m};
pub use merge::merge;
pub use rank::{compare_route_names, rank, truncate};
