//! Nearby transit server.
//!
//! Answers two questions for a position in a city served by several
//! transit networks: "what stops, stations and docks are near me?" and
//! "when does this trip next leave from here?"

pub mod cache;
pub mod cancel;
pub mod config;
pub mod domain;
pub mod proximity;
pub mod schedule;
pub mod store;
pub mod web;
