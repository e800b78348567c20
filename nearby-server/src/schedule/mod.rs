//! Upcoming departures from flat schedules.
//!
//! The stitcher turns a stop's raw `serviceId,tripId,stopId,HHMMSS`
//! records into absolute departure instants after a given time.

mod config;
mod stitch;

pub use config::StitchConfig;
pub use stitch::{ScheduleError, ScheduleStitcher};
