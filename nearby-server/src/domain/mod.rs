//! Domain types for nearby-stop and departure lookup.
//!
//! This module contains the core data model shared by the proximity search
//! and the schedule engine. Identifier and time types enforce their
//! invariants at construction time.

mod bbox;
mod network;
mod poi;
mod schedule;
mod time;

pub use bbox::BoundingBox;
pub use network::{InvalidNetworkId, NetworkId};
pub use poi::{
    Direction, Headsign, NearbyPoi, Poi, PoiKind, PoiUid, Route, ScheduleTarget, Stop, Trip,
};
pub use schedule::{NO_INFORMATION, RecordError, ScheduleRecord, ScheduleResult};
pub use time::{RawTime, ScheduleWindow, TimeError, WindowKind, departure_instant};
