//! Application state for the web layer.

use std::sync::Arc;

use chrono::Local;

use crate::cache::ScheduleCache;
use crate::proximity::ProximityExpander;
use crate::store::{DiskCacheStore, FileScheduleStore, MemoryGeoIndex};

/// Nearby search over the loaded POIs.
pub type NearbySearch = ProximityExpander<MemoryGeoIndex>;

/// Cached schedule lookups, with service dates in the host's time zone.
pub type Departures = ScheduleCache<FileScheduleStore, DiskCacheStore, Local>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Nearby POI search
    pub nearby: Arc<NearbySearch>,

    /// Departure lookups
    pub departures: Arc<Departures>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(nearby: NearbySearch, departures: Departures) -> Self {
        Self {
            nearby: Arc::new(nearby),
            departures: Arc::new(departures),
        }
    }
}
