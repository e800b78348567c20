//! Storage collaborators consumed by the proximity search and the
//! schedule engine.
//!
//! The core only talks to storage through the three traits below, so it
//! can run against in-memory data in tests and against files in the
//! server binary.

mod disk;
mod error;
mod file;
mod memory;

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;

use crate::domain::{BoundingBox, NetworkId, Poi};

pub use disk::DiskCacheStore;
pub use error::StoreError;
pub use file::FileScheduleStore;
pub use memory::{MemoryCacheStore, MemoryGeoIndex, MemoryScheduleStore};

/// Order in which a [`GeoIndex`] returns the POIs of one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderHint {
    /// By route id, then by the stop's sequence within the trip.
    #[default]
    RouteThenStopSequence,
    /// Whatever order the index finds cheapest.
    Unordered,
}

/// Bounding-box point lookup, one network at a time.
pub trait GeoIndex: Send + Sync {
    /// All POIs of `network` inside `bbox` (inclusive), in `order`.
    fn query_box(
        &self,
        network: &NetworkId,
        bbox: BoundingBox,
        order: OrderHint,
    ) -> impl Future<Output = Result<Vec<Poi>, StoreError>> + Send;
}

/// Flat per-stop schedules and the service calendar.
pub trait ScheduleStore: Send + Sync {
    /// Service ids running on `date`, calendar exceptions already applied.
    fn active_service_ids(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<HashSet<String>, StoreError>> + Send;

    /// Raw schedule lines of one stop.
    ///
    /// Each call reads the schedule afresh. Lines are unparsed; the caller
    /// skips the ones it cannot read.
    fn scan_stop_schedule(
        &self,
        stop_id: &str,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;
}

/// One cached payload with the time it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub payload: String,
    pub written_at_secs: i64,
}

/// Key → (payload, written-at) persistence.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<CacheEntry>, StoreError>> + Send;

    /// Remove the entry for `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn put(&self, entry: CacheEntry) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Run a store call with a deadline.
///
/// An overrun is reported as [`StoreError::Timeout`] and the call is dropped.
pub async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(StoreError::Timeout(limit)))
}

/// Encode an id so it can be used as a single file name.
///
/// ASCII letters, digits, `-` and `_` pass through; every other byte
/// becomes `%XX`.
pub(crate) fn file_safe(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}
