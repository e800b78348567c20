//! Caching layer for stitched schedules.
//!
//! Stitching reads three days of flat schedule per lookup, so results are
//! kept in a [`CacheStore`] keyed by stop, route and trip. Entries age
//! through three tiers:
//!
//! - fresh (younger than the not-refreshed threshold): served as is
//! - stale but usable (up to the maximum validity): still served
//! - expired: deleted on read and recomputed
//!
//! Writes for one key are serialized so two concurrent misses compute and
//! store the schedule once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use moka::future::Cache as MokaCache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::domain::{ScheduleResult, ScheduleTarget};
use crate::schedule::{ScheduleError, ScheduleStitcher};
use crate::store::{CacheEntry, CacheStore, ScheduleStore, StoreError, with_timeout};

/// Default age after which an entry is no longer fresh.
pub const NOT_REFRESHED_THRESHOLD_SEC: u64 = 6 * 60 * 60;

/// Default age after which an entry is discarded.
pub const MAX_VALIDITY_SEC: u64 = 24 * 60 * 60;

/// Version of the cached payload format. Entries written with another
/// version are treated as misses.
pub const PAYLOAD_VERSION: u32 = 1;

/// Configuration for the schedule cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entries younger than this are fresh.
    pub not_refreshed_threshold: Duration,

    /// Entries at least this old are expired.
    pub max_validity: Duration,

    /// Maximum number of entries kept by in-memory stores.
    pub max_capacity: u64,

    /// Deadline for each cache store call.
    pub store_timeout: Duration,
}

impl CacheConfig {
    /// Effective (not-refreshed, max-validity) thresholds in seconds.
    ///
    /// An override can only lower the configured thresholds.
    fn thresholds(&self, validity_override_secs: Option<u64>) -> (u64, u64) {
        let not_refreshed = self.not_refreshed_threshold.as_secs();
        let max_validity = self.max_validity.as_secs();
        match validity_override_secs {
            Some(limit) => (not_refreshed.min(limit), max_validity.min(limit)),
            None => (not_refreshed, max_validity),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            not_refreshed_threshold: Duration::from_secs(NOT_REFRESHED_THRESHOLD_SEC),
            max_validity: Duration::from_secs(MAX_VALIDITY_SEC),
            max_capacity: 10_000,
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// Freshness tier of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// Past the refresh threshold but still valid
    Stale,
    Expired,
}

impl Freshness {
    /// Tier of an entry of the given age. Negative ages (entries written
    /// "in the future" by a skewed clock) count as fresh.
    pub fn of(age_secs: i64, not_refreshed_secs: u64, max_validity_secs: u64) -> Self {
        let age = u64::try_from(age_secs).unwrap_or(0);
        if age >= max_validity_secs {
            Freshness::Expired
        } else if age >= not_refreshed_secs {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }
}

/// Serialized form of a cached schedule.
#[derive(Debug, Serialize, Deserialize)]
struct CachedSchedule<R> {
    version: u32,
    result: R,
}

fn encode(result: &ScheduleResult) -> Result<String, serde_json::Error> {
    serde_json::to_string(&CachedSchedule {
        version: PAYLOAD_VERSION,
        result,
    })
}

fn decode(payload: &str) -> Result<ScheduleResult, String> {
    let cached: CachedSchedule<ScheduleResult> =
        serde_json::from_str(payload).map_err(|e| e.to_string())?;
    if cached.version != PAYLOAD_VERSION {
        return Err(format!("payload version {}", cached.version));
    }
    Ok(cached.result)
}

/// Schedule stitcher with a persistent cache in front.
pub struct ScheduleCache<S, C, Tz> {
    stitcher: ScheduleStitcher<S, Tz>,
    store: C,
    config: CacheConfig,

    /// One lock per key currently being computed.
    key_locks: MokaCache<String, Arc<Mutex<()>>>,
}

impl<S, C, Tz> ScheduleCache<S, C, Tz>
where
    S: ScheduleStore,
    C: CacheStore,
    Tz: TimeZone + Send + Sync,
{
    pub fn new(stitcher: ScheduleStitcher<S, Tz>, store: C, config: CacheConfig) -> Self {
        let key_locks = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .time_to_idle(Duration::from_secs(300))
            .build();

        Self {
            stitcher,
            store,
            config,
            key_locks,
        }
    }

    pub fn stitcher(&self) -> &ScheduleStitcher<S, Tz> {
        &self.stitcher
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Departures for `target`, from the cache when possible.
    ///
    /// With `cache_only` set, never computes: returns the cached result or
    /// `None` when there is no usable entry. Otherwise a miss is stitched,
    /// stored, and returned.
    ///
    /// `validity_override_secs` lowers both freshness thresholds for this
    /// call, forcing a refresh of older entries.
    pub async fn get_departure(
        &self,
        target: &ScheduleTarget,
        now_millis: i64,
        cache_only: bool,
        validity_override_secs: Option<u64>,
        cancel: &CancelToken,
    ) -> Result<Option<ScheduleResult>, ScheduleError> {
        let key = target.cache_key();
        let now_secs = now_millis.div_euclid(1000);
        let thresholds = self.config.thresholds(validity_override_secs);

        if let Some(hit) = self.lookup(&key, now_secs, thresholds).await {
            return Ok(Some(hit));
        }

        if cache_only {
            debug!(key = %key, "Cache-only miss");
            return Ok(None);
        }

        if cancel.is_cancelled() {
            return Err(ScheduleError::Cancelled);
        }

        let lock = self
            .key_locks
            .get_with(key.clone(), async { Arc::new(Mutex::new(())) })
            .await;
        let _guard = lock.lock().await;

        // Another caller may have filled the entry while we waited
        if let Some(hit) = self.lookup(&key, now_secs, thresholds).await {
            debug!(key = %key, "Entry filled by concurrent lookup");
            return Ok(Some(hit));
        }

        let result = self.stitcher.stitch(target, now_millis, cancel).await?;
        self.write(&key, &result, now_secs).await;

        Ok(Some(result))
    }

    /// Read a usable entry. Expired entries are deleted; unreadable ones
    /// are reported as misses.
    async fn lookup(
        &self,
        key: &str,
        now_secs: i64,
        thresholds: (u64, u64),
    ) -> Option<ScheduleResult> {
        let entry = self.call_store("get", key, self.store.get(key)).await??;

        let (not_refreshed, max_validity) = thresholds;
        let age_secs = now_secs - entry.written_at_secs;

        match Freshness::of(age_secs, not_refreshed, max_validity) {
            Freshness::Expired => {
                debug!(key, age_secs, "Purging expired cache entry");
                self.call_store("delete", key, self.store.delete(key)).await;
                None
            }
            freshness => match decode(&entry.payload) {
                Ok(result) => {
                    debug!(key, age_secs, ?freshness, "Cache hit");
                    Some(result)
                }
                Err(reason) => {
                    warn!(key, reason = %reason, "Ignoring unreadable cache entry");
                    None
                }
            },
        }
    }

    /// Replace the entry for `key`. Failures are logged; the caller still
    /// gets the computed result.
    async fn write(&self, key: &str, result: &ScheduleResult, now_secs: i64) {
        let payload = match encode(result) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "Could not encode schedule for caching");
                return;
            }
        };

        if self
            .call_store("delete", key, self.store.delete(key))
            .await
            .is_none()
        {
            return;
        }

        let entry = CacheEntry {
            key: key.to_string(),
            payload,
            written_at_secs: now_secs,
        };
        self.call_store("put", key, self.store.put(entry)).await;
    }

    async fn call_store<T>(
        &self,
        op: &'static str,
        key: &str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Option<T> {
        match with_timeout(self.config.store_timeout, call).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(op, key, error = %e, "Cache store failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{BTreeSet, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{NaiveDate, Utc};

    use crate::domain::NetworkId;
    use crate::schedule::StitchConfig;
    use crate::store::{DiskCacheStore, MemoryCacheStore, MemoryScheduleStore};

    const HOUR_MS: i64 = 3_600_000;

    /// Schedule store counting stitches (three calendar lookups each).
    struct CountingStore {
        inner: MemoryScheduleStore,
        calendar_calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl CountingStore {
        fn stitches(&self) -> usize {
            self.calendar_calls.load(Ordering::SeqCst) / 3
        }
    }

    impl ScheduleStore for CountingStore {
        async fn active_service_ids(&self, date: NaiveDate) -> Result<HashSet<String>, StoreError> {
            self.calendar_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.inner.active_service_ids(date).await
        }

        async fn scan_stop_schedule(&self, stop_id: &str) -> Result<Vec<String>, StoreError> {
            self.inner.scan_stop_schedule(stop_id).await
        }
    }

    fn schedule(delay: Option<Duration>) -> CountingStore {
        let mut inner = MemoryScheduleStore::new();
        inner.add_service_date("1", NaiveDate::from_ymd_opt(2013, 7, 2).unwrap());
        inner.add_record("1", "97", "52084", 100500);
        inner.add_record("1", "97", "52084", 103000);
        CountingStore {
            inner,
            calendar_calls: AtomicUsize::new(0),
            delay,
        }
    }

    fn target() -> ScheduleTarget {
        ScheduleTarget {
            network: NetworkId::new("stm").unwrap(),
            stop_id: "52084".to_string(),
            route_id: Some("97".to_string()),
            trip_id: Some("97".to_string()),
        }
    }

    fn now() -> i64 {
        Utc.with_ymd_and_hms(2013, 7, 2, 10, 2, 0)
            .unwrap()
            .timestamp_millis()
    }

    fn memory_cache(
        delay: Option<Duration>,
    ) -> ScheduleCache<CountingStore, MemoryCacheStore, Utc> {
        let config = CacheConfig::default();
        let stitcher = ScheduleStitcher::new(schedule(delay), Utc, StitchConfig::default());
        let store = MemoryCacheStore::new(config.max_capacity, Duration::from_secs(2 * 86_400));
        ScheduleCache::new(stitcher, store, config)
    }

    fn stitches<C: CacheStore>(cache: &ScheduleCache<CountingStore, C, Utc>) -> usize {
        cache.stitcher().store().stitches()
    }

    async fn get<C: CacheStore>(
        cache: &ScheduleCache<CountingStore, C, Utc>,
        at: i64,
        cache_only: bool,
        validity_override_secs: Option<u64>,
    ) -> Option<ScheduleResult> {
        cache
            .get_departure(&target(), at, cache_only, validity_override_secs, &CancelToken::new())
            .await
            .unwrap()
    }

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.not_refreshed_threshold, Duration::from_secs(6 * 3600));
        assert_eq!(config.max_validity, Duration::from_secs(24 * 3600));
        assert_eq!(config.max_capacity, 10_000);
    }

    #[test]
    fn freshness_tiers() {
        assert_eq!(Freshness::of(0, 10, 20), Freshness::Fresh);
        assert_eq!(Freshness::of(9, 10, 20), Freshness::Fresh);
        assert_eq!(Freshness::of(10, 10, 20), Freshness::Stale);
        assert_eq!(Freshness::of(19, 10, 20), Freshness::Stale);
        assert_eq!(Freshness::of(20, 10, 20), Freshness::Expired);
        assert_eq!(Freshness::of(-5, 10, 20), Freshness::Fresh);
    }

    #[test]
    fn override_only_lowers_thresholds() {
        let config = CacheConfig::default();
        assert_eq!(config.thresholds(None), (6 * 3600, 24 * 3600));
        assert_eq!(config.thresholds(Some(3600)), (3600, 3600));
        assert_eq!(config.thresholds(Some(12 * 3600)), (6 * 3600, 12 * 3600));
        assert_eq!(config.thresholds(Some(7 * 86_400)), (6 * 3600, 24 * 3600));
    }

    #[test]
    fn payload_roundtrip_and_version_check() {
        let result = ScheduleResult::scheduled("schedule", BTreeSet::from([1, 2]));
        let payload = encode(&result).unwrap();
        assert_eq!(decode(&payload).unwrap(), result);

        let old = payload.replace(r#""version":1"#, r#""version":0"#);
        assert!(decode(&old).is_err());
        assert!(decode("timestamps:1,2").is_err());
    }

    #[tokio::test]
    async fn miss_computes_and_stores() {
        let cache = memory_cache(None);

        let result = get(&cache, now(), false, None).await.unwrap();
        assert_eq!(result.timestamps.len(), 2);
        assert_eq!(stitches(&cache), 1);

        let entry = cache.store().get(&target().cache_key()).await.unwrap().unwrap();
        assert_eq!(entry.written_at_secs, now() / 1000);
        assert_eq!(decode(&entry.payload).unwrap(), result);
    }

    #[tokio::test]
    async fn ttl_transitions() {
        let cache = memory_cache(None);
        let first = get(&cache, now(), false, None).await.unwrap();

        // Fresh
        assert_eq!(get(&cache, now() + 1000, false, None).await, Some(first.clone()));
        assert_eq!(stitches(&cache), 1);

        // Stale but usable
        assert_eq!(get(&cache, now() + 12 * HOUR_MS, false, None).await, Some(first));
        assert_eq!(stitches(&cache), 1);

        // Expired: recomputed and rewritten
        let later = now() + 24 * HOUR_MS;
        get(&cache, later, false, None).await.unwrap();
        assert_eq!(stitches(&cache), 2);
        let entry = cache.store().get(&target().cache_key()).await.unwrap().unwrap();
        assert_eq!(entry.written_at_secs, later / 1000);
    }

    #[tokio::test]
    async fn cache_only_never_computes() {
        let cache = memory_cache(None);

        assert_eq!(get(&cache, now(), true, None).await, None);
        assert_eq!(stitches(&cache), 0);

        let stored = get(&cache, now(), false, None).await;
        assert_eq!(get(&cache, now() + 7 * HOUR_MS, true, None).await, stored);
        assert_eq!(stitches(&cache), 1);
    }

    #[tokio::test]
    async fn cache_only_expired_purges() {
        let cache = memory_cache(None);
        get(&cache, now(), false, None).await;

        assert_eq!(get(&cache, now() + 25 * HOUR_MS, true, None).await, None);
        assert!(cache.store().get(&target().cache_key()).await.unwrap().is_none());
        assert_eq!(stitches(&cache), 1);
    }

    #[tokio::test]
    async fn validity_override_forces_refresh() {
        let cache = memory_cache(None);
        get(&cache, now(), false, None).await;

        get(&cache, now() + 2 * HOUR_MS, false, Some(3 * 3600)).await;
        assert_eq!(stitches(&cache), 1);

        get(&cache, now() + 2 * HOUR_MS, false, Some(3600)).await;
        assert_eq!(stitches(&cache), 2);
    }

    #[tokio::test]
    async fn corrupt_payload_is_a_miss() {
        let cache = memory_cache(None);
        let key = target().cache_key();
        cache
            .store()
            .put(CacheEntry {
                key: key.clone(),
                payload: "{not json".to_string(),
                written_at_secs: now() / 1000,
            })
            .await
            .unwrap();

        let result = get(&cache, now(), false, None).await.unwrap();
        assert_eq!(result.timestamps.len(), 2);
        assert_eq!(stitches(&cache), 1);

        let entry = cache.store().get(&key).await.unwrap().unwrap();
        assert!(decode(&entry.payload).is_ok());
    }

    #[tokio::test]
    async fn cancelled_miss_is_not_cached() {
        let cache = memory_cache(None);
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = cache
            .get_departure(&target(), now(), false, None, &cancel)
            .await;
        assert_eq!(result, Err(ScheduleError::Cancelled));
        assert!(cache.store().get(&target().cache_key()).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_compute_once() {
        let cache = memory_cache(Some(Duration::from_millis(100)));

        let (a, b) = futures::join!(
            get(&cache, now(), false, None),
            get(&cache, now(), false, None)
        );

        assert_eq!(a, b);
        assert_eq!(stitches(&cache), 1);
    }

    #[tokio::test]
    async fn disk_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig::default();

        let first = {
            let store = DiskCacheStore::open(dir.path(), PAYLOAD_VERSION).unwrap();
            let stitcher = ScheduleStitcher::new(schedule(None), Utc, StitchConfig::default());
            let cache = ScheduleCache::new(stitcher, store, config.clone());
            get(&cache, now(), false, None).await.unwrap()
        };

        let store = DiskCacheStore::open(dir.path(), PAYLOAD_VERSION).unwrap();
        let stitcher = ScheduleStitcher::new(schedule(None), Utc, StitchConfig::default());
        let cache = ScheduleCache::new(stitcher, store, config);

        assert_eq!(get(&cache, now() + HOUR_MS, true, None).await, Some(first));
        assert_eq!(stitches(&cache), 0);
    }
}
