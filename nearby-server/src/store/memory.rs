//! In-process stores.
//!
//! `MemoryGeoIndex` keeps one R-tree per network. `MemoryScheduleStore`
//! holds schedule lines and the calendar in maps, and `MemoryCacheStore`
//! is a bounded moka cache.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache as MokaCache;
use rstar::{AABB, RTree, RTreeObject};

use crate::domain::{BoundingBox, NetworkId, Poi};

use super::error::StoreError;
use super::{CacheEntry, CacheStore, GeoIndex, OrderHint, ScheduleStore};

/// R-tree node: a POI at `[lng, lat]`.
#[derive(Debug, Clone)]
struct PoiNode {
    poi: Poi,
    point: [f64; 2],
}

impl PoiNode {
    fn new(poi: Poi) -> Self {
        let point = [poi.lng(), poi.lat()];
        Self { poi, point }
    }
}

impl RTreeObject for PoiNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

/// Spatial index over POIs, partitioned by network.
#[derive(Debug, Default)]
pub struct MemoryGeoIndex {
    networks: HashMap<NetworkId, RTree<PoiNode>>,

    /// Stop id → stop name, per network.
    stop_names: HashMap<NetworkId, HashMap<String, String>>,
}

impl MemoryGeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load an index from POIs of any number of networks.
    pub fn from_pois(pois: impl IntoIterator<Item = Poi>) -> Self {
        let mut grouped: HashMap<NetworkId, Vec<PoiNode>> = HashMap::new();
        let mut stop_names: HashMap<NetworkId, HashMap<String, String>> = HashMap::new();
        for poi in pois {
            record_name(&mut stop_names, &poi);
            grouped
                .entry(poi.network.clone())
                .or_default()
                .push(PoiNode::new(poi));
        }

        let networks = grouped
            .into_iter()
            .map(|(network, nodes)| (network, RTree::bulk_load(nodes)))
            .collect();

        Self {
            networks,
            stop_names,
        }
    }

    /// Load POIs from a JSON array file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| StoreError::io(format!("reading {}", path.display()), e))?;
        let pois: Vec<Poi> = serde_json::from_str(&json).map_err(|e| StoreError::Parse {
            message: format!("{}: {}", path.display(), e),
        })?;
        Ok(Self::from_pois(pois))
    }

    pub fn insert(&mut self, poi: Poi) {
        record_name(&mut self.stop_names, &poi);
        self.networks
            .entry(poi.network.clone())
            .or_default()
            .insert(PoiNode::new(poi));
    }

    /// Total number of indexed POIs.
    pub fn len(&self) -> usize {
        self.networks.values().map(RTree::size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Networks that have at least one POI.
    pub fn networks(&self) -> Vec<NetworkId> {
        let mut networks: Vec<NetworkId> = self.networks.keys().cloned().collect();
        networks.sort();
        networks
    }

    /// Name of a stop, for resolving stop-reference headsigns.
    pub fn stop_name(&self, network: &NetworkId, stop_id: &str) -> Option<&str> {
        self.stop_names
            .get(network)?
            .get(stop_id)
            .map(String::as_str)
    }

    fn locate(&self, network: &NetworkId, bbox: BoundingBox, order: OrderHint) -> Vec<Poi> {
        let Some(tree) = self.networks.get(network) else {
            return Vec::new();
        };

        let mut pois: Vec<Poi> = bbox
            .parts()
            .into_iter()
            .flat_map(|part| {
                let envelope = AABB::from_corners(
                    [part.lng_min, part.lat_min],
                    [part.lng_max, part.lat_max],
                );
                tree.locate_in_envelope(&envelope)
                    .map(|node| node.poi.clone())
                    .collect::<Vec<_>>()
            })
            .collect();

        match order {
            OrderHint::RouteThenStopSequence => pois.sort_by(|a, b| {
                a.route_id()
                    .cmp(b.route_id())
                    .then(a.stop_sequence.cmp(&b.stop_sequence))
                    .then_with(|| a.stop.id.cmp(&b.stop.id))
                    .then_with(|| trip_id(a).cmp(trip_id(b)))
            }),
            OrderHint::Unordered => {}
        }

        pois
    }
}

fn record_name(names: &mut HashMap<NetworkId, HashMap<String, String>>, poi: &Poi) {
    names
        .entry(poi.network.clone())
        .or_default()
        .entry(poi.stop.id.clone())
        .or_insert_with(|| poi.stop.name.clone());
}

fn trip_id(poi: &Poi) -> &str {
    poi.trip.as_ref().map(|t| t.id.as_str()).unwrap_or("")
}

impl GeoIndex for MemoryGeoIndex {
    async fn query_box(
        &self,
        network: &NetworkId,
        bbox: BoundingBox,
        order: OrderHint,
    ) -> Result<Vec<Poi>, StoreError> {
        Ok(self.locate(network, bbox, order))
    }
}

/// Schedule lines and calendar held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryScheduleStore {
    calendar: HashMap<NaiveDate, HashSet<String>>,
    stops: HashMap<String, Vec<String>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `service_id` as running on `date`.
    pub fn add_service_date(&mut self, service_id: impl Into<String>, date: NaiveDate) {
        self.calendar
            .entry(date)
            .or_default()
            .insert(service_id.into());
    }

    /// Append a raw schedule line to a stop.
    pub fn add_line(&mut self, stop_id: impl Into<String>, line: impl Into<String>) {
        self.stops
            .entry(stop_id.into())
            .or_default()
            .push(line.into());
    }

    /// Append a well-formed record to a stop.
    pub fn add_record(&mut self, service_id: &str, trip_id: &str, stop_id: &str, hhmmss: u32) {
        self.add_line(
            stop_id,
            format!("{},{},{},{:06}", service_id, trip_id, stop_id, hhmmss),
        );
    }
}

impl ScheduleStore for MemoryScheduleStore {
    async fn active_service_ids(&self, date: NaiveDate) -> Result<HashSet<String>, StoreError> {
        Ok(self.calendar.get(&date).cloned().unwrap_or_default())
    }

    async fn scan_stop_schedule(&self, stop_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.stops.get(stop_id).cloned().unwrap_or_default())
    }
}

/// Bounded in-process cache store.
///
/// Entries are evicted by moka once they outlive `ttl` or the capacity is
/// reached; freshness tiers are still decided by the caller from
/// `written_at_secs`.
#[derive(Clone)]
pub struct MemoryCacheStore {
    entries: MokaCache<String, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { entries }
    }
}

impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        Ok(self.entries.get(key).await)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), StoreError> {
        self.entries.insert(entry.key.clone(), entry).await;
        Ok(())
    }
}
