//! Expanding-radius nearest-POI search across networks.
//!
//! Each pass queries every network for the square `[lat ± d, lng ± d]`,
//! merges the candidates, and keeps those inside the circle inscribed in
//! the square. If that leaves too few results the square grows and the
//! search starts over at the larger size.

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::domain::{BoundingBox, NearbyPoi, NetworkId, Poi};
use crate::store::{GeoIndex, with_timeout};

use super::config::ProximityConfig;
use super::geo::{covered_radius_m, is_valid_position};
use super::merge::merge;
use super::rank::{rank, truncate};

/// Error from nearby search.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProximityError {
    /// The caller abandoned the search
    #[error("nearby search cancelled")]
    Cancelled,
}

/// Nearby search over a geo index.
pub struct ProximityExpander<G> {
    index: G,
    config: ProximityConfig,
}

impl<G: GeoIndex> ProximityExpander<G> {
    pub fn new(index: G, config: ProximityConfig) -> Self {
        Self { index, config }
    }

    pub fn config(&self) -> &ProximityConfig {
        &self.config
    }

    pub fn index(&self) -> &G {
        &self.index
    }

    /// Find the POIs of `networks` nearest to a position.
    ///
    /// Grows the search square until more than `min_results` POIs lie in
    /// its inscribed circle or the maximum size is reached, then returns
    /// them nearest-first, deduplicated, and cut to `max_results`. Fewer
    /// than `min_results` (or none) is a normal outcome.
    ///
    /// `min_results == 0` runs a single pass at the smallest square. An
    /// invalid position returns an empty list.
    pub async fn find_nearest(
        &self,
        networks: &[NetworkId],
        lat: f64,
        lng: f64,
        min_results: usize,
        max_results: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<NearbyPoi>, ProximityError> {
        if networks.is_empty() {
            return Ok(Vec::new());
        }
        if !is_valid_position(lat, lng) {
            warn!(lat, lng, "Invalid search position, returning no results");
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let last_pass = self.config.last_pass();
        let mut pass = 0;

        let found = loop {
            if cancel.is_cancelled() {
                return Err(ProximityError::Cancelled);
            }

            let half_width = self.config.half_width(pass);
            let bbox = BoundingBox::around(lat, lng, half_width);
            let candidates = self.candidates(networks, bbox).await;

            let radius_m = covered_radius_m(lat, lng, half_width);
            let mut within = rank(candidates, lat, lng);
            within.retain(|n| n.distance_m <= radius_m);

            debug!(
                pass,
                half_width,
                radius_m,
                found = within.len(),
                "Nearby search pass"
            );

            if min_results == 0 || within.len() > min_results || pass >= last_pass {
                break within;
            }

            if started.elapsed() >= self.config.search_deadline {
                warn!(
                    pass,
                    half_width,
                    found = within.len(),
                    "Nearby search deadline reached, returning partial results"
                );
                break within;
            }

            pass += 1;
        };

        Ok(truncate(found, max_results))
    }

    /// Merged POIs of all networks inside `bbox`, before distance filtering.
    ///
    /// Networks are queried concurrently; each keeps its own order and the
    /// lists are merged in `networks` order.
    pub async fn candidates(&self, networks: &[NetworkId], bbox: BoundingBox) -> Vec<Poi> {
        let queries = networks
            .iter()
            .map(|network| self.query_network(network, bbox));
        merge(join_all(queries).await)
    }

    /// Query one network. Failures and timeouts yield an empty list.
    async fn query_network(&self, network: &NetworkId, bbox: BoundingBox) -> Vec<Poi> {
        let query = self.index.query_box(network, bbox, self.config.order);
        match with_timeout(self.config.store_timeout, query).await {
            Ok(pois) => pois,
            Err(e) => {
                warn!(
                    network = %network,
                    error = %e,
                    "Geo index query failed, using empty"
                );
                Vec::new()
            }
        }
    }
}
