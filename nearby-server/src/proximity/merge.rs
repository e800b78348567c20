//! Cross-network deduplication of POI candidates.

use std::collections::HashSet;

use crate::domain::{Poi, PoiUid};

/// Merge candidate lists, keeping the first POI seen for each identity.
///
/// Lists are visited in order, and each list in its own order, so the
/// survivor among same-identity candidates depends on the upstream order
/// (route id, then stop sequence, for the bundled indexes).
pub fn merge(candidate_lists: impl IntoIterator<Item = Vec<Poi>>) -> Vec<Poi> {
    let mut seen: HashSet<PoiUid> = HashSet::new();
    let mut merged = Vec::new();

    for list in candidate_lists {
        for poi in list {
            if seen.insert(poi.uid()) {
                merged.push(poi);
            }
        }
    }

    merged
}
