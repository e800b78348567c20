//! Distance ranking of POI candidates.
//!
//! Orders candidates nearest-first. POIs at the same stop are ordered by
//! route short name so the routes of one stop always appear in the same,
//! human-expected order.

use std::cmp::Ordering;

use crate::domain::{NearbyPoi, Poi};

use super::geo::distance_m;

/// Annotate POIs with their distance from the origin and sort them.
///
/// Ordering:
/// 1. Distance (nearer first)
/// 2. Network, then stop id (groups POIs of one stop together)
/// 3. Route short name (see [`compare_route_names`])
/// 4. Identity, then trip id (makes the order total)
pub fn rank(pois: Vec<Poi>, origin_lat: f64, origin_lng: f64) -> Vec<NearbyPoi> {
    let mut ranked: Vec<NearbyPoi> = pois
        .into_iter()
        .map(|poi| {
            let distance_m = distance_m(origin_lat, origin_lng, poi.lat(), poi.lng());
            NearbyPoi { poi, distance_m }
        })
        .collect();

    ranked.sort_by(compare);
    ranked
}

/// Keep at most `max_results` entries.
pub fn truncate(mut ranked: Vec<NearbyPoi>, max_results: usize) -> Vec<NearbyPoi> {
    ranked.truncate(max_results);
    ranked
}

fn compare(a: &NearbyPoi, b: &NearbyPoi) -> Ordering {
    a.distance_m
        .total_cmp(&b.distance_m)
        .then_with(|| a.poi.network.cmp(&b.poi.network))
        .then_with(|| a.poi.stop.id.cmp(&b.poi.stop.id))
        .then_with(|| compare_route_names(a.poi.route_short_name(), b.poi.route_short_name()))
        .then_with(|| a.poi.uid().cmp(&b.poi.uid()))
        .then_with(|| trip_id(&a.poi).cmp(trip_id(&b.poi)))
}

fn trip_id(poi: &Poi) -> &str {
    poi.trip.as_ref().map(|t| t.id.as_str()).unwrap_or("")
}

/// Sort key of a route short name.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum RouteName<'a> {
    Numeric(u64),
    Text(&'a str),
}

impl<'a> RouteName<'a> {
    fn of(name: &'a str) -> Self {
        if !name.is_empty()
            && name.bytes().all(|b| b.is_ascii_digit())
            && let Ok(n) = name.parse()
        {
            return RouteName::Numeric(n);
        }
        RouteName::Text(name)
    }
}

/// Compare route short names.
///
/// Two purely numeric names compare by value ("9" before "10"), two other
/// names compare lexicographically. Numeric names sort before non-numeric
/// ones, which keeps the order total for mixed stops.
pub fn compare_route_names(a: &str, b: &str) -> Ordering {
    RouteName::of(a)
        .cmp(&RouteName::of(b))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Headsign, NetworkId, PoiKind, Route, Stop, Trip};

    fn stop_poi(network: &str, stop_id: &str, lat: f64, lng: f64) -> Poi {
        Poi::stop(
            NetworkId::new(network).unwrap(),
            PoiKind::Stop,
            Stop {
                id: stop_id.to_string(),
                code: None,
                name: stop_id.to_string(),
                lat,
                lng,
            },
        )
    }

    fn route_poi(stop_id: &str, short_name: &str) -> Poi {
        stop_poi("stm", stop_id, 45.5, -73.6).with_route_trip(
            Route {
                id: format!("r{short_name}"),
                short_name: short_name.to_string(),
                long_name: String::new(),
                color: None,
                text_color: None,
            },
            Trip {
                id: format!("t{short_name}"),
                headsign: Headsign::Text(String::new()),
                route_id: format!("r{short_name}"),
            },
            0,
        )
    }

    fn short_names(ranked: &[NearbyPoi]) -> Vec<&str> {
        ranked.iter().map(|n| n.poi.route_short_name()).collect()
    }

    #[test]
    fn rank_by_distance() {
        let near = stop_poi("stm", "near", 45.501, -73.6);
        let far = stop_poi("stm", "far", 45.510, -73.6);
        let ranked = rank(vec![far, near], 45.5, -73.6);
        assert_eq!(ranked[0].poi.stop.id, "near");
        assert_eq!(ranked[1].poi.stop.id, "far");
        assert!(ranked[0].distance_m < ranked[1].distance_m);
    }

    #[test]
    fn same_stop_numeric_routes_by_value() {
        let ranked = rank(
            vec![route_poi("1", "97"), route_poi("1", "10"), route_poi("1", "9")],
            45.5,
            -73.6,
        );
        assert_eq!(short_names(&ranked), ["9", "10", "97"]);
    }

    #[test]
    fn same_stop_text_routes_lexicographic() {
        let ranked = rank(
            vec![route_poi("1", "orange"), route_poi("1", "green"), route_poi("1", "blue")],
            45.5,
            -73.6,
        );
        assert_eq!(short_names(&ranked), ["blue", "green", "orange"]);
    }

    #[test]
    fn numeric_before_text() {
        assert_eq!(compare_route_names("400", "N"), Ordering::Less);
        assert_eq!(compare_route_names("N", "9"), Ordering::Greater);
        assert_eq!(compare_route_names("1A", "1B"), Ordering::Less);
        assert_eq!(compare_route_names("7", "07"), Ordering::Greater);
    }

    #[test]
    fn truncate_keeps_nearest() {
        let ranked = rank(
            vec![
                stop_poi("stm", "c", 45.503, -73.6),
                stop_poi("stm", "a", 45.501, -73.6),
                stop_poi("stm", "b", 45.502, -73.6),
            ],
            45.5,
            -73.6,
        );
        let top = truncate(ranked, 2);
        let ids: Vec<_> = top.iter().map(|n| n.poi.stop.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(truncate(top, 0).is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::{Headsign, NetworkId, PoiKind, Route, Stop, Trip};
    use proptest::prelude::*;

    fn build(stop: u8, short_name: &str) -> Poi {
        Poi::stop(
            NetworkId::new("stm").unwrap(),
            PoiKind::Stop,
            Stop {
                id: format!("s{stop}"),
                code: None,
                name: String::new(),
                lat: 45.5 + f64::from(stop) * 0.001,
                lng: -73.6,
            },
        )
        .with_route_trip(
            Route {
                id: short_name.to_string(),
                short_name: short_name.to_string(),
                long_name: String::new(),
                color: None,
                text_color: None,
            },
            Trip {
                id: short_name.to_string(),
                headsign: Headsign::Text(String::new()),
                route_id: short_name.to_string(),
            },
            0,
        )
    }

    proptest! {
        /// The ranking does not depend on input order
        #[test]
        fn order_independent(
            items in prop::collection::vec((0u8..4, "[0-9]{1,3}|[A-Z]{1,2}"), 0..12),
            seed in any::<u64>(),
        ) {
            let pois: Vec<Poi> = items.iter().map(|(s, n)| build(*s, n)).collect();
            let mut shuffled = pois.clone();
            // Deterministic rotation stands in for a shuffle
            if !shuffled.is_empty() {
                let k = (seed % shuffled.len() as u64) as usize;
                shuffled.rotate_left(k);
                shuffled.reverse();
            }

            let a = rank(pois, 45.5, -73.6);
            let b = rank(shuffled, 45.5, -73.6);
            prop_assert_eq!(a, b);
        }

        /// Numeric short names at one stop are ordered by value
        #[test]
        fn numeric_routes_by_value(names in prop::collection::hash_set(0u32..1000, 1..8)) {
            let pois: Vec<Poi> = names.iter().map(|n| build(0, &n.to_string())).collect();
            let ranked = rank(pois, 45.5, -73.6);
            let values: Vec<u32> = ranked
                .iter()
                .map(|n| n.poi.route_short_name().parse().unwrap())
                .collect();
            let mut sorted = values.clone();
            sorted.sort();
            prop_assert_eq!(values, sorted);
        }

        /// Non-numeric short names at one stop are ordered lexicographically
        #[test]
        fn text_routes_lexicographic(names in prop::collection::hash_set("[A-Z][A-Z0-9]{0,3}", 1..8)) {
            let pois: Vec<Poi> = names.iter().map(|n| build(0, n)).collect();
            let ranked = rank(pois, 45.5, -73.6);
            let got: Vec<&str> = ranked.iter().map(|n| n.poi.route_short_name()).collect();
            let mut sorted = got.clone();
            sorted.sort();
            prop_assert_eq!(got, sorted);
        }
    }
}
