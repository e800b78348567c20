//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::domain::{InvalidNetworkId, NearbyPoi, NetworkId, PoiKind, Route, ScheduleResult};

/// Request for POIs near a position.
#[derive(Debug, Deserialize)]
pub struct NearbyRequest {
    pub lat: f64,
    pub lng: f64,

    /// Comma-separated network ids (defaults to every loaded network)
    pub networks: Option<String>,

    /// Keep searching wider until more than this many POIs are found
    pub min_results: Option<usize>,

    /// Maximum number of POIs returned
    pub max_results: Option<usize>,
}

impl NearbyRequest {
    /// The requested networks, or `None` when the request names none.
    pub fn network_ids(&self) -> Result<Option<Vec<NetworkId>>, InvalidNetworkId> {
        let Some(networks) = self.networks.as_deref() else {
            return Ok(None);
        };

        let ids = networks
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(NetworkId::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((!ids.is_empty()).then_some(ids))
    }
}

/// POIs near a position, nearest first.
#[derive(Debug, Serialize)]
pub struct NearbyResponse {
    pub results: Vec<NearbyResult>,
}

/// One POI in nearby results.
#[derive(Debug, Serialize)]
pub struct NearbyResult {
    /// Display identity (network, stop and route)
    pub uid: String,

    pub network: String,
    pub kind: PoiKind,

    pub stop_id: String,
    pub stop_code: Option<String>,
    pub stop_name: String,
    pub lat: f64,
    pub lng: f64,

    /// Distance from the query position in whole meters
    pub distance_m: u32,

    pub route: Option<RouteResult>,
    pub trip_id: Option<String>,

    /// Resolved headsign of the trip
    pub headsign: Option<String>,
}

/// Route of a nearby POI.
#[derive(Debug, Serialize)]
pub struct RouteResult {
    pub id: String,
    pub short_name: String,
    pub long_name: String,
    pub color: Option<String>,
    pub text_color: Option<String>,
}

/// Request for upcoming departures of one stop, route and trip.
#[derive(Debug, Deserialize)]
pub struct DeparturesRequest {
    pub network: String,
    pub stop: String,
    pub route: Option<String>,
    pub trip: Option<String>,

    /// Only answer from the cache, never stitch
    #[serde(default)]
    pub cache_only: bool,

    /// Treat cache entries older than this many seconds as expired
    pub max_age_secs: Option<u64>,

    /// Query time in epoch milliseconds (defaults to now)
    pub now_ms: Option<i64>,
}

/// Upcoming departures.
#[derive(Debug, Serialize)]
pub struct DeparturesResponse {
    /// Cache key of the lookup
    pub key: String,

    /// `None` when only the cache was consulted and it had no entry
    pub result: Option<ScheduleResult>,

    /// First departure at or after the query time
    pub next_departure: Option<i64>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

// Conversion implementations

impl NearbyResult {
    /// Create from a ranked POI.
    ///
    /// `stop_name` resolves stop ids of the POI's network, for headsigns
    /// that refer to a stop.
    pub fn from_nearby<F>(nearby: &NearbyPoi, stop_name: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let poi = &nearby.poi;
        Self {
            uid: poi.uid().to_string(),
            network: poi.network.to_string(),
            kind: poi.kind,
            stop_id: poi.stop.id.clone(),
            stop_code: poi.stop.code.clone(),
            stop_name: poi.stop.name.clone(),
            lat: poi.stop.lat,
            lng: poi.stop.lng,
            distance_m: round_meters(nearby.distance_m),
            route: poi.route.as_ref().map(RouteResult::from_route),
            trip_id: poi.trip.as_ref().map(|t| t.id.clone()),
            headsign: poi.trip.as_ref().map(|t| t.headsign.resolve(&stop_name)),
        }
    }
}

impl RouteResult {
    pub fn from_route(route: &Route) -> Self {
        Self {
            id: route.id.clone(),
            short_name: route.short_name.clone(),
            long_name: route.long_name.clone(),
            color: route.color.clone(),
            text_color: route.text_color.clone(),
        }
    }
}

fn round_meters(distance_m: f64) -> u32 {
    // Saturating float-to-int cast
    distance_m.round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Headsign, Poi, Stop, Trip};

    fn request(networks: Option<&str>) -> NearbyRequest {
        NearbyRequest {
            lat: 45.5,
            lng: -73.6,
            networks: networks.map(str::to_string),
            min_results: None,
            max_results: None,
        }
    }

    fn nearby(headsign: Headsign) -> NearbyPoi {
        let poi = Poi::stop(
            NetworkId::new("stm").unwrap(),
            PoiKind::Stop,
            Stop {
                id: "52084".into(),
                code: Some("52084".into()),
                name: "Berri-UQAM".into(),
                lat: 45.515,
                lng: -73.561,
            },
        )
        .with_route_trip(
            Route {
                id: "97".into(),
                short_name: "97".into(),
                long_name: "Avenue-du-Mont-Royal".into(),
                color: Some("009EE0".into()),
                text_color: None,
            },
            Trip {
                id: "9701".into(),
                headsign,
                route_id: "97".into(),
            },
            3,
        );
        NearbyPoi {
            poi,
            distance_m: 123.6,
        }
    }

    #[test]
    fn network_ids_parsing() {
        assert_eq!(request(None).network_ids().unwrap(), None);
        assert_eq!(request(Some(" , ")).network_ids().unwrap(), None);

        let ids = request(Some("stm, bixi")).network_ids().unwrap().unwrap();
        assert_eq!(ids, [NetworkId::new("stm").unwrap(), NetworkId::new("bixi").unwrap()]);
    }

    #[test]
    fn nearby_result_from_nearby() {
        let result = NearbyResult::from_nearby(&nearby(Headsign::Text("Est".into())), |_| None);

        assert_eq!(result.uid, "stm-52084-97");
        assert_eq!(result.network, "stm");
        assert_eq!(result.stop_name, "Berri-UQAM");
        assert_eq!(result.distance_m, 124);
        assert_eq!(result.route.as_ref().unwrap().short_name, "97");
        assert_eq!(result.trip_id.as_deref(), Some("9701"));
        assert_eq!(result.headsign.as_deref(), Some("Est"));
    }

    #[test]
    fn stop_ref_headsign_resolved() {
        let result = NearbyResult::from_nearby(&nearby(Headsign::StopRef("1".into())), |id| {
            (id == "1").then(|| "Frontenac".to_string())
        });
        assert_eq!(result.headsign.as_deref(), Some("Frontenac"));
    }

    #[test]
    fn departures_request_defaults() {
        let req: DeparturesRequest =
            serde_json::from_str(r#"{"network":"stm","stop":"52084"}"#).unwrap();
        assert!(!req.cache_only);
        assert!(req.trip.is_none());
        assert!(req.now_ms.is_none());
    }
}
