//! Points of interest: stops, stations and docks with their attached
//! route and trip.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::NetworkId;
use crate::store::file_safe;

/// A physical stop (or station, or bike dock).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    /// Stop id, unique within its network.
    pub id: String,

    /// Human-facing stop code printed on signage, when the network has one.
    #[serde(default)]
    pub code: Option<String>,

    /// Display name.
    pub name: String,

    pub lat: f64,
    pub lng: f64,
}

/// A route (line) of a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,

    /// Short name shown in badges, e.g. "97" or "N".
    pub short_name: String,

    #[serde(default)]
    pub long_name: String,

    /// Background color as hex, e.g. "009EE0".
    #[serde(default)]
    pub color: Option<String>,

    /// Text color as hex.
    #[serde(default)]
    pub text_color: Option<String>,
}

/// Compass direction used by coded headsigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::North => "North",
            Direction::South => "South",
            Direction::East => "East",
            Direction::West => "West",
        };
        f.write_str(s)
    }
}

/// Displayed direction or destination of a trip.
///
/// Some networks publish a plain string; others publish a coded value that
/// has to be resolved before display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Headsign {
    /// Raw display string.
    Text(String),

    /// Compass direction of travel.
    Direction(Direction),

    /// `true` for inbound (towards the city centre), `false` for outbound.
    Inbound(bool),

    /// Id of the stop the trip is heading to.
    StopRef(String),
}

impl Headsign {
    /// Render the headsign for display.
    ///
    /// `stop_name` resolves a stop id to its name. An unresolvable stop
    /// reference falls back to the raw id.
    ///
    /// # Examples
    ///
    /// ```
    /// use nearby_server::domain::{Direction, Headsign};
    ///
    /// let none = |_: &str| None;
    /// assert_eq!(Headsign::Text("Downtown".into()).resolve(none), "Downtown");
    /// assert_eq!(Headsign::Direction(Direction::North).resolve(none), "North");
    /// assert_eq!(Headsign::Inbound(true).resolve(none), "Inbound");
    ///
    /// let lookup = |id: &str| (id == "52084").then(|| "Berri-UQAM".to_string());
    /// assert_eq!(Headsign::StopRef("52084".into()).resolve(lookup), "Berri-UQAM");
    /// ```
    pub fn resolve<F>(&self, stop_name: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            Headsign::Text(s) => s.clone(),
            Headsign::Direction(d) => d.to_string(),
            Headsign::Inbound(true) => "Inbound".to_string(),
            Headsign::Inbound(false) => "Outbound".to_string(),
            Headsign::StopRef(id) => stop_name(id).unwrap_or_else(|| id.clone()),
        }
    }
}

/// A trip of a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub headsign: Headsign,
    pub route_id: String,
}

/// What kind of place a POI is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiKind {
    /// Bus or tram stop.
    #[default]
    Stop,
    /// Subway or rail station.
    Station,
    /// Bike-share dock.
    Dock,
}

/// Display identity of a POI: network, stop and route.
///
/// Coarser than the trip: two trips of the same route serving
/// the same stop share one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoiUid {
    network: NetworkId,
    stop_id: String,
    route_id: Option<String>,
}

impl PoiUid {
    pub fn new(network: NetworkId, stop_id: impl Into<String>, route_id: Option<String>) -> Self {
        Self {
            network,
            stop_id: stop_id.into(),
            route_id,
        }
    }

    pub fn network(&self) -> &NetworkId {
        &self.network
    }

    pub fn stop_id(&self) -> &str {
        &self.stop_id
    }

    pub fn route_id(&self) -> Option<&str> {
        self.route_id.as_deref()
    }
}

impl fmt::Display for PoiUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.network, self.stop_id)?;
        if let Some(route_id) = &self.route_id {
            write!(f, "-{}", route_id)?;
        }
        Ok(())
    }
}

/// A point of interest: a stop of a network, optionally seen through one
/// route and trip serving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub network: NetworkId,

    #[serde(default)]
    pub kind: PoiKind,

    pub stop: Stop,

    #[serde(default)]
    pub route: Option<Route>,

    #[serde(default)]
    pub trip: Option<Trip>,

    /// Position of the stop within the trip, used for upstream ordering.
    #[serde(default)]
    pub stop_sequence: u32,
}

impl Poi {
    /// Create a POI for a bare stop with no route attached.
    pub fn stop(network: NetworkId, kind: PoiKind, stop: Stop) -> Self {
        Self {
            network,
            kind,
            stop,
            route: None,
            trip: None,
            stop_sequence: 0,
        }
    }

    /// Attach a route and trip to this POI.
    pub fn with_route_trip(mut self, route: Route, trip: Trip, stop_sequence: u32) -> Self {
        self.route = Some(route);
        self.trip = Some(trip);
        self.stop_sequence = stop_sequence;
        self
    }

    /// The dedup identity of this POI.
    pub fn uid(&self) -> PoiUid {
        PoiUid::new(
            self.network.clone(),
            self.stop.id.clone(),
            self.route.as_ref().map(|r| r.id.clone()),
        )
    }

    pub fn lat(&self) -> f64 {
        self.stop.lat
    }

    pub fn lng(&self) -> f64 {
        self.stop.lng
    }

    /// Route id, or the empty string for a bare stop.
    pub fn route_id(&self) -> &str {
        self.route.as_ref().map(|r| r.id.as_str()).unwrap_or("")
    }

    /// Route short name, or the empty string for a bare stop.
    pub fn route_short_name(&self) -> &str {
        self.route
            .as_ref()
            .map(|r| r.short_name.as_str())
            .unwrap_or("")
    }
}

/// A POI annotated with its distance from the query origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyPoi {
    pub poi: Poi,

    /// Great-circle distance from the origin in meters.
    pub distance_m: f64,
}

/// The part of a POI the schedule engine queries against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleTarget {
    pub network: NetworkId,
    pub stop_id: String,
    pub route_id: Option<String>,
    pub trip_id: Option<String>,
}

impl ScheduleTarget {
    /// Cache key for this target.
    ///
    /// Includes the trip id: departures differ per trip even when the
    /// display identity is shared. Each part is escaped so no `|` inside an
    /// id can shift the fields, and a missing id (`~`) never equals an
    /// empty one.
    pub fn cache_key(&self) -> String {
        let optional = |id: &Option<String>| match id {
            Some(id) => file_safe(id),
            None => "~".to_string(),
        };
        format!(
            "{}|{}|{}|{}",
            file_safe(self.network.as_str()),
            file_safe(&self.stop_id),
            optional(&self.route_id),
            optional(&self.trip_id)
        )
    }
}

impl From<&Poi> for ScheduleTarget {
    fn from(poi: &Poi) -> Self {
        Self {
            network: poi.network.clone(),
            stop_id: poi.stop.id.clone(),
            route_id: poi.route.as_ref().map(|r| r.id.clone()),
            trip_id: poi.trip.as_ref().map(|t| t.id.clone()),
        }
    }
}
