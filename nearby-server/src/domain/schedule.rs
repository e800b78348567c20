//! Flat schedule records and departure results.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::time::{RawTime, TimeError};

/// Message shown when no departure could be found for a target.
pub const NO_INFORMATION: &str = "No information for this route from this source.";

/// Error from parsing one schedule line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Wrong number of comma-separated fields
    #[error("expected 4 fields, found {0}")]
    FieldCount(usize),

    /// A required field was empty
    #[error("empty {0} field")]
    EmptyField(&'static str),

    /// Departure time could not be parsed
    #[error("bad departure time: {0}")]
    Time(#[from] TimeError),
}

/// One line of a per-stop schedule: a trip departing a stop at a time on
/// days where its service id is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRecord {
    pub service_id: String,
    pub trip_id: String,
    pub stop_id: String,
    pub time: RawTime,
}

impl ScheduleRecord {
    /// Parse a `serviceId,tripId,stopId,HHMMSS` line.
    ///
    /// Fields may be wrapped in single or double quotes. Blank lines and
    /// `#` comments yield `Ok(None)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nearby_server::domain::ScheduleRecord;
    ///
    /// let rec = ScheduleRecord::parse_line("'1',97,52084,100500").unwrap().unwrap();
    /// assert_eq!(rec.service_id, "1");
    /// assert_eq!(rec.trip_id, "97");
    /// assert_eq!(rec.time.as_u32(), 100500);
    ///
    /// assert!(ScheduleRecord::parse_line("").unwrap().is_none());
    /// assert!(ScheduleRecord::parse_line("1,97,52084").is_err());
    /// ```
    pub fn parse_line(line: &str) -> Result<Option<Self>, RecordError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let fields: Vec<&str> = line.split(',').map(unquote).collect();
        let [service_id, trip_id, stop_id, time] = fields[..] else {
            return Err(RecordError::FieldCount(fields.len()));
        };

        Ok(Some(Self {
            service_id: non_empty(service_id, "service id")?,
            trip_id: non_empty(trip_id, "trip id")?,
            stop_id: non_empty(stop_id, "stop id")?,
            time: RawTime::parse(time)?,
        }))
    }
}

fn unquote(field: &str) -> &str {
    let field = field.trim();
    for quote in ['\'', '"'] {
        if let Some(inner) = field
            .strip_prefix(quote)
            .and_then(|f| f.strip_suffix(quote))
        {
            return inner;
        }
    }
    field
}

fn non_empty(field: &str, name: &'static str) -> Result<String, RecordError> {
    if field.is_empty() {
        return Err(RecordError::EmptyField(name));
    }
    Ok(field.to_string())
}

/// Upcoming departures for one target, as served to callers and cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResult {
    /// Which source produced the result.
    pub source_label: String,

    /// Whether the timestamps come from a realtime feed.
    pub realtime: bool,

    /// Departure instants in epoch milliseconds, ascending.
    pub timestamps: BTreeSet<i64>,

    /// Most recent departure already gone, in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_timestamp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message2: Option<String>,

    /// User-visible reason why there are no timestamps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScheduleResult {
    /// A static-schedule result. An empty timestamp set carries the
    /// "no information" error.
    pub fn scheduled(source_label: impl Into<String>, timestamps: BTreeSet<i64>) -> Self {
        let error = timestamps.is_empty().then(|| NO_INFORMATION.to_string());
        Self {
            source_label: source_label.into(),
            realtime: false,
            timestamps,
            previous_timestamp: None,
            message: None,
            message2: None,
            error,
        }
    }

    /// Attach the latest departure already gone.
    pub fn with_previous(mut self, previous: Option<i64>) -> Self {
        self.previous_timestamp = previous;
        self
    }

    /// Whether no departure was found.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// First departure at or after `now_millis`.
    pub fn next_departure(&self, now_millis: i64) -> Option<i64> {
        self.timestamps.range(now_millis..).next().copied()
    }
}
