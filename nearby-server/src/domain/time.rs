//! Schedule clock values and calendar-day windows.
//!
//! Flat schedules store departure times as HHMMSS integers relative to the
//! midnight of the day a trip *started*. Trips running past midnight carry
//! values of 24:00:00 and beyond (e.g. `243000` is 00:30 the next morning).

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};

/// Error returned when parsing an invalid schedule time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid schedule time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A raw HHMMSS schedule time, possibly past 24:00:00.
///
/// Ordering matches chronological order within one service day.
///
/// # Examples
///
/// ```
/// use nearby_server::domain::RawTime;
///
/// let t = RawTime::parse("243000").unwrap();
/// assert_eq!(t.hours(), 24);
/// assert_eq!(t.seconds_after_midnight(), 24 * 3600 + 30 * 60);
///
/// // Leading zeros may be dropped
/// assert_eq!(RawTime::parse("50000").unwrap(), RawTime::parse("050000").unwrap());
///
/// assert!(RawTime::parse("106000").is_err()); // 60 minutes
/// assert!(RawTime::parse("10:05").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawTime(u32);

impl RawTime {
    /// Midnight at the start of the service day.
    pub const MIDNIGHT: RawTime = RawTime(0);

    /// Build from components. Minutes and seconds must be below 60.
    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Result<Self, TimeError> {
        if minutes > 59 {
            return Err(TimeError::new("minutes must be 0-59"));
        }
        if seconds > 59 {
            return Err(TimeError::new("seconds must be 0-59"));
        }
        if hours > 99 {
            return Err(TimeError::new("hours must be 0-99"));
        }
        Ok(RawTime(hours * 10_000 + minutes * 100 + seconds))
    }

    /// Parse an HHMMSS value of one to six ASCII digits.
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        if s.is_empty() || s.len() > 6 {
            return Err(TimeError::new("expected 1 to 6 digits"));
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TimeError::new("expected only digits"));
        }
        let value: u32 = s
            .parse()
            .map_err(|_| TimeError::new("value out of range"))?;
        Self::from_hms(value / 10_000, (value / 100) % 100, value % 100)
    }

    /// Time of day of a wall-clock time.
    pub fn from_time(time: NaiveTime) -> Self {
        RawTime(time.hour() * 10_000 + time.minute() * 100 + time.second())
    }

    /// The same instant expressed against the previous service day
    /// (adds 24:00:00).
    pub fn plus_one_day(self) -> Self {
        RawTime(self.0 + 240_000)
    }

    pub fn hours(self) -> u32 {
        self.0 / 10_000
    }

    pub fn minutes(self) -> u32 {
        (self.0 / 100) % 100
    }

    pub fn seconds(self) -> u32 {
        self.0 % 100
    }

    /// Offset from the service day's midnight.
    pub fn seconds_after_midnight(self) -> u32 {
        self.hours() * 3600 + self.minutes() * 60 + self.seconds()
    }

    /// The HHMMSS integer.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for RawTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawTime({})", self)
    }
}

impl fmt::Display for RawTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours(),
            self.minutes(),
            self.seconds()
        )
    }
}

/// Which of the three stitched windows a [`ScheduleWindow`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Yesterday,
    Today,
    Tomorrow,
}

/// One calendar day's schedule, from `min_time` onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub kind: WindowKind,
    pub service_date: NaiveDate,
    pub min_time: RawTime,
}

impl ScheduleWindow {
    /// The yesterday, today and tomorrow windows for a local wall-clock time.
    ///
    /// Returns `None` only at the edges of the representable calendar.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use nearby_server::domain::{RawTime, ScheduleWindow};
    ///
    /// let now = NaiveDate::from_ymd_opt(2013, 7, 2)
    ///     .unwrap()
    ///     .and_hms_opt(10, 2, 0)
    ///     .unwrap();
    /// let [yesterday, today, tomorrow] = ScheduleWindow::around(now).unwrap();
    ///
    /// assert_eq!(yesterday.service_date, NaiveDate::from_ymd_opt(2013, 7, 1).unwrap());
    /// assert_eq!(yesterday.min_time, RawTime::parse("340200").unwrap());
    /// assert_eq!(today.min_time, RawTime::parse("100200").unwrap());
    /// assert_eq!(tomorrow.min_time, RawTime::MIDNIGHT);
    /// ```
    pub fn around(now: NaiveDateTime) -> Option<[ScheduleWindow; 3]> {
        let today = now.date();
        let time = RawTime::from_time(now.time());
        Some([
            ScheduleWindow {
                kind: WindowKind::Yesterday,
                service_date: today.pred_opt()?,
                min_time: time.plus_one_day(),
            },
            ScheduleWindow {
                kind: WindowKind::Today,
                service_date: today,
                min_time: time,
            },
            ScheduleWindow {
                kind: WindowKind::Tomorrow,
                service_date: today.succ_opt()?,
                min_time: RawTime::MIDNIGHT,
            },
        ])
    }

    /// Whether a record's raw time falls inside this window.
    pub fn admits(&self, time: RawTime) -> bool {
        time >= self.min_time
    }
}

/// Absolute departure instant of a raw time on a service date.
///
/// The raw time is added to the service date's local midnight, so values
/// past 24:00:00 land on the following calendar day without further
/// normalization. Returns `None` when the midnight does not exist in `tz`.
pub fn departure_instant<Tz: TimeZone>(
    tz: &Tz,
    service_date: NaiveDate,
    time: RawTime,
) -> Option<DateTime<Tz>> {
    let midnight = tz
        .from_local_datetime(&service_date.and_time(NaiveTime::MIN))
        .earliest()?;
    midnight.checked_add_signed(Duration::seconds(i64::from(time.seconds_after_midnight())))
}
