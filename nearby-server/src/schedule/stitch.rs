//! Stitching of upcoming departures from a flat per-stop schedule.
//!
//! A trip that starts late in the evening keeps the previous day's
//! service date and carries times past 24:00:00. To find every departure
//! after `now` the stitcher reads three calendar days:
//!
//! - yesterday, from `now + 24:00:00` (trips still running past midnight)
//! - today, from `now`
//! - tomorrow, from midnight
//!
//! and unions the results.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::domain::{
    ScheduleRecord, ScheduleResult, ScheduleTarget, ScheduleWindow, WindowKind, departure_instant,
};
use crate::store::{ScheduleStore, StoreError, with_timeout};

use super::config::StitchConfig;

/// Error from a schedule lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// The caller abandoned the lookup
    #[error("schedule lookup cancelled")]
    Cancelled,
}

/// What one window contributed.
#[derive(Debug, Default)]
struct WindowScan {
    departures: Vec<i64>,
    previous: Option<i64>,
}

/// Computes upcoming departures for a stop and trip.
///
/// `tz` is the time zone the schedule's service dates are expressed in.
pub struct ScheduleStitcher<S, Tz> {
    store: S,
    tz: Tz,
    config: StitchConfig,
}

impl<S, Tz> ScheduleStitcher<S, Tz>
where
    S: ScheduleStore,
    Tz: TimeZone + Send + Sync,
{
    pub fn new(store: S, tz: Tz, config: StitchConfig) -> Self {
        Self { store, tz, config }
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Upcoming departures of `target` after `now_millis` (epoch millis).
    ///
    /// An empty schedule is a normal outcome: the result then carries the
    /// "no information" error. Store failures leave the affected window
    /// empty rather than failing the lookup.
    pub async fn stitch(
        &self,
        target: &ScheduleTarget,
        now_millis: i64,
        cancel: &CancelToken,
    ) -> Result<ScheduleResult, ScheduleError> {
        if cancel.is_cancelled() {
            return Err(ScheduleError::Cancelled);
        }

        let Some(trip_id) = target.trip_id.as_deref() else {
            debug!(stop = %target.stop_id, "Target has no trip, no schedule to stitch");
            return Ok(self.no_information());
        };

        let Some(windows) = self.local_now(now_millis).and_then(ScheduleWindow::around) else {
            warn!(now_millis, "Query time outside the calendar range");
            return Ok(self.no_information());
        };

        let scans = windows
            .iter()
            .map(|window| self.scan_window(target, trip_id, *window, now_millis, cancel));
        let scans = join_all(scans).await;

        if cancel.is_cancelled() {
            return Err(ScheduleError::Cancelled);
        }

        let mut timestamps = BTreeSet::new();
        let mut previous = None;
        for scan in scans {
            timestamps.extend(scan.departures);
            previous = previous.max(scan.previous);
        }

        debug!(
            network = %target.network,
            stop = %target.stop_id,
            trip = trip_id,
            departures = timestamps.len(),
            "Stitched schedule"
        );

        Ok(ScheduleResult::scheduled(self.config.source_label.clone(), timestamps)
            .with_previous(previous))
    }

    fn no_information(&self) -> ScheduleResult {
        ScheduleResult::scheduled(self.config.source_label.clone(), BTreeSet::new())
    }

    fn local_now(&self, now_millis: i64) -> Option<NaiveDateTime> {
        DateTime::<Utc>::from_timestamp_millis(now_millis)
            .map(|now| now.with_timezone(&self.tz).naive_local())
    }

    async fn scan_window(
        &self,
        target: &ScheduleTarget,
        trip_id: &str,
        window: ScheduleWindow,
        now_millis: i64,
        cancel: &CancelToken,
    ) -> WindowScan {
        if cancel.is_cancelled() {
            return WindowScan::default();
        }

        let Some(active) = self
            .call_store(
                "active_service_ids",
                &window,
                self.store.active_service_ids(window.service_date),
            )
            .await
        else {
            return WindowScan::default();
        };

        if active.is_empty() {
            debug!(date = %window.service_date, "No active services");
            return WindowScan::default();
        }

        if cancel.is_cancelled() {
            return WindowScan::default();
        }

        let Some(lines) = self
            .call_store(
                "scan_stop_schedule",
                &window,
                self.store.scan_stop_schedule(&target.stop_id),
            )
            .await
        else {
            return WindowScan::default();
        };

        self.collect(&lines, &active, target, trip_id, window, now_millis)
    }

    /// Run a store call under the store timeout. Failures are logged and
    /// leave the window empty.
    async fn call_store<T>(
        &self,
        op: &'static str,
        window: &ScheduleWindow,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Option<T> {
        match with_timeout(self.config.store_timeout, call).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    op,
                    date = %window.service_date,
                    error = %e,
                    "Schedule store failed, window left empty"
                );
                None
            }
        }
    }

    fn collect(
        &self,
        lines: &[String],
        active: &HashSet<String>,
        target: &ScheduleTarget,
        trip_id: &str,
        window: ScheduleWindow,
        now_millis: i64,
    ) -> WindowScan {
        let mut scan = WindowScan::default();
        let mut skipped = 0usize;

        for line in lines {
            let record = match ScheduleRecord::parse_line(line) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        stop = %target.stop_id,
                        line = %line,
                        error = %e,
                        "Skipping malformed schedule line"
                    );
                    skipped += 1;
                    continue;
                }
            };

            if record.stop_id != target.stop_id {
                warn!(
                    stop = %target.stop_id,
                    line_stop = %record.stop_id,
                    "Skipping schedule line for another stop"
                );
                skipped += 1;
                continue;
            }

            if record.trip_id != trip_id || !active.contains(&record.service_id) {
                continue;
            }

            let Some(instant) = departure_instant(&self.tz, window.service_date, record.time)
            else {
                warn!(
                    date = %window.service_date,
                    time = %record.time,
                    "Service date has no local midnight, skipping"
                );
                skipped += 1;
                continue;
            };
            let millis = instant.timestamp_millis();

            if window.admits(record.time) {
                scan.departures.push(millis);
            } else if window.kind != WindowKind::Tomorrow && millis < now_millis {
                scan.previous = scan.previous.max(Some(millis));
            }
        }

        debug!(
            window = ?window.kind,
            date = %window.service_date,
            min_time = %window.min_time,
            kept = scan.departures.len(),
            skipped,
            "Scanned schedule window"
        );

        scan
    }
}
