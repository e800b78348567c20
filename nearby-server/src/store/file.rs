//! File-backed schedule store.
//!
//! Layout of the schedule directory:
//!
//! ```text
//! service_dates      serviceId,YYYYMMDD per line
//! stop_<stopId>      serviceId,tripId,stopId,HHMMSS per line
//! ```
//!
//! The calendar is read once when the store is opened. Stop files are read
//! on every scan.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::error::StoreError;
use super::{ScheduleStore, file_safe};

/// Name of the calendar file inside the schedule directory.
const SERVICE_DATES_FILE: &str = "service_dates";

/// Schedule store reading flat files from a directory.
#[derive(Debug, Clone)]
pub struct FileScheduleStore {
    dir: PathBuf,
    calendar: HashMap<NaiveDate, HashSet<String>>,
}

impl FileScheduleStore {
    /// Open a schedule directory and load its calendar.
    ///
    /// A missing calendar file is an error; malformed calendar lines are
    /// skipped.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        let path = dir.join(SERVICE_DATES_FILE);
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| StoreError::io(format!("reading {}", path.display()), e))?;

        let calendar = parse_calendar(&contents);
        debug!(
            dir = %dir.display(),
            dates = calendar.len(),
            "Loaded service calendar"
        );

        Ok(Self { dir, calendar })
    }

    /// The directory this store reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stop_path(&self, stop_id: &str) -> PathBuf {
        self.dir.join(format!("stop_{}", file_safe(stop_id)))
    }
}

/// Parse `serviceId,YYYYMMDD` lines into a date → service ids map.
fn parse_calendar(contents: &str) -> HashMap<NaiveDate, HashSet<String>> {
    let mut calendar: HashMap<NaiveDate, HashSet<String>> = HashMap::new();

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parsed = line.split_once(',').and_then(|(service_id, date)| {
            let service_id = service_id.trim().trim_matches(['\'', '"']);
            let date = NaiveDate::parse_from_str(date.trim(), "%Y%m%d").ok()?;
            (!service_id.is_empty()).then(|| (service_id.to_string(), date))
        });

        match parsed {
            Some((service_id, date)) => {
                calendar.entry(date).or_default().insert(service_id);
            }
            None => warn!(line = line_no + 1, content = line, "Skipping bad calendar line"),
        }
    }

    calendar
}

/// Split a stop file into lines, decoding each one separately.
///
/// A line that is not valid UTF-8 is skipped, and the rest of the file is
/// still returned.
fn decode_lines(bytes: &[u8], stop_id: &str) -> Vec<String> {
    let mut lines = Vec::new();

    for (line_no, raw) in bytes.split(|&b| b == b'\n').enumerate() {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        match std::str::from_utf8(raw) {
            Ok(line) => lines.push(line.to_string()),
            Err(e) => warn!(
                stop_id,
                line = line_no + 1,
                error = %e,
                "Skipping undecodable schedule line"
            ),
        }
    }

    // A trailing newline leaves one empty piece behind
    if lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

impl ScheduleStore for FileScheduleStore {
    async fn active_service_ids(&self, date: NaiveDate) -> Result<HashSet<String>, StoreError> {
        Ok(self.calendar.get(&date).cloned().unwrap_or_default())
    }

    async fn scan_stop_schedule(&self, stop_id: &str) -> Result<Vec<String>, StoreError> {
        let path = self.stop_path(stop_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(decode_lines(&bytes, stop_id)),
            // A stop without a schedule file simply has no departures
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::io(format!("reading {}", path.display()), e)),
        }
    }
}
