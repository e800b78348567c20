//! Configuration for schedule stitching.

use std::time::Duration;

/// Configuration parameters for the schedule stitcher.
#[derive(Debug, Clone)]
pub struct StitchConfig {
    /// Label placed on every result produced from the flat schedule.
    pub source_label: String,

    /// Deadline for each schedule store call.
    pub store_timeout: Duration,
}

impl StitchConfig {
    pub fn with_source_label(mut self, label: impl Into<String>) -> Self {
        self.source_label = label.into();
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            source_label: "schedule".to_string(),
            store_timeout: Duration::from_secs(5),
        }
    }
}
