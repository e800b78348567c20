//! Search configuration for the proximity expander.

use std::time::Duration;

use crate::store::OrderHint;

/// Configuration parameters for nearby search.
#[derive(Debug, Clone)]
pub struct ProximityConfig {
    /// Half-width of the first search square, in degrees.
    pub min_half_width_deg: f64,

    /// Growth of the half-width between passes, in degrees.
    pub step_deg: f64,

    /// Largest half-width searched, in degrees.
    pub max_half_width_deg: f64,

    /// Default minimum number of results before the search stops growing.
    pub min_results: usize,

    /// Default maximum number of results returned.
    pub max_results: usize,

    /// Order requested from the geo index.
    pub order: OrderHint,

    /// Deadline for each geo index call.
    pub store_timeout: Duration,

    /// Overall deadline for the expansion loop. Once exceeded the search
    /// returns what the current pass found.
    pub search_deadline: Duration,
}

impl ProximityConfig {
    /// Index of the last pass, the one searching at the maximum half-width.
    ///
    /// Counted in whole steps so float error in `min + step * n` cannot add
    /// a pass at a width that is only a rounding error short of the maximum.
    pub fn last_pass(&self) -> u32 {
        let span = self.max_half_width_deg - self.min_half_width_deg;
        if !(span > 0.0 && self.step_deg > 0.0) {
            return 0;
        }

        let steps = span / self.step_deg;
        let whole = steps.round();
        let steps = if (steps - whole).abs() < 1e-9 { whole } else { steps.ceil() };
        // Saturating float-to-int cast
        steps as u32
    }

    /// Half-width of the search square on pass `pass` (0-based).
    ///
    /// Computed from the pass number rather than accumulated, so the
    /// sequence is identical on every run. From [`last_pass`] on it is
    /// exactly the maximum.
    ///
    /// [`last_pass`]: Self::last_pass
    pub fn half_width(&self, pass: u32) -> f64 {
        if pass >= self.last_pass() {
            return self.max_half_width_deg;
        }
        (self.min_half_width_deg + self.step_deg * f64::from(pass)).min(self.max_half_width_deg)
    }

    /// Set the search square bounds.
    pub fn with_half_widths(mut self, min: f64, step: f64, max: f64) -> Self {
        self.min_half_width_deg = min;
        self.step_deg = step;
        self.max_half_width_deg = max;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_search_deadline(mut self, deadline: Duration) -> Self {
        self.search_deadline = deadline;
        self
    }
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            min_half_width_deg: 0.01, // ~1.1 km of latitude
            step_deg: 0.01,
            max_half_width_deg: 0.10,
            min_results: 10,
            max_results: 25,
            order: OrderHint::RouteThenStopSequence,
            store_timeout: Duration::from_secs(5),
            search_deadline: Duration::from_secs(10),
        }
    }
}
