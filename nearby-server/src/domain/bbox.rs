//! Latitude/longitude query boxes.

use serde::{Deserialize, Serialize};

/// An axis-aligned box in degrees. Bounds are inclusive.
///
/// A box built by [`around`](Self::around) may reach past ±90° latitude or
/// ±180° longitude; [`parts`](Self::parts) maps it back onto the globe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl BoundingBox {
    /// The square `[lat ± half_width, lng ± half_width]`.
    pub fn around(lat: f64, lng: f64, half_width: f64) -> Self {
        Self {
            lat_min: lat - half_width,
            lat_max: lat + half_width,
            lng_min: lng - half_width,
            lng_max: lng + half_width,
        }
    }

    /// The box as ranges on the globe.
    ///
    /// Latitude is clamped to ±90°. A box crossing the antimeridian comes
    /// back as two parts, one on each side of it.
    pub fn parts(&self) -> Vec<BoundingBox> {
        let lat_min = self.lat_min.max(-90.0);
        let lat_max = self.lat_max.min(90.0);
        let part = |lng_min: f64, lng_max: f64| BoundingBox {
            lat_min,
            lat_max,
            lng_min,
            lng_max,
        };

        if self.lng_max - self.lng_min >= 360.0 {
            vec![part(-180.0, 180.0)]
        } else if self.lng_min < -180.0 {
            vec![part(-180.0, self.lng_max), part(self.lng_min + 360.0, 180.0)]
        } else if self.lng_max > 180.0 {
            vec![part(self.lng_min, 180.0), part(-180.0, self.lng_max - 360.0)]
        } else {
            vec![part(self.lng_min, self.lng_max)]
        }
    }
}
