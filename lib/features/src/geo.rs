//! Great-circle distance helpers

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the delivery model's training pipeline.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Road distance is approximated as the great-circle distance times this.
pub const CIRCUITY_FACTOR: f64 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    #[inline]
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(self, other)
    }
}

/// Haversine distance in kilometres.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

#[inline]
pub fn circuity_km(distance_km: f64) -> f64 {
    distance_km * CIRCUITY_FACTOR
}
