use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::wire::lenient_string;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// A device position reading. Samples only ever move forward in time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PositionSample {
    pub point: GeoPoint,
    pub recorded_at: DateTime<Utc>,
}

impl PositionSample {
    pub fn is_newer_than(&self, other: &PositionSample) -> bool {
        self.recorded_at > other.recorded_at
    }
}

/// Vehicle metadata served by `GET /api/v1/driver/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DriverProfile {
    #[serde(default, deserialize_with = "lenient_string")]
    pub vehicle_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vehicle_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub driver_name: String,
}

/// Payload of both `REGISTER_DRIVER` and `driverLocation`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverPresence {
    pub driver_id: i64,
    pub vehicle_type: String,
    pub vehicle_number: String,
    pub driver_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl DriverPresence {
    pub fn new(driver_id: i64, profile: &DriverProfile, position: &GeoPoint) -> Self {
        Self {
            driver_id,
            vehicle_type: profile.vehicle_type.clone(),
            vehicle_number: profile.vehicle_number.clone(),
            driver_name: profile.driver_name.clone(),
            latitude: position.lat,
            longitude: position.lng,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DriverProfile, GeoPoint};

    #[test]
    fn profile_tolerates_numeric_and_null_fields() {
        let profile: DriverProfile = serde_json::from_value(json!({
            "vehicle_type": "bike",
            "vehicle_number": 4417,
            "driver_name": null,
            "documents_verified": true
        }))
        .unwrap();

        assert_eq!(profile.vehicle_type, "bike");
        assert_eq!(profile.vehicle_number, "4417");
        assert_eq!(profile.driver_name, "");
    }

    #[test]
    fn out_of_range_points_are_invalid() {
        assert!(GeoPoint { lat: 12.97, lng: 77.59 }.is_valid());
        assert!(!GeoPoint { lat: 91.0, lng: 0.0 }.is_valid());
        assert!(!GeoPoint { lat: 0.0, lng: f64::NAN }.is_valid());
    }
}
