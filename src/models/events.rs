//! Named channel events exchanged with the dispatch server.

use serde::{Deserialize, Serialize};

use crate::models::wire::{lenient_opt_string, lenient_string};

pub const BOOKING_REQUEST: &str = "BOOKING_REQUEST";
pub const TRIP_CANCELLED_BY_USER: &str = "TRIP_CANCELLED_BY_USER";
pub const RIDE_STATUS_UPDATE: &str = "rideStatusUpdate";

pub const DRIVER_RESPONSE: &str = "DRIVER_RESPONSE";
pub const DRIVER_CONNECTED: &str = "driver_connected";
pub const ASSOCIATE_SOCKET: &str = "associateSocketWithDriver";
pub const REGISTER_DRIVER: &str = "REGISTER_DRIVER";
pub const DRIVER_LOCATION: &str = "driverLocation";
pub const DRIVER_STATUS: &str = "driverStatus";
pub const RIDE_STARTED: &str = "ride_started";

/// Server-side status that means the trip is ready to start.
pub const STATUS_RIDE_STARTED: &str = "ride_started";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverResponse {
    #[serde(rename = "bookingId")]
    pub booking_id: String,
    pub driver_id: i64,
    pub status: ResponseStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RideStarted {
    pub driver_id: i64,
    #[serde(rename = "bookingId")]
    pub booking_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssociateSocket {
    pub driver_id: i64,
    #[serde(rename = "socketId")]
    pub socket_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverStatus {
    #[serde(rename = "driverId")]
    pub driver_id: i64,
    pub status: String,
}

impl DriverStatus {
    pub fn off_duty(driver_id: i64) -> Self {
        Self {
            driver_id,
            status: "offDuty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripCancelled {
    #[serde(rename = "bookingId", deserialize_with = "lenient_string")]
    pub booking_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RideStatusUpdate {
    #[serde(deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(rename = "bookingId", default, deserialize_with = "lenient_opt_string")]
    pub booking_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub driver_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub vehicle_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub vehicle_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DriverResponse, ResponseStatus, RideStatusUpdate, TripCancelled};

    #[test]
    fn driver_response_uses_backend_field_names() {
        let response = DriverResponse {
            booking_id: "B-100".to_string(),
            driver_id: 12,
            status: ResponseStatus::Accepted,
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({ "bookingId": "B-100", "driver_id": 12, "status": "accepted" })
        );
    }

    #[test]
    fn cancellation_accepts_numeric_booking_id() {
        let cancelled: TripCancelled =
            serde_json::from_value(json!({ "bookingId": 100, "message": "Rider cancelled" }))
                .unwrap();
        assert_eq!(cancelled.booking_id, "100");
        assert_eq!(cancelled.message, "Rider cancelled");
    }

    #[test]
    fn status_update_without_booking_id() {
        let update: RideStatusUpdate = serde_json::from_value(json!({
            "status": "ride_started",
            "driver_name": "Kiran",
            "vehicle_type": "auto",
            "vehicle_number": 2231
        }))
        .unwrap();

        assert_eq!(update.status, "ride_started");
        assert!(update.booking_id.is_none());
        assert_eq!(update.vehicle_number.as_deref(), Some("2231"));
    }
}
