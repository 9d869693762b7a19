use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::presence::GeoPoint;
use crate::models::wire::{lenient_opt_string, lenient_string};

#[derive(Debug, Error)]
pub enum OfferError {
    #[error("malformed booking request: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("booking request has no booking id")]
    MissingBookingId,

    #[error("booking {0} carries a non-numeric trip start code")]
    InvalidOtp(String),

    #[error("booking {booking_id} has an out-of-range {field} location")]
    InvalidLocation {
        booking_id: String,
        field: &'static str,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    #[serde(default)]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Address {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude,
            lng: self.longitude,
        }
    }
}

/// Candidate assignment carried by `BOOKING_REQUEST`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RideOffer {
    #[serde(rename = "bookingId", deserialize_with = "lenient_string")]
    pub booking_id: String,
    #[serde(rename = "userId", default, deserialize_with = "lenient_opt_string")]
    pub rider_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sender_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sender_phone: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub receiver_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub receiver_phone: String,
    #[serde(rename = "pickupAddress")]
    pub pickup: Address,
    #[serde(rename = "dropoffAddress")]
    pub dropoff: Address,
    #[serde(rename = "totalPrice", default)]
    pub total_price: f64,
    #[serde(rename = "vehicleName", default, deserialize_with = "lenient_string")]
    pub vehicle_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub otp: String,
}

impl RideOffer {
    /// Decodes and validates a raw channel payload.
    pub fn from_payload(payload: Value) -> Result<Self, OfferError> {
        let offer: RideOffer = serde_json::from_value(payload)?;
        offer.validate()?;
        Ok(offer)
    }

    pub fn validate(&self) -> Result<(), OfferError> {
        if self.booking_id.trim().is_empty() {
            return Err(OfferError::MissingBookingId);
        }

        let otp = self.otp.trim();
        if otp.is_empty() || !otp.chars().all(|c| c.is_ascii_digit()) {
            return Err(OfferError::InvalidOtp(self.booking_id.clone()));
        }

        for (field, address) in [("pickup", &self.pickup), ("dropoff", &self.dropoff)] {
            if !address.point().is_valid() {
                return Err(OfferError::InvalidLocation {
                    booking_id: self.booking_id.clone(),
                    field,
                });
            }
        }

        Ok(())
    }

    /// Compares a driver-entered code against the rider's trip start code.
    pub fn otp_matches(&self, entered: &str) -> bool {
        entered.trim() == self.otp.trim()
    }
}

/// Driver-facing view of an offer or session. Never carries the trip start
/// code, which the driver has to obtain from the rider.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RideSummary {
    pub booking_id: String,
    pub rider_id: Option<String>,
    pub sender_name: String,
    pub sender_phone: String,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub pickup: Address,
    pub dropoff: Address,
    pub total_price: f64,
    pub vehicle_name: String,
}

impl From<&RideOffer> for RideSummary {
    fn from(offer: &RideOffer) -> Self {
        Self {
            booking_id: offer.booking_id.clone(),
            rider_id: offer.rider_id.clone(),
            sender_name: offer.sender_name.clone(),
            sender_phone: offer.sender_phone.clone(),
            receiver_name: offer.receiver_name.clone(),
            receiver_phone: offer.receiver_phone.clone(),
            pickup: offer.pickup.clone(),
            dropoff: offer.dropoff.clone(),
            total_price: offer.total_price,
            vehicle_name: offer.vehicle_name.clone(),
        }
    }
}
