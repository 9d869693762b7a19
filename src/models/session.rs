use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::haversine_km;
use crate::models::offer::{RideOffer, RideSummary};
use crate::models::presence::{GeoPoint, PositionSample};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStage {
    Idle,
    OfferPending,
    EnRouteToPickup,
    AwaitingTripStart,
    EnRouteToDropoff,
    PaymentPending,
    Cancelled,
}

impl RideStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStage::Idle => "IDLE",
            RideStage::OfferPending => "OFFER_PENDING",
            RideStage::EnRouteToPickup => "EN_ROUTE_TO_PICKUP",
            RideStage::AwaitingTripStart => "AWAITING_TRIP_START",
            RideStage::EnRouteToDropoff => "EN_ROUTE_TO_DROPOFF",
            RideStage::PaymentPending => "PAYMENT_PENDING",
            RideStage::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RideStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An accepted ride moving through pickup, trip and payment.
#[derive(Debug, Clone)]
pub struct RideSession {
    pub offer: RideOffer,
    pub stage: RideStage,
    pub driver_position: Option<PositionSample>,
    pub cash_settled: bool,
    pub accepted_at: DateTime<Utc>,
}

impl RideSession {
    pub fn from_offer(offer: RideOffer, driver_position: Option<PositionSample>) -> Self {
        Self {
            offer,
            stage: RideStage::EnRouteToPickup,
            driver_position,
            cash_settled: false,
            accepted_at: Utc::now(),
        }
    }

    pub fn booking_id(&self) -> &str {
        &self.offer.booking_id
    }

    pub fn summary(&self) -> RideSummary {
        RideSummary::from(&self.offer)
    }

    /// Where the driver is heading in the current stage.
    pub fn target(&self) -> GeoPoint {
        match self.stage {
            RideStage::EnRouteToPickup | RideStage::AwaitingTripStart => self.offer.pickup.point(),
            _ => self.offer.dropoff.point(),
        }
    }

    pub fn distance_to_target_km(&self) -> Option<f64> {
        self.driver_position
            .as_ref()
            .map(|sample| haversine_km(&sample.point, &self.target()))
    }
}

/// Read-only view of the coordinator state, published after every event.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RideSnapshot {
    pub stage: RideStage,
    pub booking_id: Option<String>,
    pub ride: Option<RideSummary>,
    pub offer_expires_at: Option<DateTime<Utc>>,
    pub driver_position: Option<PositionSample>,
    pub distance_to_target_km: Option<f64>,
    pub cash_settled: bool,
    pub write_in_flight: bool,
    pub cancellation_message: Option<String>,
}

impl RideSnapshot {
    pub fn idle(driver_position: Option<PositionSample>) -> Self {
        Self {
            stage: RideStage::Idle,
            booking_id: None,
            ride: None,
            offer_expires_at: None,
            driver_position,
            distance_to_target_km: None,
            cash_settled: false,
            write_in_flight: false,
            cancellation_message: None,
        }
    }
}
