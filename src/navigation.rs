//! Screen handoff and driver-facing notices.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::offer::RideSummary;

/// Where the driver UI should be. Each lifecycle stage has one screen.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    Home,
    Offer {
        ride: RideSummary,
        expires_at: DateTime<Utc>,
    },
    GoToPickup {
        ride: RideSummary,
    },
    VerifyOtp {
        ride: RideSummary,
    },
    RideEnd {
        ride: RideSummary,
    },
    Payment {
        ride: RideSummary,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    OfferRejected { booking_id: String, expired: bool },
    RideCancelled { booking_id: String, message: String },
    InvalidOtp { booking_id: String },
    WriteFailed { booking_id: String, message: String },
    RideStatus { status: String, message: String },
    ChannelStatus { connected: bool },
    DutyChanged { on_duty: bool },
}

pub trait DriverUi: Send + Sync {
    fn navigate(&self, screen: Screen);

    fn notify(&self, notice: Notice);
}
