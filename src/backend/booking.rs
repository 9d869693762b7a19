use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::backend::{BackendError, HttpBackend};
use crate::models::wire::lenient_opt_string;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
}

/// The booking row as returned by the backend after a mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingRecord {
    #[serde(default, alias = "bookingId", deserialize_with = "lenient_opt_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub payment_method: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize)]
struct AssignDriverBody {
    driver_id: i64,
}

#[derive(Serialize)]
struct PaymentStatusBody {
    status: BookingStatus,
    payment_method: PaymentMethod,
}

/// Durable mutations of the authoritative booking row.
#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn assign_driver(
        &self,
        booking_id: &str,
        driver_id: i64,
    ) -> Result<BookingRecord, BackendError>;

    async fn update_payment_status(
        &self,
        booking_id: &str,
        status: BookingStatus,
        payment_method: PaymentMethod,
    ) -> Result<BookingRecord, BackendError>;
}

#[async_trait]
impl BookingApi for HttpBackend {
    async fn assign_driver(
        &self,
        booking_id: &str,
        driver_id: i64,
    ) -> Result<BookingRecord, BackendError> {
        let url = self.url(&format!("/api/v1/vehicle-booking/{booking_id}"));
        let body = AssignDriverBody { driver_id };

        info!(url = %url, booking_id, driver_id, "assigning driver to booking");
        self.send(|| self.client.patch(&url).json(&body)).await
    }

    async fn update_payment_status(
        &self,
        booking_id: &str,
        status: BookingStatus,
        payment_method: PaymentMethod,
    ) -> Result<BookingRecord, BackendError> {
        let url = self.url(&format!("/api/v1/vehicle-booking/{booking_id}"));
        let body = PaymentStatusBody {
            status,
            payment_method,
        };

        info!(url = %url, booking_id, ?status, ?payment_method, "updating booking payment status");
        self.send(|| self.client.patch(&url).json(&body)).await
    }
}
