use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::backend::{BackendError, HttpBackend};
use crate::models::presence::DriverProfile;

#[derive(Serialize)]
struct DutyStatusBody {
    status: bool,
}

/// Driver record endpoints used around duty changes and presence.
#[async_trait]
pub trait DriverApi: Send + Sync {
    async fn fetch_profile(&self, driver_id: i64) -> Result<DriverProfile, BackendError>;

    async fn update_duty_status(&self, driver_id: i64, on_duty: bool) -> Result<(), BackendError>;
}

#[async_trait]
impl DriverApi for HttpBackend {
    async fn fetch_profile(&self, driver_id: i64) -> Result<DriverProfile, BackendError> {
        let url = self.url(&format!("/api/v1/driver/{driver_id}"));

        info!(url = %url, "fetching driver profile");
        self.send(|| self.client.get(&url)).await
    }

    async fn update_duty_status(&self, driver_id: i64, on_duty: bool) -> Result<(), BackendError> {
        // Route spelling is the backend's.
        let url = self.url(&format!("/api/v1/driver/{driver_id}/upadate"));
        let body = DutyStatusBody { status: on_duty };

        info!(url = %url, on_duty, "reporting duty status");
        let _: Value = self.send(|| self.client.patch(&url).json(&body)).await?;
        Ok(())
    }
}
