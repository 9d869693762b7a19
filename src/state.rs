use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use crate::backend::{BookingApi, DriverApi};
use crate::config::Config;
use crate::engine::coordinator::{self, CoordinatorDeps, CoordinatorHandle};
use crate::engine::duty::DutyState;
use crate::engine::reporter::{LocationReporter, SharedPosition};
use crate::error::AppError;
use crate::identity::Identity;
use crate::models::events::{DriverStatus, DRIVER_STATUS};
use crate::models::presence::{DriverProfile, PositionSample};
use crate::navigation::{DriverUi, Notice};
use crate::observability::metrics::Metrics;
use crate::transport::EventChannel;
use crate::ui::UiBus;

#[derive(Debug, Clone)]
pub struct Settings {
    pub offer_timeout: Duration,
    pub location_interval: Duration,
    pub event_buffer_size: usize,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            offer_timeout: config.offer_timeout,
            location_interval: config.location_interval,
            event_buffer_size: config.event_buffer_size,
        }
    }
}

pub struct AppState {
    pub identity: Identity,
    pub coordinator: CoordinatorHandle,
    pub channel: Arc<dyn EventChannel>,
    pub duty: DutyState,
    pub reporter: LocationReporter,
    pub position: Arc<SharedPosition>,
    pub drivers: Arc<dyn DriverApi>,
    pub ui: UiBus,
    pub metrics: Metrics,
}

impl AppState {
    /// Spawns the ride coordinator and resumes location reporting when the
    /// persisted duty flag says the driver was on duty.
    pub fn new(
        identity: Identity,
        channel: Arc<dyn EventChannel>,
        bookings: Arc<dyn BookingApi>,
        drivers: Arc<dyn DriverApi>,
        duty: DutyState,
        settings: &Settings,
        metrics: Metrics,
    ) -> Self {
        let ui = UiBus::new(settings.event_buffer_size);
        let position = Arc::new(SharedPosition::default());

        let coordinator = coordinator::spawn(
            CoordinatorDeps {
                channel: Arc::clone(&channel),
                bookings,
                ui: Arc::new(ui.clone()),
                alert: Arc::new(ui.clone()),
                identity: identity.clone(),
                duty: duty.subscribe(),
                metrics: metrics.clone(),
            },
            settings.offer_timeout,
        );

        let reporter = LocationReporter::new(
            Arc::clone(&channel),
            Arc::clone(&position),
            identity.driver_id,
            settings.location_interval,
        );
        if duty.is_on_duty() {
            reporter.start();
        }

        Self {
            identity,
            coordinator,
            channel,
            duty,
            reporter,
            position,
            drivers,
            ui,
            metrics,
        }
    }

    /// Persists the duty flag, then starts or stops presence reporting.
    /// Going off duty also tells the dispatch server right away.
    pub async fn set_on_duty(&self, on_duty: bool) -> Result<bool, AppError> {
        let changed = self.duty.set(on_duty).await?;
        let driver_id = self.identity.driver_id;

        if on_duty {
            if !self.reporter.is_running() {
                self.reporter.start();
            }
        } else {
            self.reporter.stop();
            self.channel
                .emit(DRIVER_STATUS, json!(DriverStatus::off_duty(driver_id)));
        }

        if changed {
            info!(driver_id, on_duty, "duty status changed");
            self.ui.notify(Notice::DutyChanged { on_duty });

            let drivers = Arc::clone(&self.drivers);
            tokio::spawn(async move {
                if let Err(err) = drivers.update_duty_status(driver_id, on_duty).await {
                    warn!(driver_id, on_duty, error = %err, "failed to report duty status");
                }
            });
        }

        Ok(changed)
    }

    pub async fn refresh_profile(&self) -> Result<DriverProfile, AppError> {
        let profile = self
            .drivers
            .fetch_profile(self.identity.driver_id)
            .await
            .map_err(|err| AppError::Upstream(err.to_string()))?;

        info!(
            driver_id = self.identity.driver_id,
            vehicle_type = %profile.vehicle_type,
            "driver profile loaded"
        );
        self.reporter.set_profile(profile.clone());
        Ok(profile)
    }

    /// Returns false for samples older than the one already held.
    pub fn record_position(&self, sample: PositionSample) -> bool {
        if !self.position.update(sample) {
            return false;
        }
        self.coordinator.position(sample);
        true
    }
}
