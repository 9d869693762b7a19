use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::models::events::{DRIVER_LOCATION, REGISTER_DRIVER};
use crate::models::presence::{DriverPresence, DriverProfile, PositionSample};
use crate::transport::EventChannel;

/// Latest device position, written by the device binding and read by the
/// reporter. Older samples never overwrite newer ones.
#[derive(Default)]
pub struct SharedPosition {
    latest: RwLock<Option<PositionSample>>,
}

impl SharedPosition {
    pub fn latest(&self) -> Option<PositionSample> {
        *self.latest.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns false when `sample` is not newer than the stored one.
    pub fn update(&self, sample: PositionSample) -> bool {
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        match latest.as_ref() {
            Some(current) if !sample.is_newer_than(current) => false,
            _ => {
                *latest = Some(sample);
                true
            }
        }
    }
}

/// Emits `REGISTER_DRIVER` and `driverLocation` on a fixed period while
/// running. At most one timer task exists at a time.
pub struct LocationReporter {
    channel: Arc<dyn EventChannel>,
    position: Arc<SharedPosition>,
    profile: Arc<RwLock<DriverProfile>>,
    driver_id: i64,
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LocationReporter {
    pub fn new(
        channel: Arc<dyn EventChannel>,
        position: Arc<SharedPosition>,
        driver_id: i64,
        period: Duration,
    ) -> Self {
        Self {
            channel,
            position,
            profile: Arc::new(RwLock::new(DriverProfile::default())),
            driver_id,
            period,
            task: Mutex::new(None),
        }
    }

    pub fn set_profile(&self, profile: DriverProfile) {
        *self.profile.write().unwrap_or_else(PoisonError::into_inner) = profile;
    }

    pub fn profile(&self) -> DriverProfile {
        self.profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn start(&self) {
        let mut task = self.lock_task();
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let channel = Arc::clone(&self.channel);
        let position = Arc::clone(&self.position);
        let profile = Arc::clone(&self.profile);
        let driver_id = self.driver_id;
        let period = self.period;

        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Some(sample) = position.latest() else {
                    debug!("no position fix yet; skipping presence tick");
                    continue;
                };
                let presence = {
                    let profile = profile.read().unwrap_or_else(PoisonError::into_inner);
                    DriverPresence::new(driver_id, &profile, &sample.point)
                };

                let payload = json!(presence);
                channel.emit(REGISTER_DRIVER, payload.clone());
                channel.emit(DRIVER_LOCATION, payload);
            }
        }));

        info!(period_ms = self.period.as_millis() as u64, "location reporter started");
    }

    pub fn stop(&self) {
        if let Some(task) = self.lock_task().take() {
            task.abort();
            info!("location reporter stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LocationReporter {
    fn drop(&mut self) {
        self.stop();
    }
}
