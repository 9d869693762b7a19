use serde::Serialize;

use crate::config::Config;

/// The signed-in driver. Decoding the stored credential happens outside this
/// crate; by the time the process starts the id and phone are plain config.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Identity {
    pub driver_id: i64,
    pub phone: String,
}

impl Identity {
    pub fn new(driver_id: i64, phone: impl Into<String>) -> Self {
        Self {
            driver_id,
            phone: phone.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.driver_id, config.driver_phone.clone())
    }
}
