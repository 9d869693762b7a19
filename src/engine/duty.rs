use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DutyError {
    #[error("failed to write duty state to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode duty state: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredDuty {
    on_duty: bool,
    updated_at: DateTime<Utc>,
}

/// The persisted on-duty flag. Readers subscribe to a `watch` channel; only
/// [`DutyState::set`] changes it.
pub struct DutyState {
    path: PathBuf,
    tx: watch::Sender<bool>,
}

impl DutyState {
    /// Loads the flag from `path`. A missing or unreadable file means off duty.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let on_duty = read_flag(&path).await;
        info!(path = %path.display(), on_duty, "duty state loaded");

        let (tx, _unused_rx) = watch::channel(on_duty);
        Self { path, tx }
    }

    pub fn is_on_duty(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Persists then publishes the flag. Returns whether it changed.
    pub async fn set(&self, on_duty: bool) -> Result<bool, DutyError> {
        let stored = StoredDuty {
            on_duty,
            updated_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&stored)?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|source| DutyError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| DutyError::Io {
                path: self.path.clone(),
                source,
            })?;

        let previous = self.tx.send_replace(on_duty);
        Ok(previous != on_duty)
    }
}

async fn read_flag(path: &Path) -> bool {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return false,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read duty state; assuming off duty");
            return false;
        }
    };

    match serde_json::from_slice::<StoredDuty>(&bytes) {
        Ok(stored) => stored.on_duty,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "corrupt duty state; assuming off duty");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DutyState;

    #[tokio::test]
    async fn missing_file_means_off_duty() {
        let dir = tempfile::tempdir().unwrap();
        let duty = DutyState::load(dir.path().join("duty.json")).await;
        assert!(!duty.is_on_duty());
    }

    #[tokio::test]
    async fn flag_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duty.json");

        let duty = DutyState::load(&path).await;
        assert!(duty.set(true).await.unwrap());
        assert!(!duty.set(true).await.unwrap());

        let reloaded = DutyState::load(&path).await;
        assert!(reloaded.is_on_duty());
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let dir = tempfile::tempdir().unwrap();
        let duty = DutyState::load(dir.path().join("duty.json")).await;
        let rx = duty.subscribe();

        duty.set(true).await.unwrap();

        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn corrupt_file_means_off_duty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duty.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let duty = DutyState::load(&path).await;
        assert!(!duty.is_on_duty());
    }
}
