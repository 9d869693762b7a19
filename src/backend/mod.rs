//! REST client for the dispatch backend.
//!
//! Calls never carry ride state between invocations. Every call returns a
//! `Result`; a request that times out is retried up to the configured attempt
//! count because the backend treats repeated identical mutations as no-ops.

pub mod booking;
pub mod driver;

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

pub use booking::{BookingApi, BookingRecord, BookingStatus, PaymentMethod};
pub use driver::DriverApi;

const GENERIC_FAILURE: &str = "An error occurred";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    max_attempts: u32,
}

impl HttpBackend {
    /// `base_url` should be like `http://localhost:8080` (no trailing slash
    /// needed). `timeout` applies to each attempt.
    pub fn new(base_url: &str, timeout: Duration, max_attempts: u32) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::Transport)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_attempts: max_attempts.max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<R>(&self, build: impl Fn() -> RequestBuilder) -> Result<R, BackendError>
    where
        R: DeserializeOwned + Default,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            // The client timeout spans the body read, so a stalled body is retried too.
            match exchange(build()).await {
                Ok((status, body)) => return decode(status, &body),
                Err(err) if err.is_timeout() && attempt < self.max_attempts => {
                    warn!(attempt, error = %err, "backend request timed out; retrying");
                }
                Err(err) if err.is_timeout() => {
                    return Err(BackendError::Timeout { attempts: attempt });
                }
                Err(err) => return Err(BackendError::Transport(err)),
            }
        }
    }
}

async fn exchange(request: RequestBuilder) -> Result<(StatusCode, String), reqwest::Error> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    Ok((status, body))
}

fn decode<R>(status: StatusCode, body: &str) -> Result<R, BackendError>
where
    R: DeserializeOwned + Default,
{
    if !status.is_success() {
        return Err(BackendError::Server {
            status: status.as_u16(),
            message: server_message(body),
        });
    }

    if body.trim().is_empty() {
        return Ok(R::default());
    }

    serde_json::from_str(body).map_err(|err| BackendError::Decode(err.to_string()))
}

/// Pulls the backend's `message` (or `error`) field out of an error body.
fn server_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}
