use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_bind: String,
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub socket_url: String,
    pub api_domain_url: String,
    pub driver_id: i64,
    pub driver_phone: String,
    pub offer_timeout: Duration,
    pub location_interval: Duration,
    pub reconnect_delay: Duration,
    pub rest_timeout: Duration,
    pub rest_max_attempts: u32,
    pub duty_state_path: PathBuf,
    pub event_buffer_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") | Err(_) => LogFormat::Compact,
            Ok(other) => {
                return Err(AppError::Internal(format!(
                    "invalid LOG_FORMAT: {other}, expected compact or json"
                )));
            }
        };

        Ok(Self {
            http_bind: env::var("HTTP_BIND").unwrap_or_else(|_| "127.0.0.1".to_string()),
            http_port: parse_or_default("HTTP_PORT", 3100)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            socket_url: env::var("SOCKET_URL")
                .unwrap_or_else(|_| "ws://127.0.0.1:8080/socket".to_string()),
            api_domain_url: env::var("API_DOMAIN_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string()),
            driver_id: parse_required("DRIVER_ID")?,
            driver_phone: env::var("DRIVER_PHONE").unwrap_or_default(),
            offer_timeout: Duration::from_secs(parse_or_default::<u64>("OFFER_TIMEOUT_SECS", 30)?.max(1)),
            location_interval: Duration::from_millis(
                parse_or_default::<u64>("LOCATION_INTERVAL_MS", 1000)?.max(100),
            ),
            reconnect_delay: Duration::from_millis(parse_or_default("RECONNECT_DELAY_MS", 1000)?),
            rest_timeout: Duration::from_secs(parse_or_default("REST_TIMEOUT_SECS", 10)?),
            rest_max_attempts: parse_or_default::<u32>("REST_MAX_ATTEMPTS", 3)?.max(1),
            duty_state_path: env::var("DUTY_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("duty_state.json")),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

fn parse_required<T>(key: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).map_err(|_| AppError::Internal(format!("{key} must be set")))?;
    raw.parse::<T>()
        .map_err(|err| AppError::Internal(format!("invalid {key}: {err}")))
}
