use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::presence::{DriverProfile, GeoPoint, PositionSample};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/duty", get(get_duty).put(set_duty))
        .route("/location", put(update_location))
        .route("/profile/refresh", post(refresh_profile))
}

#[derive(Deserialize)]
pub struct DutyRequest {
    pub on_duty: bool,
}

#[derive(Serialize)]
pub struct DutyResponse {
    pub on_duty: bool,
    pub changed: bool,
    pub reporting: bool,
}

#[derive(Deserialize)]
pub struct LocationRequest {
    pub lat: f64,
    pub lng: f64,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct LocationResponse {
    pub accepted: bool,
}

async fn get_duty(State(state): State<Arc<AppState>>) -> Json<DutyResponse> {
    Json(DutyResponse {
        on_duty: state.duty.is_on_duty(),
        changed: false,
        reporting: state.reporter.is_running(),
    })
}

async fn set_duty(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DutyRequest>,
) -> Result<Json<DutyResponse>, AppError> {
    let changed = state.set_on_duty(payload.on_duty).await?;

    Ok(Json(DutyResponse {
        on_duty: payload.on_duty,
        changed,
        reporting: state.reporter.is_running(),
    }))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LocationRequest>,
) -> Result<Json<LocationResponse>, AppError> {
    let point = GeoPoint {
        lat: payload.lat,
        lng: payload.lng,
    };
    if !point.is_valid() {
        return Err(AppError::Unprocessable(format!(
            "position out of range: {}, {}",
            payload.lat, payload.lng
        )));
    }

    let accepted = state.record_position(PositionSample {
        point,
        recorded_at: payload.recorded_at.unwrap_or_else(Utc::now),
    });
    Ok(Json(LocationResponse { accepted }))
}

async fn refresh_profile(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DriverProfile>, AppError> {
    Ok(Json(state.refresh_profile().await?))
}
