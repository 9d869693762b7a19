use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::session::RideSnapshot;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ride", get(current_ride))
        .route("/ride/:booking_id/accept", post(accept))
        .route("/ride/:booking_id/reject", post(reject))
        .route("/ride/:booking_id/arrived", post(arrived))
        .route("/ride/:booking_id/otp", post(submit_otp))
        .route("/ride/:booking_id/end", post(end_trip))
        .route("/ride/:booking_id/cash", post(confirm_cash))
        .route("/cancellation/ack", post(acknowledge_cancellation))
}

#[derive(Deserialize)]
pub struct OtpRequest {
    pub code: String,
}

async fn current_ride(State(state): State<Arc<AppState>>) -> Result<Json<RideSnapshot>, AppError> {
    Ok(Json(state.coordinator.current().await?))
}

async fn accept(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<Json<RideSnapshot>, AppError> {
    Ok(Json(state.coordinator.accept(&booking_id).await?))
}

async fn reject(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<Json<RideSnapshot>, AppError> {
    Ok(Json(state.coordinator.reject(&booking_id).await?))
}

async fn arrived(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<Json<RideSnapshot>, AppError> {
    Ok(Json(state.coordinator.arrived(&booking_id).await?))
}

async fn submit_otp(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
    Json(payload): Json<OtpRequest>,
) -> Result<Json<RideSnapshot>, AppError> {
    if payload.code.trim().is_empty() {
        return Err(AppError::BadRequest("code cannot be empty".to_string()));
    }

    Ok(Json(
        state
            .coordinator
            .submit_otp(&booking_id, &payload.code)
            .await?,
    ))
}

async fn end_trip(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<Json<RideSnapshot>, AppError> {
    Ok(Json(state.coordinator.end_trip(&booking_id).await?))
}

async fn confirm_cash(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<Json<RideSnapshot>, AppError> {
    Ok(Json(state.coordinator.confirm_cash(&booking_id).await?))
}

async fn acknowledge_cancellation(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RideSnapshot>, AppError> {
    Ok(Json(state.coordinator.acknowledge_cancellation().await?))
}
