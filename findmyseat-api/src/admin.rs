use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use findmyseat_shared::{Booking, Occupancy};
use serde::Serialize;
use tracing::info;

use crate::{
    error::AppError,
    middleware::auth::{operator_auth_middleware, Claims},
    state::AppState,
    stream,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub message: String,
    pub released: usize,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/bookings", get(list_active_bookings))
        .route("/v1/admin/occupancy", get(occupancy))
        .route("/v1/admin/reset", post(reset_seats))
        .route("/v1/admin/stream", get(stream::operator_stream))
        .route_layer(axum::middleware::from_fn_with_state(state, operator_auth_middleware))
}

/// GET /v1/admin/bookings
async fn list_active_bookings(State(state): State<AppState>) -> Json<Vec<Booking>> {
    Json(state.coordinator.active_bookings().await)
}

/// GET /v1/admin/occupancy
async fn occupancy(State(state): State<AppState>) -> Json<Occupancy> {
    state.coordinator.reconcile_expired().await;
    Json(state.coordinator.occupancy())
}

/// POST /v1/admin/reset
async fn reset_seats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ResetResponse>, AppError> {
    info!("Seat reset requested by {}", claims.sub);
    let released = state.coordinator.reset_all().await?;
    Ok(Json(ResetResponse {
        message: "All seats set to available and active bookings cancelled.".to_string(),
        released,
    }))
}
