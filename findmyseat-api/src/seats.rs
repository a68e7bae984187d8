use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use findmyseat_shared::{Booking, Seat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::AppError,
    middleware::auth::{occupant_auth_middleware, Claims},
    state::AppState,
    stream,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSeatRequest {
    pub seat_id: Option<String>,
    pub duration: Option<f64>,
    pub user_lat: Option<f64>,
    pub user_lon: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub message: String,
    pub booking: Booking,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/seats", get(list_seats))
        .route("/v1/seats/book", post(book_seat))
        .route("/v1/seats/cancel", post(cancel_booking))
        .route("/v1/seats/me", get(my_booking))
        .route("/v1/seats/stream", get(stream::occupant_stream))
        .route_layer(axum::middleware::from_fn_with_state(state, occupant_auth_middleware))
}

async fn list_seats(State(state): State<AppState>) -> Json<Vec<Seat>> {
    Json(state.coordinator.list_seats().await)
}

async fn book_seat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BookSeatRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    // A booking without a location is refused outright.
    let (Some(seat_id), Some(duration), Some(user_lat), Some(user_lon)) =
        (req.seat_id, req.duration, req.user_lat, req.user_lon)
    else {
        return Err(AppError::ValidationError("Missing required fields".to_string()));
    };

    debug!("Booking request from {} for seat {} ({} h)", claims.sub, seat_id, duration);
    let booking = state
        .coordinator
        .book(&claims.sub, &seat_id, duration, user_lat, user_lon)
        .await?;

    Ok(Json(BookingResponse {
        message: "Seat booked successfully".to_string(),
        booking,
    }))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.coordinator.cancel(&claims.sub).await?;
    Ok(Json(BookingResponse {
        message: "Booking cancelled.".to_string(),
        booking,
    }))
}

async fn my_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.coordinator.current_booking(&claims.sub).await?))
}
