use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use findmyseat_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    GeofenceError(String),
    NotFoundError(String),
    ConflictError(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::GeofenceError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            },
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(_) => AppError::ValidationError(err.to_string()),
            CoreError::Geofence { .. } => AppError::GeofenceError(err.to_string()),
            // Expected under contention; not a failure.
            CoreError::Conflict(kind) => AppError::ConflictError(kind.to_string()),
            CoreError::NotFound(msg) => AppError::NotFoundError(msg),
            CoreError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use findmyseat_core::ConflictKind;

    #[test]
    fn test_core_errors_map_to_distinct_statuses() {
        let cases = [
            (CoreError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (CoreError::Geofence { distance_meters: 200_000.0 }, StatusCode::FORBIDDEN),
            (CoreError::Conflict(ConflictKind::AlreadyBooked), StatusCode::CONFLICT),
            (CoreError::Conflict(ConflictKind::SeatUnavailable), StatusCode::CONFLICT),
            (CoreError::NotFound("none".into()), StatusCode::NOT_FOUND),
            (CoreError::Internal("db down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_anyhow_errors_are_internal() {
        let err = anyhow::anyhow!("redis down").context("loading seats");
        match AppError::from(err) {
            AppError::InternalServerError(msg) => assert_eq!(msg, "loading seats: redis down"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
