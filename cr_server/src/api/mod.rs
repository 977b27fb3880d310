//! HTTP surface: router, shared state, and error mapping.

pub mod games;
pub mod websocket;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use card_room::{ConnectionRegistry, GameCoordinator, ServiceError};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<GameCoordinator>,
    pub registry: Arc<ConnectionRegistry>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/games", post(games::create_game))
        .route("/api/games/{code}", get(games::get_lobby))
        .route("/api/games/{code}/join", post(games::join_game))
        .route("/api/games/{code}/ready", post(games::toggle_ready))
        .route("/api/games/{code}/start", post(games::start_game))
        .route("/api/games/{code}/leave", post(games::leave_game))
        .route("/api/games/{code}/state/{player_id}", get(games::get_engine_state))
        .route("/api/games/{code}/action", post(games::game_action))
        .route("/api/games/{code}/deal", post(games::deal_hand))
        .route("/api/games/{code}/rebuy", post(games::request_rebuy))
        .route("/api/games/{code}/cancel_rebuy", post(games::cancel_rebuy))
        .route("/api/games/{code}/show_cards", post(games::show_cards))
        .route("/api/games/{code}/pause", post(games::pause_game))
        .route("/api/games/{code}/resume", post(games::resume_game))
        .route("/ws/{code}/{participant_id}", get(websocket::websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `ServiceError` carried out of a handler, rendered as
/// `{"error": "..."}` with the matching status code.
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidState(_) | ServiceError::Conflict => StatusCode::CONFLICT,
            ServiceError::Transient => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ServiceError::NotFound, StatusCode::NOT_FOUND),
            (ServiceError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                ServiceError::InvalidArgument("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::InvalidState("nope".to_string()),
                StatusCode::CONFLICT,
            ),
            (ServiceError::Transient, StatusCode::SERVICE_UNAVAILABLE),
            (ServiceError::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
