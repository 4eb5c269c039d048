//! HTTP API endpoints
//!
//! Read-only views for pages that want lobby details before opening a socket.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: String,
    pub msg: String,
}

/// Routes under /api
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/lobbies/{code}", get(get_lobby))
}

/// Public lobby snapshot.
///
/// GET /api/lobbies/{code}
pub async fn get_lobby(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> Response {
    match state.lobby_snapshot(&code).await {
        Some(snapshot) => Json(snapshot).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiError {
                code: "NOT_FOUND".to_string(),
                msg: format!("No lobby with code {}", code),
            }),
        )
            .into_response(),
    }
}
