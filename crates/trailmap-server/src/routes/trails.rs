use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/trails/{id}", get(get_trail))
        .route("/api/trails/{id}/engagement", get(get_engagement))
}

async fn get_trail(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.cache.trail(&id).await {
        Ok(Some(trail)) => Json(trail).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, format!("Trail not found: {}", id)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Storage error: {}", e),
        )
            .into_response(),
    }
}

async fn get_engagement(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.cache.engagement(&id).await {
        Ok(Some(stats)) => Json(stats).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            format!("No engagement recorded for trail: {}", id),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Storage error: {}", e),
        )
            .into_response(),
    }
}
