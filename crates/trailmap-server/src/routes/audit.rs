use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use trailmap_db::AuditRecord;

use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/audit", get(get_recent))
        .route("/api/audit/{aggregate_id}", get(get_for_aggregate))
}

#[derive(Deserialize)]
pub struct RecentQuery {
    limit: Option<i64>,
}

#[derive(Serialize)]
struct RecentResponse {
    total: i64,
    entries: Vec<AuditRecord>,
}

async fn get_recent(State(state): State<AppState>, Query(query): Query<RecentQuery>) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let total = match state.audit.count().await {
        Ok(total) => total,
        Err(e) => return storage_error(e),
    };
    match state.audit.recent(limit).await {
        Ok(entries) => Json(RecentResponse { total, entries }).into_response(),
        Err(e) => storage_error(e),
    }
}

async fn get_for_aggregate(
    State(state): State<AppState>,
    Path(aggregate_id): Path<String>,
) -> Response {
    match state.audit.for_aggregate(&aggregate_id).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => storage_error(e),
    }
}

fn storage_error(e: trailmap_db::StoreError) -> Response {
    tracing::error!("Audit read failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "audit log unavailable").into_response()
}
