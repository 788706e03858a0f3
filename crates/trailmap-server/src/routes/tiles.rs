use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use trailmap_tiles::{TileError, TileResponse, MVT_CONTENT_TYPE};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    // Wildcard so a wrong segment count is a 400 rather than an unmatched route.
    Router::new()
        .route("/tiles/{*path}", get(get_tile).options(preflight))
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::IF_NONE_MATCH])
        .expose_headers([header::ETAG])
        .max_age(Duration::from_secs(86_400))
}

async fn get_tile(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    let key = match state.tiles.parse_path(&path) {
        Ok(key) => key,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());
    let cache_control = state.tiles.config().cache_control();

    match state.tiles.serve(key, if_none_match).await {
        Ok(TileResponse::NotModified { etag }) => (
            StatusCode::NOT_MODIFIED,
            [(header::ETAG, etag), (header::CACHE_CONTROL, cache_control)],
        )
            .into_response(),
        Ok(TileResponse::Fresh { etag, body }) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, MVT_CONTENT_TYPE.to_string()),
                (header::CACHE_CONTROL, cache_control),
                (header::ETAG, etag),
            ],
            body,
        )
            .into_response(),
        Err(TileError::Invalid(e)) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        Err(e) => {
            tracing::error!(tile = %key, "Tile generation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "tile generation failed").into_response()
        }
    }
}

/// Plain `OPTIONS` without CORS request headers; real preflights are answered by the layer.
async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}
