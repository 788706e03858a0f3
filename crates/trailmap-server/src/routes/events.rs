use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use trailmap_core::{Event, EventPayload, Validator};
use trailmap_events::{DispatchContext, DispatchReport};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/events", post(post_event))
}

/// A mutation that has already been committed to the primary store.
#[derive(Deserialize)]
pub struct EventRequest {
    aggregate_id: String,
    payload: EventPayload,
}

#[derive(Serialize)]
struct DispatchResponse {
    event_id: String,
    event_type: &'static str,
    success: bool,
    outcomes: Vec<OutcomeResponse>,
}

#[derive(Serialize)]
struct OutcomeResponse {
    handler: &'static str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&DispatchReport> for DispatchResponse {
    fn from(report: &DispatchReport) -> Self {
        Self {
            event_id: report.event_id().to_string(),
            event_type: report.event_type().as_str(),
            success: report.is_success(),
            outcomes: report
                .outcomes()
                .iter()
                .map(|o| OutcomeResponse {
                    handler: o.handler,
                    ok: o.is_ok(),
                    error: o.result.as_ref().err().map(ToString::to_string),
                })
                .collect(),
        }
    }
}

async fn post_event(
    State(state): State<AppState>,
    body: Result<Json<EventRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return (StatusCode::BAD_REQUEST, rejection.body_text()).into_response();
        }
    };

    let event = Event::new(request.aggregate_id, request.payload);
    if let Err(e) = Validator::validate_event(&event) {
        return (StatusCode::BAD_REQUEST, format!("Validation error: {}", e)).into_response();
    }

    let ctx = DispatchContext::new().with_timeout(state.dispatch_timeout);
    let report = state.dispatcher.dispatch(&ctx, &event).await;

    if !report.is_success() {
        tracing::warn!(
            event_id = %event.id(),
            "{} dispatched with {} failed handler(s)",
            event.event_type(),
            report.failures().count()
        );
    }

    // The primary mutation is already committed, so handler failures are
    // reported in the body rather than as a 5xx.
    (StatusCode::ACCEPTED, Json(DispatchResponse::from(&report))).into_response()
}
