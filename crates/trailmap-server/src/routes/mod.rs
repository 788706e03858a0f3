pub mod audit;
pub mod events;
pub mod health;
pub mod tiles;
pub mod trails;

use axum::Router;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(tiles::routes())
        .merge(events::routes())
        .merge(trails::routes())
        .merge(audit::routes())
        .merge(health::routes())
        .with_state(state)
}
