//! Trailmap Server - tile endpoint and event ingress over Axum.

pub mod cache;
pub mod config;
pub mod routes;
pub mod state;

pub use cache::MemoryCache;
pub use config::Config;
pub use routes::create_router;
pub use state::AppState;
