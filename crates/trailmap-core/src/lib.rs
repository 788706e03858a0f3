//! Trailmap Core - Domain events, tile keys and validation.
//!
//! This crate contains the domain model shared by the event pipeline and
//! the tile service. It has no dependencies on other Trailmap crates.

pub mod engagement;
pub mod error;
pub mod event;
pub mod tile;
pub mod validation;

// Re-exports for convenience
pub use engagement::EngagementStats;
pub use error::ValidationError;
pub use event::{
    Comment, Difficulty, EngagementRef, Event, EventFamily, EventPayload, EventType, Rating,
    TrailSnapshot, UnknownEventType, UserProfile,
};
pub use tile::{
    etag, if_none_match_matches, LonLatBounds, TileKey, DEFAULT_MAX_ZOOM, MAX_SUPPORTED_ZOOM,
};
pub use validation::Validator;
