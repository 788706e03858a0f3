//! Trailmap Tiles - Versioned vector tile serving.
//!
//! Tiles are never evicted individually. Bumping the shared [`CacheVersion`]
//! changes the validator of every tile at once, so clients holding an old
//! `ETag` get fresh content on their next request.

pub mod mvt;
pub mod renderer;
pub mod service;
pub mod version;

pub use mvt::{encode_trails, TrailFeature, EXTENT, LAYER_NAME};
pub use renderer::{RenderError, TileRenderer};
pub use service::{TileConfig, TileError, TileResponse, TileService, MVT_CONTENT_TYPE};
pub use version::CacheVersion;
