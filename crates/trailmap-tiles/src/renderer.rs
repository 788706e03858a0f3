use std::future::Future;

use thiserror::Error;

use trailmap_core::TileKey;

#[derive(Error, Debug)]
#[error("{0}")]
pub struct RenderError(pub String);

/// Produces the encoded bytes of one tile.
///
/// Only ever called with keys that already passed validation.
pub trait TileRenderer: Send + Sync {
    fn render(&self, key: TileKey) -> impl Future<Output = Result<Vec<u8>, RenderError>> + Send;
}
