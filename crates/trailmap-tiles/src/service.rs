use std::sync::Arc;

use thiserror::Error;

use trailmap_core::{
    etag, if_none_match_matches, TileKey, ValidationError, DEFAULT_MAX_ZOOM, MAX_SUPPORTED_ZOOM,
};

use crate::renderer::{RenderError, TileRenderer};
use crate::version::CacheVersion;

pub const MVT_CONTENT_TYPE: &str = "application/vnd.mapbox-vector-tile";

#[derive(Debug, Clone)]
pub struct TileConfig {
    pub max_zoom: u8,
    /// Freshness lifetime advertised in `Cache-Control`.
    pub max_age_secs: u32,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            max_zoom: DEFAULT_MAX_ZOOM,
            max_age_secs: 86_400,
        }
    }
}

impl TileConfig {
    pub fn cache_control(&self) -> String {
        format!("public, max-age={}", self.max_age_secs)
    }
}

#[derive(Error, Debug)]
pub enum TileError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("tile generation failed: {0}")]
    Render(#[from] RenderError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TileResponse {
    /// The caller's validator is current; nothing was rendered.
    NotModified { etag: String },
    Fresh { etag: String, body: Vec<u8> },
}

impl TileResponse {
    pub fn etag(&self) -> &str {
        match self {
            TileResponse::NotModified { etag } | TileResponse::Fresh { etag, .. } => etag,
        }
    }
}

/// Serves tiles and owns the validator scheme.
pub struct TileService<R> {
    renderer: Arc<R>,
    version: Arc<CacheVersion>,
    config: TileConfig,
}

impl<R: TileRenderer> TileService<R> {
    pub fn new(renderer: Arc<R>, version: Arc<CacheVersion>, mut config: TileConfig) -> Self {
        if config.max_zoom > MAX_SUPPORTED_ZOOM {
            tracing::warn!(
                "max_zoom {} exceeds {}, capping",
                config.max_zoom,
                MAX_SUPPORTED_ZOOM
            );
            config.max_zoom = MAX_SUPPORTED_ZOOM;
        }
        Self {
            renderer,
            version,
            config,
        }
    }

    pub fn config(&self) -> &TileConfig {
        &self.config
    }

    pub fn cache_version(&self) -> u64 {
        self.version.current()
    }

    /// Make every previously issued validator stale. Returns the new version.
    pub fn invalidate_cache(&self) -> u64 {
        let version = self.version.bump();
        tracing::debug!("Tile cache version advanced to {}", version);
        version
    }

    pub fn parse_path(&self, path: &str) -> Result<TileKey, ValidationError> {
        TileKey::parse_path(path, self.config.max_zoom)
    }

    /// Validator of `key` under the current version.
    pub fn etag(&self, key: TileKey) -> String {
        etag(self.version.current(), key)
    }

    /// Validate the coordinate, then render. Invalid keys never reach the renderer.
    pub async fn generate_tile(&self, z: u64, x: u64, y: u64) -> Result<Vec<u8>, TileError> {
        let key = TileKey::new(z, x, y, self.config.max_zoom)?;
        Ok(self.renderer.render(key).await?)
    }

    /// Conditional fetch: answers `NotModified` without rendering when the
    /// presented validator matches the current one.
    pub async fn serve(
        &self,
        key: TileKey,
        if_none_match: Option<&str>,
    ) -> Result<TileResponse, TileError> {
        // Read the version once; a bump during rendering only makes this
        // response's validator stale sooner.
        let etag = etag(self.version.current(), key);

        if if_none_match.is_some_and(|header| if_none_match_matches(header, &etag)) {
            return Ok(TileResponse::NotModified { etag });
        }

        let body = self
            .generate_tile(u64::from(key.z()), u64::from(key.x()), u64::from(key.y()))
            .await?;
        Ok(TileResponse::Fresh { etag, body })
    }
}
