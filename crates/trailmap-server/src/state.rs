use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;

use trailmap_db::{AuditLog, ProjectionStore};
use trailmap_events::{build_dispatcher, Dispatcher};
use trailmap_tiles::{CacheVersion, TileConfig, TileService};

use crate::cache::MemoryCache;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub dispatcher: Arc<Dispatcher>,
    pub tiles: Arc<TileService<ProjectionStore>>,
    pub cache: Arc<MemoryCache>,
    pub audit: Arc<AuditLog>,
    pub dispatch_timeout: Duration,
}

impl AppState {
    /// Wire the stores, caches and dispatcher over one pool.
    ///
    /// The cache handler bumps tiles through the same [`TileService`] that serves them.
    pub fn new(pool: SqlitePool, tiles: TileConfig, dispatch_timeout: Duration) -> Self {
        let version = Arc::new(CacheVersion::seeded_from_clock());
        let projection = Arc::new(ProjectionStore::new(pool.clone()));
        let audit = Arc::new(AuditLog::new(pool.clone()));
        let tiles = Arc::new(TileService::new(projection.clone(), version, tiles));
        let cache = Arc::new(MemoryCache::new(projection.clone(), tiles.clone()));

        let dispatcher = build_dispatcher(projection, cache.clone(), audit.clone());

        Self {
            pool,
            dispatcher: Arc::new(dispatcher),
            tiles,
            cache,
            audit,
            dispatch_timeout,
        }
    }
}
