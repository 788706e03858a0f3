//! Fine-grained read caches in front of the projection.

use std::future::Future;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use trailmap_core::EngagementStats;
use trailmap_db::{ProjectedTrail, ProjectionStore, StoreError};
use trailmap_events::{CacheCapability, CapabilityError};
use trailmap_tiles::TileService;

/// Cached value plus the number of invalidations its key has seen.
struct Slot<T> {
    generation: u64,
    value: Option<T>,
}

/// Keyed read-through map that refuses fills started before an invalidation.
///
/// Slots are kept after invalidation so their generation survives; a load
/// only lands if the generation it observed up front is still current.
struct ReadThrough<T> {
    slots: DashMap<String, Slot<T>>,
}

impl<T: Clone> ReadThrough<T> {
    fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Cached value, or the current generation to hand back to [`Self::fill`].
    fn lookup(&self, key: &str) -> Result<T, u64> {
        match self.slots.get(key) {
            Some(slot) => slot.value.clone().ok_or(slot.generation),
            None => Err(0),
        }
    }

    /// Store `value` unless `key` was invalidated since `generation` was read.
    fn fill(&self, key: &str, generation: u64, value: T) -> bool {
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut slot) if slot.get().generation == generation => {
                slot.get_mut().value = Some(value);
                true
            }
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) if generation == 0 => {
                slot.insert(Slot {
                    generation,
                    value: Some(value),
                });
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    fn invalidate(&self, key: &str) {
        self.slots
            .entry(key.to_string())
            .and_modify(|slot| {
                slot.generation += 1;
                slot.value = None;
            })
            .or_insert(Slot {
                generation: 1,
                value: None,
            });
    }

    fn contains(&self, key: &str) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| slot.value.is_some())
    }

    async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> Result<Option<T>, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, StoreError>>,
    {
        let generation = match self.lookup(key) {
            Ok(hit) => return Ok(Some(hit)),
            Err(generation) => generation,
        };

        let loaded = load().await?;
        if let Some(value) = &loaded {
            if !self.fill(key, generation, value.clone()) {
                tracing::debug!("Discarded load of {} raced by invalidation", key);
            }
        }
        Ok(loaded)
    }
}

/// Read-through caches for trail detail and engagement views.
///
/// Tiles are not stored here; invalidating them goes through the
/// [`TileService`] so every outstanding tile validator goes stale.
pub struct MemoryCache {
    projection: Arc<ProjectionStore>,
    trails: ReadThrough<ProjectedTrail>,
    engagement: ReadThrough<EngagementStats>,
    tiles: Arc<TileService<ProjectionStore>>,
}

impl MemoryCache {
    pub fn new(projection: Arc<ProjectionStore>, tiles: Arc<TileService<ProjectionStore>>) -> Self {
        Self {
            projection,
            trails: ReadThrough::new(),
            engagement: ReadThrough::new(),
            tiles,
        }
    }

    pub async fn trail(&self, trail_id: &str) -> Result<Option<ProjectedTrail>, StoreError> {
        self.trails
            .get_or_load(trail_id, || self.projection.get_trail(trail_id))
            .await
    }

    pub async fn engagement(&self, trail_id: &str) -> Result<Option<EngagementStats>, StoreError> {
        self.engagement
            .get_or_load(trail_id, || self.projection.get_engagement(trail_id))
            .await
    }

    pub fn is_trail_cached(&self, trail_id: &str) -> bool {
        self.trails.contains(trail_id)
    }

    pub fn is_engagement_cached(&self, trail_id: &str) -> bool {
        self.engagement.contains(trail_id)
    }
}

impl CacheCapability for MemoryCache {
    async fn invalidate_trail_cache(&self, trail_id: &str) -> Result<(), CapabilityError> {
        self.trails.invalidate(trail_id);
        Ok(())
    }

    async fn invalidate_engagement_cache(&self, trail_id: &str) -> Result<(), CapabilityError> {
        self.engagement.invalidate(trail_id);
        Ok(())
    }

    async fn invalidate_mvt_cache(&self) -> Result<(), CapabilityError> {
        self.tiles.invalidate_cache();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailmap_core::{Difficulty, TrailSnapshot};
    use trailmap_db::{init_pool, run_migrations};
    use trailmap_events::SyncCapability;
    use trailmap_tiles::{CacheVersion, TileConfig};

    async fn setup() -> (MemoryCache, Arc<ProjectionStore>, Arc<CacheVersion>) {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let projection = Arc::new(ProjectionStore::new(pool));
        let version = Arc::new(CacheVersion::new(7));
        let tiles = Arc::new(TileService::new(
            projection.clone(),
            version.clone(),
            TileConfig::default(),
        ));
        let cache = MemoryCache::new(projection.clone(), tiles);
        (cache, projection, version)
    }

    fn trail(name: &str) -> TrailSnapshot {
        TrailSnapshot::new(name, Difficulty::Hard, vec![[8.0, 61.6], [8.1, 61.7]])
    }

    #[tokio::test]
    async fn test_read_through_and_invalidate() {
        let (cache, projection, _) = setup().await;
        projection.sync_trail("T1", &trail("Besseggen")).await.unwrap();

        assert_eq!(cache.trail("T1").await.unwrap().unwrap().name, "Besseggen");
        assert!(cache.is_trail_cached("T1"));

        // Stale until invalidated.
        projection.sync_trail("T1", &trail("Besseggen ridge")).await.unwrap();
        assert_eq!(cache.trail("T1").await.unwrap().unwrap().name, "Besseggen");

        cache.invalidate_trail_cache("T1").await.unwrap();
        assert!(!cache.is_trail_cached("T1"));
        assert_eq!(cache.trail("T1").await.unwrap().unwrap().name, "Besseggen ridge");
        assert!(cache.is_trail_cached("T1"));
    }

    #[tokio::test]
    async fn test_misses_are_not_cached() {
        let (cache, _, _) = setup().await;

        assert!(cache.trail("T404").await.unwrap().is_none());
        assert!(cache.engagement("T404").await.unwrap().is_none());
        assert!(!cache.is_trail_cached("T404"));
        assert!(!cache.is_engagement_cached("T404"));
    }

    #[tokio::test]
    async fn test_engagement_invalidation() {
        let (cache, projection, _) = setup().await;
        projection.update_engagement_stats("T1").await.unwrap();

        assert!(cache.engagement("T1").await.unwrap().is_some());
        assert!(cache.is_engagement_cached("T1"));

        cache.invalidate_engagement_cache("T1").await.unwrap();
        assert!(!cache.is_engagement_cached("T1"));
        // Invalidating an absent entry is fine.
        cache.invalidate_engagement_cache("T1").await.unwrap();
    }

    #[tokio::test]
    async fn test_mvt_invalidation_bumps_version() {
        let (cache, _, version) = setup().await;

        cache.invalidate_mvt_cache().await.unwrap();
        cache.invalidate_mvt_cache().await.unwrap();

        assert_eq!(version.current(), 9);
    }

    #[test]
    fn test_fill_rejected_after_invalidation() {
        let map: ReadThrough<&str> = ReadThrough::new();

        // Load starts on an untouched key, invalidation lands before it finishes.
        let generation = map.lookup("T1").unwrap_err();
        map.invalidate("T1");
        assert!(!map.fill("T1", generation, "old"));
        assert!(!map.contains("T1"));

        // A load started after the invalidation is accepted.
        let generation = map.lookup("T1").unwrap_err();
        assert!(map.fill("T1", generation, "new"));
        assert_eq!(map.lookup("T1"), Ok("new"));

        // Same again on a key that already had a generation.
        map.invalidate("T1");
        let generation = map.lookup("T1").unwrap_err();
        map.invalidate("T1");
        assert!(!map.fill("T1", generation, "old"));
        assert!(map.lookup("T1").is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_read_never_outlives_invalidation() {
        let (cache, projection, _) = setup().await;
        let cache = Arc::new(cache);

        for round in 0..300 {
            let old = format!("Besseggen {}", round);
            let new = format!("Besseggen {}", round + 1);
            projection.sync_trail("T1", &trail(&old)).await.unwrap();
            cache.invalidate_trail_cache("T1").await.unwrap();

            let reader = {
                let cache = cache.clone();
                tokio::spawn(async move { cache.trail("T1").await.unwrap() })
            };
            projection.sync_trail("T1", &trail(&new)).await.unwrap();
            cache.invalidate_trail_cache("T1").await.unwrap();
            reader.await.unwrap();

            assert_eq!(
                cache.trail("T1").await.unwrap().unwrap().name,
                new,
                "round {}",
                round
            );
        }
    }
}
