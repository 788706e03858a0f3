use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Tile-cache version token shared by the tile service and the cache
/// invalidation path.
///
/// Every [`bump`](CacheVersion::bump) is a single atomic add, so concurrent
/// invalidations are never lost and a read that follows a bump always sees
/// a value it has not seen before.
#[derive(Debug)]
pub struct CacheVersion(AtomicU64);

impl CacheVersion {
    pub fn new(initial: u64) -> Self {
        Self(AtomicU64::new(initial))
    }

    /// Seed from the wall clock (ms since epoch) so validators issued by a
    /// previous process never match after a restart.
    pub fn seeded_from_clock() -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(1);
        Self::new(ms)
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Advance the version and return the new value.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}
