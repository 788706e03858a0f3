//! External services the handlers drive.
//!
//! Implementations live outside this crate (the SQLite projection, the
//! in-memory caches, the audit log). Each method is one attempt; any retry
//! or backoff is the implementation's business.

use std::future::Future;

use trailmap_core::{Event, TrailSnapshot};

use crate::error::CapabilityError;

/// Keeps the geospatial projection and engagement aggregates in step.
pub trait SyncCapability: Send + Sync {
    /// Upsert geometry and attributes of a trail, keyed by trail id.
    fn sync_trail(
        &self,
        trail_id: &str,
        trail: &TrailSnapshot,
    ) -> impl Future<Output = Result<(), CapabilityError>> + Send;

    /// Remove a trail's projection row.
    fn remove_trail(&self, trail_id: &str)
        -> impl Future<Output = Result<(), CapabilityError>> + Send;

    /// Recompute and persist the engagement aggregate of a trail.
    fn update_engagement_stats(
        &self,
        trail_id: &str,
    ) -> impl Future<Output = Result<(), CapabilityError>> + Send;
}

/// Fine-grained caches plus the shared tile-cache version.
///
/// Every operation is idempotent.
pub trait CacheCapability: Send + Sync {
    fn invalidate_trail_cache(
        &self,
        trail_id: &str,
    ) -> impl Future<Output = Result<(), CapabilityError>> + Send;

    fn invalidate_engagement_cache(
        &self,
        trail_id: &str,
    ) -> impl Future<Output = Result<(), CapabilityError>> + Send;

    /// Make every previously issued tile validator stale.
    fn invalidate_mvt_cache(&self) -> impl Future<Output = Result<(), CapabilityError>> + Send;
}

/// Append-only sink for event records.
pub trait AuditCapability: Send + Sync {
    fn record(&self, event: &Event) -> impl Future<Output = Result<(), CapabilityError>> + Send;
}

// Recording implementations for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod recording {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Shared, ordered log of capability calls, e.g. `remove_trail(T1)`.
    #[derive(Debug, Clone, Default)]
    pub struct CallLog(Arc<Mutex<Vec<String>>>);

    impl CallLog {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, call: String) {
            self.0.lock().unwrap().push(call);
        }

        pub fn calls(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        pub fn count(&self, call: &str) -> usize {
            self.0.lock().unwrap().iter().filter(|c| *c == call).count()
        }

        pub fn clear(&self) {
            self.0.lock().unwrap().clear();
        }
    }

    /// Implements all three capabilities, logging every call.
    ///
    /// Operations can be told to fail, or to hang until the dispatch is
    /// cancelled. Calls are logged before the configured behaviour applies.
    #[derive(Debug, Default)]
    pub struct RecordingServices {
        log: CallLog,
        failing: Mutex<HashSet<&'static str>>,
        hanging: Mutex<HashSet<&'static str>>,
    }

    impl RecordingServices {
        pub fn new(log: CallLog) -> Self {
            Self {
                log,
                ..Self::default()
            }
        }

        pub fn log(&self) -> &CallLog {
            &self.log
        }

        /// Make `operation` return `CapabilityError::Unavailable`.
        pub fn fail_on(&self, operation: &'static str) {
            self.failing.lock().unwrap().insert(operation);
        }

        /// Make `operation` never complete.
        pub fn hang_on(&self, operation: &'static str) {
            self.hanging.lock().unwrap().insert(operation);
        }

        async fn call(&self, operation: &'static str, arg: &str) -> Result<(), CapabilityError> {
            self.log.push(format!("{}({})", operation, arg));
            let hangs = self.hanging.lock().unwrap().contains(operation);
            if hangs {
                std::future::pending::<()>().await;
            }
            if self.failing.lock().unwrap().contains(operation) {
                return Err(CapabilityError::Unavailable(format!("{} is down", operation)));
            }
            Ok(())
        }
    }

    impl SyncCapability for RecordingServices {
        async fn sync_trail(
            &self,
            trail_id: &str,
            _trail: &TrailSnapshot,
        ) -> Result<(), CapabilityError> {
            self.call("sync_trail", trail_id).await
        }

        async fn remove_trail(&self, trail_id: &str) -> Result<(), CapabilityError> {
            self.call("remove_trail", trail_id).await
        }

        async fn update_engagement_stats(&self, trail_id: &str) -> Result<(), CapabilityError> {
            self.call("update_engagement_stats", trail_id).await
        }
    }

    impl CacheCapability for RecordingServices {
        async fn invalidate_trail_cache(&self, trail_id: &str) -> Result<(), CapabilityError> {
            self.call("invalidate_trail_cache", trail_id).await
        }

        async fn invalidate_engagement_cache(&self, trail_id: &str) -> Result<(), CapabilityError> {
            self.call("invalidate_engagement_cache", trail_id).await
        }

        async fn invalidate_mvt_cache(&self) -> Result<(), CapabilityError> {
            self.call("invalidate_mvt_cache", "").await
        }
    }

    impl AuditCapability for RecordingServices {
        async fn record(&self, event: &Event) -> Result<(), CapabilityError> {
            let arg = format!("{}:{}", event.event_type(), event.aggregate_id());
            self.call("record", &arg).await
        }
    }
}
