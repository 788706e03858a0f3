use std::sync::Arc;

use async_trait::async_trait;

use trailmap_core::{Event, EventFamily};

use crate::capability::CacheCapability;
use crate::context::DispatchContext;
use crate::dispatcher::EventHandler;
use crate::error::HandlerError;

/// Drops the fine-grained cache entry for the affected trail and bumps the
/// tile-cache version.
///
/// Both steps are idempotent, so both are always attempted and their
/// failures reported together. A failing entry invalidation must not leave
/// tiles stale, and vice versa.
pub struct CacheHandler<C> {
    cache: Arc<C>,
}

impl<C: CacheCapability> CacheHandler<C> {
    pub const NAME: &'static str = "cache";

    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl<C> EventHandler for CacheHandler<C>
where
    C: CacheCapability + 'static,
{
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn handle(&self, ctx: &DispatchContext, event: &Event) -> Result<(), HandlerError> {
        let entry = match (event.family(), event.trail_id()) {
            (EventFamily::Trail, Some(trail_id)) => {
                ctx.run(
                    "invalidate_trail_cache",
                    self.cache.invalidate_trail_cache(trail_id),
                )
                .await
            }
            (EventFamily::Engagement, Some(trail_id)) => {
                ctx.run(
                    "invalidate_engagement_cache",
                    self.cache.invalidate_engagement_cache(trail_id),
                )
                .await
            }
            _ => {
                return Err(HandlerError::Unsupported {
                    handler: Self::NAME,
                    event_type: event.event_type(),
                })
            }
        };

        let tiles = ctx
            .run("invalidate_mvt_cache", self.cache.invalidate_mvt_cache())
            .await;

        HandlerError::combine([entry, tiles].into_iter().filter_map(Result::err).collect())
    }
}
