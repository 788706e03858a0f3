use std::sync::Arc;

use async_trait::async_trait;

use trailmap_core::{Event, EventPayload};

use crate::capability::SyncCapability;
use crate::context::DispatchContext;
use crate::dispatcher::EventHandler;
use crate::error::HandlerError;

/// Projects trail mutations into the geospatial store and recomputes
/// engagement aggregates for ratings and comments.
pub struct SyncHandler<S> {
    sync: Arc<S>,
}

impl<S: SyncCapability> SyncHandler<S> {
    pub const NAME: &'static str = "sync";

    pub fn new(sync: Arc<S>) -> Self {
        Self { sync }
    }
}

#[async_trait]
impl<S> EventHandler for SyncHandler<S>
where
    S: SyncCapability + 'static,
{
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn handle(&self, ctx: &DispatchContext, event: &Event) -> Result<(), HandlerError> {
        let id = event.aggregate_id();
        match event.payload() {
            EventPayload::TrailCreated(trail) | EventPayload::TrailUpdated(trail) => {
                ctx.run("sync_trail", self.sync.sync_trail(id, trail)).await
            }
            EventPayload::TrailDeleted => ctx.run("remove_trail", self.sync.remove_trail(id)).await,
            EventPayload::RatingCreated(_)
            | EventPayload::RatingUpdated(_)
            | EventPayload::RatingDeleted(_)
            | EventPayload::CommentCreated(_)
            | EventPayload::CommentUpdated(_)
            | EventPayload::CommentDeleted(_) => {
                let trail_id = event.trail_id().unwrap_or(id);
                ctx.run(
                    "update_engagement_stats",
                    self.sync.update_engagement_stats(trail_id),
                )
                .await
            }
            EventPayload::UserCreated(_)
            | EventPayload::UserUpdated(_)
            | EventPayload::UserDeleted => Err(HandlerError::Unsupported {
                handler: Self::NAME,
                event_type: event.event_type(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::recording::{CallLog, RecordingServices};
    use crate::error::CapabilityError;
    use crate::handlers::fixtures;

    fn handler() -> (SyncHandler<RecordingServices>, Arc<RecordingServices>) {
        let services = Arc::new(RecordingServices::new(CallLog::new()));
        (SyncHandler::new(services.clone()), services)
    }

    #[tokio::test]
    async fn test_trail_upsert_and_delete() {
        let (handler, services) = handler();
        let ctx = DispatchContext::new();

        handler.handle(&ctx, &fixtures::trail_created("T1")).await.unwrap();
        handler.handle(&ctx, &fixtures::trail_updated("T1")).await.unwrap();
        handler.handle(&ctx, &fixtures::trail_deleted("T1")).await.unwrap();

        assert_eq!(
            services.log().calls(),
            vec!["sync_trail(T1)", "sync_trail(T1)", "remove_trail(T1)"]
        );
    }

    #[tokio::test]
    async fn test_engagement_uses_owning_trail() {
        let (handler, services) = handler();
        let ctx = DispatchContext::new();

        handler.handle(&ctx, &fixtures::rating_created("T2")).await.unwrap();
        handler.handle(&ctx, &fixtures::comment_deleted("T3")).await.unwrap();

        assert_eq!(
            services.log().calls(),
            vec!["update_engagement_stats(T2)", "update_engagement_stats(T3)"]
        );
    }

    #[tokio::test]
    async fn test_user_events_are_unsupported() {
        let (handler, services) = handler();

        let err = handler
            .handle(&DispatchContext::new(), &fixtures::user_updated("U1"))
            .await
            .unwrap_err();

        assert!(err.is_unsupported());
        assert!(services.log().calls().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_wrapped() {
        let (handler, services) = handler();
        services.fail_on("remove_trail");

        let err = handler
            .handle(&DispatchContext::new(), &fixtures::trail_deleted("T1"))
            .await
            .unwrap_err();

        match err {
            HandlerError::External { operation, source } => {
                assert_eq!(operation, "remove_trail");
                assert!(matches!(source, CapabilityError::Unavailable(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        // One attempt, no retry.
        assert_eq!(services.log().count("remove_trail(T1)"), 1);
    }
}
