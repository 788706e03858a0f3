//! Composition root for the event pipeline.
//!
//! [`SUBSCRIPTIONS`] is the single source of truth for what reacts to what.
//! Within a row, `Sync` always precedes `Cache`: the projection write has
//! completed before the tile version moves, so a tile requested with the new
//! validator is rendered from synced data.

use std::sync::Arc;

use trailmap_core::EventType;

use crate::capability::{AuditCapability, CacheCapability, SyncCapability};
use crate::dispatcher::{Dispatcher, EventHandler};
use crate::handlers::{AuditHandler, CacheHandler, SyncHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerRole {
    Sync,
    Cache,
    Audit,
}

const PROJECTED: &[HandlerRole] = &[HandlerRole::Sync, HandlerRole::Cache, HandlerRole::Audit];
const AUDITED: &[HandlerRole] = &[HandlerRole::Audit];

/// Fixed (event type -> handlers) table, in invocation order.
pub const SUBSCRIPTIONS: &[(EventType, &[HandlerRole])] = &[
    (EventType::TrailCreated, PROJECTED),
    (EventType::TrailUpdated, PROJECTED),
    (EventType::TrailDeleted, PROJECTED),
    (EventType::RatingCreated, PROJECTED),
    (EventType::RatingUpdated, PROJECTED),
    (EventType::RatingDeleted, PROJECTED),
    (EventType::CommentCreated, PROJECTED),
    (EventType::CommentUpdated, PROJECTED),
    (EventType::CommentDeleted, PROJECTED),
    (EventType::UserCreated, AUDITED),
    (EventType::UserUpdated, AUDITED),
    (EventType::UserDeleted, AUDITED),
];

/// Build the dispatcher with one instance of each handler, wired per
/// [`SUBSCRIPTIONS`].
pub fn build_dispatcher<S, C, A>(sync: Arc<S>, cache: Arc<C>, audit: Arc<A>) -> Dispatcher
where
    S: SyncCapability + 'static,
    C: CacheCapability + 'static,
    A: AuditCapability + 'static,
{
    let sync: Arc<dyn EventHandler> = Arc::new(SyncHandler::new(sync));
    let cache: Arc<dyn EventHandler> = Arc::new(CacheHandler::new(cache));
    let audit: Arc<dyn EventHandler> = Arc::new(AuditHandler::new(audit));

    let mut builder = Dispatcher::builder();
    for (event_type, roles) in SUBSCRIPTIONS {
        for role in *roles {
            let handler = match role {
                HandlerRole::Sync => &sync,
                HandlerRole::Cache => &cache,
                HandlerRole::Audit => &audit,
            };
            builder.subscribe(*event_type, handler.clone());
        }
    }

    let dispatcher = builder.build();
    tracing::info!(
        "Event dispatcher ready with {} subscribed event types",
        SUBSCRIPTIONS.len()
    );
    dispatcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use crate::capability::recording::{CallLog, RecordingServices};
    use crate::context::DispatchContext;
    use crate::handlers::fixtures;

    fn wired() -> (Dispatcher, Arc<RecordingServices>) {
        let services = Arc::new(RecordingServices::new(CallLog::new()));
        let dispatcher = build_dispatcher(services.clone(), services.clone(), services.clone());
        (dispatcher, services)
    }

    fn role_name(role: HandlerRole) -> &'static str {
        match role {
            HandlerRole::Sync => "sync",
            HandlerRole::Cache => "cache",
            HandlerRole::Audit => "audit",
        }
    }

    #[test]
    fn test_table_covers_every_type_once() {
        let types: HashSet<EventType> = SUBSCRIPTIONS.iter().map(|(t, _)| *t).collect();
        assert_eq!(types.len(), SUBSCRIPTIONS.len());
        assert_eq!(types.len(), EventType::ALL.len());
    }

    #[test]
    fn test_sync_precedes_cache_in_every_row() {
        for (event_type, roles) in SUBSCRIPTIONS {
            let sync = roles.iter().position(|r| *r == HandlerRole::Sync);
            let cache = roles.iter().position(|r| *r == HandlerRole::Cache);
            if let (Some(sync), Some(cache)) = (sync, cache) {
                assert!(sync < cache, "{} runs cache before sync", event_type);
            }
        }
    }

    #[test]
    fn test_dispatcher_matches_table() {
        let (dispatcher, _) = wired();
        for (event_type, roles) in SUBSCRIPTIONS {
            let expected: Vec<&str> = roles.iter().map(|r| role_name(*r)).collect();
            assert_eq!(dispatcher.subscribers(*event_type), expected);
        }
    }

    #[tokio::test]
    async fn test_trail_deletion_scenario() {
        let (dispatcher, services) = wired();
        let event = fixtures::trail_deleted("T1");

        let report = dispatcher.dispatch(&DispatchContext::new(), &event).await;

        assert!(report.is_success());
        assert_eq!(
            services.log().calls(),
            vec![
                "remove_trail(T1)",
                "invalidate_trail_cache(T1)",
                "invalidate_mvt_cache()",
                "record(trail.deleted:T1)",
            ]
        );
    }

    #[tokio::test]
    async fn test_comment_created_scenario() {
        let (dispatcher, services) = wired();
        let event = fixtures::comment_created("T2");

        let report = dispatcher.dispatch(&DispatchContext::new(), &event).await;

        assert!(report.is_success());
        assert_eq!(
            services.log().calls(),
            vec![
                "update_engagement_stats(T2)",
                "invalidate_engagement_cache(T2)",
                "invalidate_mvt_cache()",
                "record(comment.created:C1)",
            ]
        );
    }

    #[tokio::test]
    async fn test_user_events_only_audited() {
        let (dispatcher, services) = wired();

        let report = dispatcher
            .dispatch(&DispatchContext::new(), &fixtures::user_updated("U1"))
            .await;

        assert!(report.is_success());
        assert_eq!(services.log().calls(), vec!["record(user.updated:U1)"]);
    }

    #[tokio::test]
    async fn test_each_side_effect_is_independent() {
        let (dispatcher, services) = wired();
        services.fail_on("remove_trail");
        services.fail_on("record");

        let report = dispatcher
            .dispatch(&DispatchContext::new(), &fixtures::trail_deleted("T1"))
            .await;

        assert_eq!(services.log().count("remove_trail(T1)"), 1);
        assert_eq!(services.log().count("invalidate_trail_cache(T1)"), 1);
        assert_eq!(services.log().count("invalidate_mvt_cache()"), 1);
        assert_eq!(services.log().count("record(trail.deleted:T1)"), 1);

        assert!(!report.outcome("sync").unwrap().is_ok());
        assert!(report.outcome("cache").unwrap().is_ok());
        assert!(!report.outcome("audit").unwrap().is_ok());
        let failed: Vec<&str> = report.failures().map(|(h, _)| h).collect();
        assert_eq!(failed, vec!["sync", "audit"]);
    }

    #[tokio::test]
    async fn test_sync_completes_before_tile_version_moves() {
        let (dispatcher, services) = wired();

        dispatcher
            .dispatch(&DispatchContext::new(), &fixtures::trail_updated("T1"))
            .await;

        let calls = services.log().calls();
        let synced = calls.iter().position(|c| c == "sync_trail(T1)").unwrap();
        let bumped = calls.iter().position(|c| c == "invalidate_mvt_cache()").unwrap();
        assert!(synced < bumped);
    }

    #[tokio::test]
    async fn test_cancelled_dispatch_reports_every_handler() {
        let (dispatcher, services) = wired();
        services.hang_on("sync_trail");

        let token = CancellationToken::new();
        let ctx = DispatchContext::with_cancellation(token.clone());
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let report = dispatcher
            .dispatch(&ctx, &fixtures::trail_created("T1"))
            .await;
        canceller.await.unwrap();

        assert_eq!(report.outcomes().len(), 3);
        for outcome in report.outcomes() {
            let err = outcome.result.as_ref().unwrap_err();
            assert!(err.is_cancellation(), "{}: {}", outcome.handler, err);
        }
        // Only the hanging call reached the store; the rest saw the cancelled context first.
        assert_eq!(services.log().calls(), vec!["sync_trail(T1)"]);
    }

    #[tokio::test]
    async fn test_deadline_applies_per_call() {
        let (dispatcher, services) = wired();
        services.hang_on("record");

        let ctx = DispatchContext::new().with_timeout(Duration::from_millis(50));
        let report = dispatcher
            .dispatch(&ctx, &fixtures::rating_created("T2"))
            .await;

        assert!(report.outcome("sync").unwrap().is_ok());
        assert!(report.outcome("cache").unwrap().is_ok());
        assert!(report
            .outcome("audit")
            .unwrap()
            .result
            .as_ref()
            .unwrap_err()
            .is_cancellation());
    }
}
