use std::sync::Arc;

use async_trait::async_trait;

use trailmap_core::Event;

use crate::capability::AuditCapability;
use crate::context::DispatchContext;
use crate::dispatcher::EventHandler;
use crate::error::HandlerError;

/// Appends one record per event. Lowest-priority side effect: it never
/// touches projection or cache state, and its failures are only logged.
pub struct AuditHandler<A> {
    audit: Arc<A>,
}

impl<A: AuditCapability> AuditHandler<A> {
    pub const NAME: &'static str = "audit";

    pub fn new(audit: Arc<A>) -> Self {
        Self { audit }
    }
}

#[async_trait]
impl<A> EventHandler for AuditHandler<A>
where
    A: AuditCapability + 'static,
{
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn handle(&self, ctx: &DispatchContext, event: &Event) -> Result<(), HandlerError> {
        let result = ctx.run("record", self.audit.record(event)).await;
        if let Err(e) = &result {
            tracing::warn!(
                event_id = %event.id(),
                "Audit record for {} not written: {}",
                event.event_type(),
                e
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::recording::{CallLog, RecordingServices};
    use crate::handlers::fixtures;

    #[tokio::test]
    async fn test_records_every_family() {
        let services = Arc::new(RecordingServices::new(CallLog::new()));
        let handler = AuditHandler::new(services.clone());
        let ctx = DispatchContext::new();

        handler.handle(&ctx, &fixtures::trail_created("T1")).await.unwrap();
        handler.handle(&ctx, &fixtures::comment_created("T2")).await.unwrap();
        handler.handle(&ctx, &fixtures::user_updated("U1")).await.unwrap();

        assert_eq!(
            services.log().calls(),
            vec![
                "record(trail.created:T1)",
                "record(comment.created:C1)",
                "record(user.updated:U1)"
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_is_reported() {
        let services = Arc::new(RecordingServices::new(CallLog::new()));
        services.fail_on("record");
        let handler = AuditHandler::new(services.clone());

        let err = handler
            .handle(&DispatchContext::new(), &fixtures::trail_deleted("T1"))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::External { operation: "record", .. }));
    }
}
