use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use trailmap_core::{Event, EventType};

use crate::context::DispatchContext;
use crate::error::{DispatchError, HandlerError};

/// A consumer of domain events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Short stable name used in reports and logs.
    fn name(&self) -> &'static str;

    async fn handle(&self, ctx: &DispatchContext, event: &Event) -> Result<(), HandlerError>;
}

type Subscribers = Vec<Arc<dyn EventHandler>>;

/// Collects subscriptions at startup.
#[derive(Default)]
pub struct DispatcherBuilder {
    routes: HashMap<EventType, Subscribers>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event_type`. Handlers for one type run in
    /// the order they were subscribed.
    pub fn subscribe(&mut self, event_type: EventType, handler: Arc<dyn EventHandler>) -> &mut Self {
        self.routes.entry(event_type).or_default().push(handler);
        self
    }

    /// Freeze the subscription table.
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            routes: self.routes,
        }
    }
}

/// In-process publish/subscribe hub.
///
/// The subscription table is immutable once built, so a shared `Dispatcher`
/// can be used from any number of tasks without locking.
pub struct Dispatcher {
    routes: HashMap<EventType, Subscribers>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Names of the handlers subscribed to `event_type`, in invocation order.
    pub fn subscribers(&self, event_type: EventType) -> Vec<&'static str> {
        self.routes
            .get(&event_type)
            .map(|handlers| handlers.iter().map(|h| h.name()).collect())
            .unwrap_or_default()
    }

    /// Deliver `event` to every handler subscribed to its type.
    ///
    /// Handlers run one after another on the calling task. A failure never
    /// stops the remaining handlers; every outcome is in the report.
    pub async fn dispatch(&self, ctx: &DispatchContext, event: &Event) -> DispatchReport {
        let event_type = event.event_type();
        let handlers = self.routes.get(&event_type).map(Vec::as_slice).unwrap_or(&[]);

        if handlers.is_empty() {
            tracing::debug!("No handlers subscribed to {}", event_type);
        }

        let mut outcomes = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let name = handler.name();
            tracing::debug!(handler = name, event_id = %event.id(), "Dispatching {}", event_type);

            let result = handler.handle(ctx, event).await;
            match &result {
                Ok(()) => {}
                Err(e) if e.is_unsupported() => {
                    tracing::error!(handler = name, "Wiring defect: {}", e);
                }
                Err(e) => {
                    tracing::warn!(
                        handler = name,
                        event_id = %event.id(),
                        aggregate_id = event.aggregate_id(),
                        "Handler failed for {}: {}",
                        event_type,
                        e
                    );
                }
            }

            outcomes.push(HandlerOutcome {
                handler: name,
                result,
            });
        }

        DispatchReport {
            event_id: event.id(),
            event_type,
            outcomes,
        }
    }
}

/// Outcome of one handler for one event.
#[derive(Debug)]
pub struct HandlerOutcome {
    pub handler: &'static str,
    pub result: Result<(), HandlerError>,
}

impl HandlerOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Every handler's outcome for one dispatch, in invocation order.
#[derive(Debug)]
pub struct DispatchReport {
    event_id: Uuid,
    event_type: EventType,
    outcomes: Vec<HandlerOutcome>,
}

impl DispatchReport {
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn outcomes(&self) -> &[HandlerOutcome] {
        &self.outcomes
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(HandlerOutcome::is_ok)
    }

    /// Outcome of a handler by name, if it ran.
    pub fn outcome(&self, handler: &str) -> Option<&HandlerOutcome> {
        self.outcomes.iter().find(|o| o.handler == handler)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &HandlerError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.handler, e)))
    }

    /// Turn a report with failures into a [`DispatchError::Partial`].
    pub fn into_result(self) -> Result<DispatchReport, DispatchError> {
        if self.is_success() {
            return Ok(self);
        }

        let total = self.outcomes.len();
        let failures = self
            .outcomes
            .into_iter()
            .filter_map(|o| o.result.err().map(|e| (o.handler, e)))
            .collect();

        Err(DispatchError::Partial {
            event_id: self.event_id,
            event_type: self.event_type,
            total,
            failures,
        })
    }
}
