//! Trailmap Events - Post-commit fan-out of domain events.
//!
//! A mutation elsewhere in the system builds an [`Event`](trailmap_core::Event)
//! and hands it to the [`Dispatcher`]. The dispatcher runs every subscribed
//! handler in registration order and reports each outcome, so one failing
//! side effect never hides the others.

pub mod capability;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod registry;

pub use capability::{AuditCapability, CacheCapability, SyncCapability};
pub use context::DispatchContext;
pub use dispatcher::{DispatchReport, Dispatcher, DispatcherBuilder, EventHandler, HandlerOutcome};
pub use error::{CapabilityError, DispatchError, HandlerError};
pub use handlers::{AuditHandler, CacheHandler, SyncHandler};
pub use registry::{build_dispatcher, HandlerRole, SUBSCRIPTIONS};

#[cfg(any(test, feature = "test-utils"))]
pub use capability::recording::{CallLog, RecordingServices};
