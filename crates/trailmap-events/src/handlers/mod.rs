//! The three side-effect consumers wired by the registry.

mod audit;
mod cache;
mod sync;

pub use audit::AuditHandler;
pub use cache::CacheHandler;
pub use sync::SyncHandler;
