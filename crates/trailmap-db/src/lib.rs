//! Trailmap DB - SQLite implementations of the pipeline's external services.
//!
//! The projection store backs both the sync capability and tile rendering;
//! the audit log backs the audit capability.

pub mod audit;
pub mod projection;

pub use audit::{AuditLog, AuditRecord};
pub use projection::{ProjectedTrail, ProjectionStore};

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

use trailmap_events::CapabilityError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid record: {0}")]
    Invalid(String),
}

impl From<StoreError> for CapabilityError {
    fn from(e: StoreError) -> Self {
        match &e {
            StoreError::Database(sqlx::Error::Database(db))
                if !matches!(db.kind(), sqlx::error::ErrorKind::Other) =>
            {
                CapabilityError::Rejected(e.to_string())
            }
            StoreError::Serialization(_) | StoreError::Invalid(_) => {
                CapabilityError::Rejected(e.to_string())
            }
            StoreError::Database(_) => CapabilityError::Unavailable(e.to_string()),
        }
    }
}

/// Get current time as milliseconds since Unix epoch.
pub fn current_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Initialize database connection pool with recommended pragmas.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    // Every connection to an in-memory database is a separate database.
    let max_connections = if database_url.contains(":memory:") { 1 } else { 10 };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// Run database migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(include_str!("../migrations/001_projection.sql"))
        .execute(pool)
        .await?;
    sqlx::raw_sql(include_str!("../migrations/002_primary_read_tables.sql"))
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn setup_test_db() -> SqlitePool {
    let pool = init_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = setup_test_db().await;
        run_migrations(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert_eq!(
            tables,
            vec![
                "audit_log",
                "comments",
                "engagement_stats",
                "ratings",
                "trail_projection"
            ]
        );
    }

    #[test]
    fn test_capability_error_mapping() {
        let err: CapabilityError = StoreError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, CapabilityError::Unavailable(_)));
    }
}
