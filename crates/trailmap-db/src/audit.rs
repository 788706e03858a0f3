use serde::Serialize;
use sqlx::SqlitePool;

use trailmap_core::Event;
use trailmap_events::{AuditCapability, CapabilityError};

use crate::{current_epoch_ms, StoreError};

/// Append-only record of every dispatched event.
#[derive(Clone)]
pub struct AuditLog {
    pool: SqlitePool,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct AuditRecord {
    pub seq: i64,
    pub event_id: String,
    pub event_type: String,
    pub aggregate_id: String,
    pub occurred_at: String,
    pub payload: String,
    pub recorded_at_ms: i64,
}

impl AuditLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append `event`. Returns false if the event id was already recorded.
    pub async fn append(&self, event: &Event) -> Result<bool, StoreError> {
        let payload = serde_json::to_string(event.payload())?;

        let result = sqlx::query(
            r#"
            INSERT INTO audit_log (event_id, event_type, aggregate_id, occurred_at, payload, recorded_at_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(event_id) DO NOTHING
            "#,
        )
        .bind(event.id().to_string())
        .bind(event.event_type().as_str())
        .bind(event.aggregate_id())
        .bind(event.occurred_at().to_rfc3339())
        .bind(&payload)
        .bind(current_epoch_ms())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Most recent entries first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditRecord>, StoreError> {
        let records = sqlx::query_as::<_, AuditRecord>(
            "SELECT seq, event_id, event_type, aggregate_id, occurred_at, payload, recorded_at_ms FROM audit_log ORDER BY seq DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Entries for one aggregate in the order they were recorded.
    pub async fn for_aggregate(&self, aggregate_id: &str) -> Result<Vec<AuditRecord>, StoreError> {
        let records = sqlx::query_as::<_, AuditRecord>(
            "SELECT seq, event_id, event_type, aggregate_id, occurred_at, payload, recorded_at_ms FROM audit_log WHERE aggregate_id = ? ORDER BY seq",
        )
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

impl AuditCapability for AuditLog {
    async fn record(&self, event: &Event) -> Result<(), CapabilityError> {
        if !self.append(event).await? {
            tracing::debug!("Event {} already audited", event.id());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailmap_core::{EventPayload, UserProfile};

    use crate::setup_test_db;

    fn user_updated(id: &str) -> Event {
        Event::new(
            id,
            EventPayload::UserUpdated(UserProfile {
                display_name: "Kari".to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn test_record_and_read_back() {
        let log = AuditLog::new(setup_test_db().await);
        let event = user_updated("U1");

        log.record(&event).await.unwrap();

        let records = log.recent(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_id, event.id().to_string());
        assert_eq!(records[0].event_type, "user.updated");
        assert_eq!(records[0].aggregate_id, "U1");
        assert!(records[0].payload.contains("Kari"));
    }

    #[tokio::test]
    async fn test_duplicate_event_is_noop() {
        let log = AuditLog::new(setup_test_db().await);
        let event = user_updated("U1");

        assert!(log.append(&event).await.unwrap());
        assert!(!log.append(&event).await.unwrap());
        log.record(&event).await.unwrap();

        assert_eq!(log.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_order_per_aggregate() {
        let log = AuditLog::new(setup_test_db().await);
        let first = user_updated("U1");
        let other = user_updated("U2");
        let second = Event::new("U1", EventPayload::UserDeleted);

        log.record(&first).await.unwrap();
        log.record(&other).await.unwrap();
        log.record(&second).await.unwrap();

        let records = log.for_aggregate("U1").await.unwrap();
        let types: Vec<&str> = records.iter().map(|r| r.event_type.as_str()).collect();
        assert_eq!(types, vec!["user.updated", "user.deleted"]);

        let recent = log.recent(1).await.unwrap();
        assert_eq!(recent[0].event_id, second.id().to_string());
    }

    #[tokio::test]
    async fn test_log_rejects_updates() {
        let pool = setup_test_db().await;
        let log = AuditLog::new(pool.clone());
        log.record(&user_updated("U1")).await.unwrap();

        let result = sqlx::query("UPDATE audit_log SET aggregate_id = 'U2'")
            .execute(&pool)
            .await;
        assert!(result.is_err());

        let result = sqlx::query("DELETE FROM audit_log").execute(&pool).await;
        assert!(result.is_err());
        assert_eq!(log.count().await.unwrap(), 1);
    }
}
