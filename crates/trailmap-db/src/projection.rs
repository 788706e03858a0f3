//! Read-optimized trail projection in SQLite.

use serde::Serialize;
use sqlx::SqlitePool;

use trailmap_core::{Difficulty, EngagementStats, LonLatBounds, TileKey, TrailSnapshot};
use trailmap_events::{CapabilityError, SyncCapability};
use trailmap_tiles::{encode_trails, RenderError, TileRenderer, TrailFeature};

use crate::{current_epoch_ms, StoreError};

/// A trail as stored in the projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedTrail {
    pub trail_id: String,
    pub name: String,
    pub difficulty: Difficulty,
    pub geometry: Vec<[f64; 2]>,
    pub synced_at_ms: i64,
}

#[derive(sqlx::FromRow)]
struct TrailRow {
    trail_id: String,
    name: String,
    difficulty: String,
    geometry: String,
    synced_at_ms: i64,
}

impl TryFrom<TrailRow> for ProjectedTrail {
    type Error = StoreError;

    fn try_from(row: TrailRow) -> Result<Self, Self::Error> {
        Ok(Self {
            trail_id: row.trail_id,
            name: row.name,
            difficulty: row.difficulty.parse().map_err(StoreError::Invalid)?,
            geometry: serde_json::from_str(&row.geometry)?,
            synced_at_ms: row.synced_at_ms,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EngagementRow {
    trail_id: String,
    rating_count: i64,
    average_rating: Option<f64>,
    comment_count: i64,
}

impl From<EngagementRow> for EngagementStats {
    fn from(row: EngagementRow) -> Self {
        Self {
            trail_id: row.trail_id,
            rating_count: row.rating_count.max(0) as u64,
            average_rating: row.average_rating,
            comment_count: row.comment_count.max(0) as u64,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FeatureRow {
    trail_id: String,
    name: String,
    difficulty: String,
    geometry: String,
    rating_count: Option<i64>,
    average_rating: Option<f64>,
    comment_count: Option<i64>,
}

/// Trail and engagement projection, plus the tile renderer that reads it.
#[derive(Clone)]
pub struct ProjectionStore {
    pool: SqlitePool,
}

impl ProjectionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the projected trail.
    pub async fn upsert_trail(
        &self,
        trail_id: &str,
        trail: &TrailSnapshot,
    ) -> Result<(), StoreError> {
        let bounds = LonLatBounds::from_points(&trail.geometry)
            .ok_or_else(|| StoreError::Invalid(format!("trail {} has no geometry", trail_id)))?;
        let geometry = serde_json::to_string(&trail.geometry)?;

        sqlx::query(
            r#"
            INSERT INTO trail_projection
                (trail_id, name, difficulty, geometry, min_lon, min_lat, max_lon, max_lat, synced_at_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(trail_id) DO UPDATE SET
                name = excluded.name,
                difficulty = excluded.difficulty,
                geometry = excluded.geometry,
                min_lon = excluded.min_lon,
                min_lat = excluded.min_lat,
                max_lon = excluded.max_lon,
                max_lat = excluded.max_lat,
                synced_at_ms = excluded.synced_at_ms
            "#,
        )
        .bind(trail_id)
        .bind(&trail.name)
        .bind(trail.difficulty.as_str())
        .bind(&geometry)
        .bind(bounds.west)
        .bind(bounds.south)
        .bind(bounds.east)
        .bind(bounds.north)
        .bind(current_epoch_ms())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a trail and its engagement row. Returns false if nothing was projected.
    pub async fn delete_trail(&self, trail_id: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM trail_projection WHERE trail_id = ?")
            .bind(trail_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM engagement_stats WHERE trail_id = ?")
            .bind(trail_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed > 0)
    }

    /// Recompute engagement from the primary ratings and comments, then store it.
    pub async fn recompute_engagement(&self, trail_id: &str) -> Result<EngagementStats, StoreError> {
        let scores: Vec<i64> = sqlx::query_scalar("SELECT score FROM ratings WHERE trail_id = ?")
            .bind(trail_id)
            .fetch_all(&self.pool)
            .await?;
        let comment_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE trail_id = ?")
                .bind(trail_id)
                .fetch_one(&self.pool)
                .await?;

        let scores: Vec<u8> = scores
            .into_iter()
            .filter_map(|s| u8::try_from(s).ok())
            .collect();
        let stats = EngagementStats::compute(trail_id, &scores, comment_count.max(0) as u64);

        sqlx::query(
            r#"
            INSERT INTO engagement_stats
                (trail_id, rating_count, average_rating, comment_count, updated_at_ms)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(trail_id) DO UPDATE SET
                rating_count = excluded.rating_count,
                average_rating = excluded.average_rating,
                comment_count = excluded.comment_count,
                updated_at_ms = excluded.updated_at_ms
            "#,
        )
        .bind(trail_id)
        .bind(stats.rating_count as i64)
        .bind(stats.average_rating)
        .bind(stats.comment_count as i64)
        .bind(current_epoch_ms())
        .execute(&self.pool)
        .await?;

        Ok(stats)
    }

    pub async fn get_trail(&self, trail_id: &str) -> Result<Option<ProjectedTrail>, StoreError> {
        let row = sqlx::query_as::<_, TrailRow>(
            "SELECT trail_id, name, difficulty, geometry, synced_at_ms FROM trail_projection WHERE trail_id = ?",
        )
        .bind(trail_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProjectedTrail::try_from).transpose()
    }

    pub async fn get_engagement(
        &self,
        trail_id: &str,
    ) -> Result<Option<EngagementStats>, StoreError> {
        let row = sqlx::query_as::<_, EngagementRow>(
            "SELECT trail_id, rating_count, average_rating, comment_count FROM engagement_stats WHERE trail_id = ?",
        )
        .bind(trail_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(EngagementStats::from))
    }

    /// Trails whose bounding box intersects `bounds`, joined with their engagement.
    pub async fn trails_in_bounds(
        &self,
        bounds: &LonLatBounds,
    ) -> Result<Vec<TrailFeature>, StoreError> {
        let rows = sqlx::query_as::<_, FeatureRow>(
            r#"
            SELECT t.trail_id, t.name, t.difficulty, t.geometry,
                   e.rating_count, e.average_rating, e.comment_count
            FROM trail_projection t
            LEFT JOIN engagement_stats e ON e.trail_id = t.trail_id
            WHERE t.min_lon <= ? AND t.max_lon >= ?
              AND t.min_lat <= ? AND t.max_lat >= ?
            ORDER BY t.trail_id
            "#,
        )
        .bind(bounds.east)
        .bind(bounds.west)
        .bind(bounds.north)
        .bind(bounds.south)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(TrailFeature {
                    geometry: serde_json::from_str(&row.geometry)?,
                    id: row.trail_id,
                    name: row.name,
                    difficulty: row.difficulty,
                    rating_count: row.rating_count.unwrap_or(0).max(0) as u64,
                    average_rating: row.average_rating,
                    comment_count: row.comment_count.unwrap_or(0).max(0) as u64,
                })
            })
            .collect()
    }
}

impl SyncCapability for ProjectionStore {
    async fn sync_trail(&self, trail_id: &str, trail: &TrailSnapshot) -> Result<(), CapabilityError> {
        self.upsert_trail(trail_id, trail).await?;
        tracing::debug!("Projected trail {}", trail_id);
        Ok(())
    }

    async fn remove_trail(&self, trail_id: &str) -> Result<(), CapabilityError> {
        if !self.delete_trail(trail_id).await? {
            tracing::debug!("Trail {} was not projected", trail_id);
        }
        Ok(())
    }

    async fn update_engagement_stats(&self, trail_id: &str) -> Result<(), CapabilityError> {
        let stats = self.recompute_engagement(trail_id).await?;
        tracing::debug!(
            "Engagement for {}: {} ratings, {} comments",
            trail_id,
            stats.rating_count,
            stats.comment_count
        );
        Ok(())
    }
}

impl TileRenderer for ProjectionStore {
    async fn render(&self, key: TileKey) -> Result<Vec<u8>, RenderError> {
        let trails = self
            .trails_in_bounds(&key.bounds())
            .await
            .map_err(|e| RenderError(e.to_string()))?;
        Ok(encode_trails(key, &trails))
    }
}
