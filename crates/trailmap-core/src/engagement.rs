use serde::{Deserialize, Serialize};

/// Per-trail engagement aggregate kept alongside the geospatial projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementStats {
    pub trail_id: String,
    pub rating_count: u64,
    /// `None` until the trail has at least one rating.
    pub average_rating: Option<f64>,
    pub comment_count: u64,
}

impl EngagementStats {
    /// Aggregate raw rating scores and a comment count.
    pub fn compute(trail_id: impl Into<String>, scores: &[u8], comment_count: u64) -> Self {
        let rating_count = scores.len() as u64;
        let average_rating = if scores.is_empty() {
            None
        } else {
            let total: u64 = scores.iter().map(|s| u64::from(*s)).sum();
            Some(round2(total as f64 / rating_count as f64))
        };

        Self {
            trail_id: trail_id.into(),
            rating_count,
            average_rating,
            comment_count,
        }
    }

    pub fn empty(trail_id: impl Into<String>) -> Self {
        Self::compute(trail_id, &[], 0)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
