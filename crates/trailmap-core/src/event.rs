use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every event type the pipeline knows about.
///
/// The set is closed: adding a type means adding a payload variant and a row
/// in the registry's subscription table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "trail.created")]
    TrailCreated,
    #[serde(rename = "trail.updated")]
    TrailUpdated,
    #[serde(rename = "trail.deleted")]
    TrailDeleted,
    #[serde(rename = "rating.created")]
    RatingCreated,
    #[serde(rename = "rating.updated")]
    RatingUpdated,
    #[serde(rename = "rating.deleted")]
    RatingDeleted,
    #[serde(rename = "comment.created")]
    CommentCreated,
    #[serde(rename = "comment.updated")]
    CommentUpdated,
    #[serde(rename = "comment.deleted")]
    CommentDeleted,
    #[serde(rename = "user.created")]
    UserCreated,
    #[serde(rename = "user.updated")]
    UserUpdated,
    #[serde(rename = "user.deleted")]
    UserDeleted,
}

impl EventType {
    pub const ALL: [EventType; 12] = [
        EventType::TrailCreated,
        EventType::TrailUpdated,
        EventType::TrailDeleted,
        EventType::RatingCreated,
        EventType::RatingUpdated,
        EventType::RatingDeleted,
        EventType::CommentCreated,
        EventType::CommentUpdated,
        EventType::CommentDeleted,
        EventType::UserCreated,
        EventType::UserUpdated,
        EventType::UserDeleted,
    ];

    /// Stable dotted name, e.g. "trail.created".
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TrailCreated => "trail.created",
            EventType::TrailUpdated => "trail.updated",
            EventType::TrailDeleted => "trail.deleted",
            EventType::RatingCreated => "rating.created",
            EventType::RatingUpdated => "rating.updated",
            EventType::RatingDeleted => "rating.deleted",
            EventType::CommentCreated => "comment.created",
            EventType::CommentUpdated => "comment.updated",
            EventType::CommentDeleted => "comment.deleted",
            EventType::UserCreated => "user.created",
            EventType::UserUpdated => "user.updated",
            EventType::UserDeleted => "user.deleted",
        }
    }

    pub fn family(&self) -> EventFamily {
        match self {
            EventType::TrailCreated | EventType::TrailUpdated | EventType::TrailDeleted => {
                EventFamily::Trail
            }
            EventType::RatingCreated
            | EventType::RatingUpdated
            | EventType::RatingDeleted
            | EventType::CommentCreated
            | EventType::CommentUpdated
            | EventType::CommentDeleted => EventFamily::Engagement,
            EventType::UserCreated | EventType::UserUpdated | EventType::UserDeleted => {
                EventFamily::User
            }
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Unknown event type: {0}")]
pub struct UnknownEventType(pub String);

/// Coarse grouping used by handlers that react to a whole family at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFamily {
    Trail,
    /// Ratings and comments.
    Engagement,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
    Expert,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Moderate => "moderate",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "moderate" => Ok(Difficulty::Moderate),
            "hard" => Ok(Difficulty::Hard),
            "expert" => Ok(Difficulty::Expert),
            other => Err(format!("unknown difficulty: {}", other)),
        }
    }
}

/// Geometry and attributes of a trail at the time of the mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailSnapshot {
    pub name: String,
    pub difficulty: Difficulty,
    /// Line string as `[lon, lat]` pairs.
    pub geometry: Vec<[f64; 2]>,
}

impl TrailSnapshot {
    pub fn new(name: impl Into<String>, difficulty: Difficulty, geometry: Vec<[f64; 2]>) -> Self {
        Self {
            name: name.into(),
            difficulty,
            geometry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub trail_id: String,
    pub user_id: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub trail_id: String,
    pub user_id: String,
    pub body: String,
}

/// Deleted ratings and comments only need to point at their trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementRef {
    pub trail_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub display_name: String,
}

/// Variant-specific event data. The variant determines the event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    #[serde(rename = "trail.created")]
    TrailCreated(TrailSnapshot),
    #[serde(rename = "trail.updated")]
    TrailUpdated(TrailSnapshot),
    #[serde(rename = "trail.deleted")]
    TrailDeleted,
    #[serde(rename = "rating.created")]
    RatingCreated(Rating),
    #[serde(rename = "rating.updated")]
    RatingUpdated(Rating),
    #[serde(rename = "rating.deleted")]
    RatingDeleted(EngagementRef),
    #[serde(rename = "comment.created")]
    CommentCreated(Comment),
    #[serde(rename = "comment.updated")]
    CommentUpdated(Comment),
    #[serde(rename = "comment.deleted")]
    CommentDeleted(EngagementRef),
    #[serde(rename = "user.created")]
    UserCreated(UserProfile),
    #[serde(rename = "user.updated")]
    UserUpdated(UserProfile),
    #[serde(rename = "user.deleted")]
    UserDeleted,
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::TrailCreated(_) => EventType::TrailCreated,
            EventPayload::TrailUpdated(_) => EventType::TrailUpdated,
            EventPayload::TrailDeleted => EventType::TrailDeleted,
            EventPayload::RatingCreated(_) => EventType::RatingCreated,
            EventPayload::RatingUpdated(_) => EventType::RatingUpdated,
            EventPayload::RatingDeleted(_) => EventType::RatingDeleted,
            EventPayload::CommentCreated(_) => EventType::CommentCreated,
            EventPayload::CommentUpdated(_) => EventType::CommentUpdated,
            EventPayload::CommentDeleted(_) => EventType::CommentDeleted,
            EventPayload::UserCreated(_) => EventType::UserCreated,
            EventPayload::UserUpdated(_) => EventType::UserUpdated,
            EventPayload::UserDeleted => EventType::UserDeleted,
        }
    }

    /// Trail referenced by an engagement payload.
    fn engagement_trail_id(&self) -> Option<&str> {
        match self {
            EventPayload::RatingCreated(r) | EventPayload::RatingUpdated(r) => Some(&r.trail_id),
            EventPayload::CommentCreated(c) | EventPayload::CommentUpdated(c) => {
                Some(&c.trail_id)
            }
            EventPayload::RatingDeleted(e) | EventPayload::CommentDeleted(e) => Some(&e.trail_id),
            _ => None,
        }
    }
}

/// An immutable domain event.
///
/// Fields are private so the payload, and therefore the type, can't be
/// swapped after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: Uuid,
    aggregate_id: String,
    occurred_at: DateTime<Utc>,
    payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh id, stamped with the current time.
    pub fn new(aggregate_id: impl Into<String>, payload: EventPayload) -> Self {
        Self::from_parts(Uuid::new_v4(), aggregate_id, Utc::now(), payload)
    }

    pub fn from_parts(
        id: Uuid,
        aggregate_id: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: EventPayload,
    ) -> Self {
        Self {
            id,
            aggregate_id: aggregate_id.into(),
            occurred_at,
            payload,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    pub fn family(&self) -> EventFamily {
        self.event_type().family()
    }

    /// The trail this event affects, if any.
    ///
    /// Trail events are keyed by the trail itself; ratings and comments carry
    /// the owning trail in their payload. User events return `None`.
    pub fn trail_id(&self) -> Option<&str> {
        match self.family() {
            EventFamily::Trail => Some(&self.aggregate_id),
            EventFamily::Engagement => self.payload.engagement_trail_id(),
            EventFamily::User => None,
        }
    }
}
