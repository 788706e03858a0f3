use crate::error::ValidationError;
use crate::event::{Comment, Event, EventPayload, Rating, TrailSnapshot, UserProfile};

const MAX_ID_LEN: usize = 128;
const MAX_NAME_LEN: usize = 256;
const MAX_COMMENT_LEN: usize = 4096;

/// Validator for events arriving from mutation sites.
pub struct Validator;

impl Validator {
    /// Validate latitude value.
    pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::InvalidLatitude(lat));
        }
        Ok(())
    }

    /// Validate longitude value.
    pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
        if !(-180.0..=180.0).contains(&lon) {
            return Err(ValidationError::InvalidLongitude(lon));
        }
        Ok(())
    }

    /// Ids are opaque but must be non-empty, bounded, and free of whitespace.
    pub fn validate_id(id: &str) -> Result<(), ValidationError> {
        if id.is_empty() {
            return Err(ValidationError::InvalidAggregateId(
                "id cannot be empty".to_string(),
            ));
        }
        if id.len() > MAX_ID_LEN {
            return Err(ValidationError::InvalidAggregateId(format!(
                "id too long: {} chars (max {})",
                id.len(),
                MAX_ID_LEN
            )));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidAggregateId(format!(
                "id contains whitespace: {:?}",
                id
            )));
        }
        Ok(())
    }

    /// A trail line needs at least two valid points.
    pub fn validate_geometry(points: &[[f64; 2]]) -> Result<(), ValidationError> {
        if points.len() < 2 {
            return Err(ValidationError::InvalidGeometry(format!(
                "line needs at least 2 points, got {}",
                points.len()
            )));
        }
        for [lon, lat] in points {
            Self::validate_longitude(*lon)?;
            Self::validate_latitude(*lat)?;
        }
        Ok(())
    }

    pub fn validate_trail(trail: &TrailSnapshot) -> Result<(), ValidationError> {
        Self::validate_name(&trail.name)?;
        Self::validate_geometry(&trail.geometry)
    }

    pub fn validate_rating(rating: &Rating) -> Result<(), ValidationError> {
        Self::validate_id(&rating.trail_id)?;
        Self::validate_id(&rating.user_id)?;
        if !(1..=5).contains(&rating.score) {
            return Err(ValidationError::InvalidScore(rating.score));
        }
        Ok(())
    }

    pub fn validate_comment(comment: &Comment) -> Result<(), ValidationError> {
        Self::validate_id(&comment.trail_id)?;
        Self::validate_id(&comment.user_id)?;
        if comment.body.trim().is_empty() {
            return Err(ValidationError::InvalidComment(
                "body cannot be empty".to_string(),
            ));
        }
        if comment.body.len() > MAX_COMMENT_LEN {
            return Err(ValidationError::InvalidComment(format!(
                "body too long: {} chars (max {})",
                comment.body.len(),
                MAX_COMMENT_LEN
            )));
        }
        Ok(())
    }

    pub fn validate_user(user: &UserProfile) -> Result<(), ValidationError> {
        Self::validate_name(&user.display_name)
    }

    fn validate_name(name: &str) -> Result<(), ValidationError> {
        if name.trim().is_empty() {
            return Err(ValidationError::InvalidName("name cannot be empty".to_string()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(ValidationError::InvalidName(format!(
                "name too long: {} chars (max {})",
                name.len(),
                MAX_NAME_LEN
            )));
        }
        Ok(())
    }

    /// Validate a payload.
    pub fn validate_payload(payload: &EventPayload) -> Result<(), ValidationError> {
        match payload {
            EventPayload::TrailCreated(t) | EventPayload::TrailUpdated(t) => {
                Self::validate_trail(t)
            }
            EventPayload::RatingCreated(r) | EventPayload::RatingUpdated(r) => {
                Self::validate_rating(r)
            }
            EventPayload::CommentCreated(c) | EventPayload::CommentUpdated(c) => {
                Self::validate_comment(c)
            }
            EventPayload::RatingDeleted(e) | EventPayload::CommentDeleted(e) => {
                Self::validate_id(&e.trail_id)
            }
            EventPayload::UserCreated(u) | EventPayload::UserUpdated(u) => Self::validate_user(u),
            EventPayload::TrailDeleted | EventPayload::UserDeleted => Ok(()),
        }
    }

    /// Validate a complete event.
    pub fn validate_event(event: &Event) -> Result<(), ValidationError> {
        Self::validate_id(event.aggregate_id())?;
        Self::validate_payload(event.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Difficulty, EngagementRef};

    #[test]
    fn test_coordinates() {
        assert!(Validator::validate_latitude(59.9).is_ok());
        assert!(Validator::validate_latitude(90.1).is_err());
        assert!(Validator::validate_latitude(f64::NAN).is_err());
        assert!(Validator::validate_longitude(-180.0).is_ok());
        assert!(Validator::validate_longitude(180.1).is_err());
        assert!(Validator::validate_longitude(f64::NAN).is_err());
    }

    #[test]
    fn test_ids() {
        assert!(Validator::validate_id("T1").is_ok());
        assert!(Validator::validate_id("").is_err());
        assert!(Validator::validate_id("T 1").is_err());
        assert!(Validator::validate_id(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_geometry() {
        assert!(Validator::validate_geometry(&[[10.7, 59.9], [10.8, 59.95]]).is_ok());
        assert!(Validator::validate_geometry(&[[10.7, 59.9]]).is_err());
        assert!(Validator::validate_geometry(&[[10.7, 59.9], [190.0, 59.95]]).is_err());
    }

    #[test]
    fn test_rating_score() {
        let mut rating = Rating {
            trail_id: "T1".to_string(),
            user_id: "U1".to_string(),
            score: 5,
        };
        assert!(Validator::validate_rating(&rating).is_ok());
        rating.score = 0;
        assert_eq!(
            Validator::validate_rating(&rating),
            Err(ValidationError::InvalidScore(0))
        );
        rating.score = 6;
        assert!(Validator::validate_rating(&rating).is_err());
    }

    #[test]
    fn test_validate_event() {
        let trail = TrailSnapshot::new("Loop", Difficulty::Easy, vec![[10.7, 59.9], [10.8, 59.9]]);
        assert!(Validator::validate_event(&Event::new("T1", EventPayload::TrailCreated(trail))).is_ok());

        let blank = TrailSnapshot::new("  ", Difficulty::Easy, vec![[10.7, 59.9], [10.8, 59.9]]);
        assert!(Validator::validate_event(&Event::new("T1", EventPayload::TrailCreated(blank))).is_err());

        let deleted = EventPayload::CommentDeleted(EngagementRef {
            trail_id: String::new(),
        });
        assert!(Validator::validate_event(&Event::new("C1", deleted)).is_err());
        assert!(Validator::validate_event(&Event::new("", EventPayload::TrailDeleted)).is_err());
    }
}
