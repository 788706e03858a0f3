use thiserror::Error;

/// Client-facing input errors. Never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Malformed tile path: {0}")]
    MalformedPath(String),

    #[error("Zoom {z} out of range: must be between 0 and {max}")]
    ZoomOutOfRange { z: u64, max: u8 },

    #[error("Tile coordinate out of range: x={x}, y={y} must be below {limit} at zoom {z}")]
    CoordinateOutOfRange { z: u8, x: u64, y: u64, limit: u64 },

    #[error("Invalid latitude {0}: must be between -90 and 90")]
    InvalidLatitude(f64),

    #[error("Invalid longitude {0}: must be between -180 and 180")]
    InvalidLongitude(f64),

    #[error("Invalid aggregate id: {0}")]
    InvalidAggregateId(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid rating score {0}: must be between 1 and 5")]
    InvalidScore(u8),

    #[error("Invalid comment: {0}")]
    InvalidComment(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),
}
