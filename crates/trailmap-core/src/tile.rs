use std::f64::consts::PI;
use std::fmt;

use serde::Serialize;

use crate::error::ValidationError;

/// Highest zoom level served unless configured otherwise.
pub const DEFAULT_MAX_ZOOM: u8 = 18;

/// Hard ceiling on any configured zoom; keeps `2^z` inside `u32` with room to spare.
pub const MAX_SUPPORTED_ZOOM: u8 = 22;

/// A validated tile address.
///
/// Construction guarantees `z <= max_zoom` and `x, y < 2^z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileKey {
    z: u8,
    x: u32,
    y: u32,
}

impl TileKey {
    /// Validate a coordinate against the zoom limit.
    pub fn new(z: u64, x: u64, y: u64, max_zoom: u8) -> Result<Self, ValidationError> {
        let max_zoom = max_zoom.min(MAX_SUPPORTED_ZOOM);
        if z > u64::from(max_zoom) {
            return Err(ValidationError::ZoomOutOfRange { z, max: max_zoom });
        }
        let z = z as u8;
        let limit = 1u64 << z;
        if x >= limit || y >= limit {
            return Err(ValidationError::CoordinateOutOfRange { z, x, y, limit });
        }
        Ok(Self {
            z,
            x: x as u32,
            y: y as u32,
        })
    }

    /// Parse the `{z}/{x}/{y}.mvt` (or `.pbf`) tail of a tile URL.
    ///
    /// Structural problems are reported as `MalformedPath`, numeric values
    /// that are well-formed but outside the grid as range errors.
    pub fn parse_path(path: &str, max_zoom: u8) -> Result<Self, ValidationError> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let [z, x, last] = segments.as_slice() else {
            return Err(ValidationError::MalformedPath(format!(
                "expected 3 segments, got {}",
                segments.len()
            )));
        };

        let y = last
            .strip_suffix(".mvt")
            .or_else(|| last.strip_suffix(".pbf"))
            .ok_or_else(|| {
                ValidationError::MalformedPath("tile must end in .mvt or .pbf".to_string())
            })?;

        let z = parse_coordinate("z", z)?;
        let x = parse_coordinate("x", x)?;
        let y = parse_coordinate("y", y)?;

        Self::new(z, x, y, max_zoom)
    }

    pub fn z(&self) -> u8 {
        self.z
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    /// Geographic bounds of this tile in Web Mercator tiling.
    pub fn bounds(&self) -> LonLatBounds {
        let n = f64::from(1u32 << self.z);
        let lon = |x: f64| x / n * 360.0 - 180.0;
        let lat = |y: f64| (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();

        LonLatBounds {
            west: lon(f64::from(self.x)),
            east: lon(f64::from(self.x) + 1.0),
            north: lat(f64::from(self.y)),
            south: lat(f64::from(self.y) + 1.0),
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

fn parse_coordinate(name: &str, raw: &str) -> Result<u64, ValidationError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::MalformedPath(format!(
            "{} is not a non-negative integer: {:?}",
            name, raw
        )));
    }
    raw.parse()
        .map_err(|_| ValidationError::MalformedPath(format!("{} is too large", name)))
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LonLatBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl LonLatBounds {
    /// Smallest box containing all points, or `None` for an empty slice.
    pub fn from_points(points: &[[f64; 2]]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = LonLatBounds {
            west: first[0],
            south: first[1],
            east: first[0],
            north: first[1],
        };
        for [lon, lat] in &points[1..] {
            bounds.west = bounds.west.min(*lon);
            bounds.east = bounds.east.max(*lon);
            bounds.south = bounds.south.min(*lat);
            bounds.north = bounds.north.max(*lat);
        }
        Some(bounds)
    }

    pub fn intersects(&self, other: &LonLatBounds) -> bool {
        self.west <= other.east
            && other.west <= self.east
            && self.south <= other.north
            && other.south <= self.north
    }
}

/// Cache validator for a tile under a given cache version.
///
/// Pure function of its inputs; the result is already quoted for use as an
/// `ETag` header value.
pub fn etag(version: u64, key: TileKey) -> String {
    format!("\"mvt-v{}-{}-{}-{}\"", version, key.z, key.x, key.y)
}

/// Whether an `If-None-Match` header value matches `current`.
///
/// Handles comma-separated lists, weak validators and `*`.
pub fn if_none_match_matches(header: &str, current: &str) -> bool {
    let current = current.trim_start_matches("W/");
    header.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.trim_start_matches("W/") == current
    })
}
