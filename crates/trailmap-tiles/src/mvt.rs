//! Mapbox Vector Tile encoding for trail lines.
//!
//! Messages follow vector_tile.proto v2; only the parts needed for line
//! features are used.

use std::collections::HashMap;
use std::f64::consts::PI;

use prost::Message;

use trailmap_core::TileKey;

/// Tile coordinate space.
pub const EXTENT: u32 = 4096;
pub const LAYER_NAME: &str = "trails";

const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;
const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;

#[derive(Clone, PartialEq, Message)]
pub struct Tile {
    #[prost(message, repeated, tag = "3")]
    pub layers: Vec<Layer>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Layer {
    #[prost(uint32, required, tag = "15")]
    pub version: u32,
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub features: Vec<Feature>,
    #[prost(string, repeated, tag = "3")]
    pub keys: Vec<String>,
    #[prost(message, repeated, tag = "4")]
    pub values: Vec<Value>,
    #[prost(uint32, optional, tag = "5")]
    pub extent: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Feature {
    #[prost(uint64, optional, tag = "1")]
    pub id: Option<u64>,
    #[prost(uint32, repeated, packed = "true", tag = "2")]
    pub tags: Vec<u32>,
    #[prost(enumeration = "GeomType", optional, tag = "3")]
    pub r#type: Option<i32>,
    #[prost(uint32, repeated, packed = "true", tag = "4")]
    pub geometry: Vec<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Value {
    #[prost(string, optional, tag = "1")]
    pub string_value: Option<String>,
    #[prost(float, optional, tag = "2")]
    pub float_value: Option<f32>,
    #[prost(double, optional, tag = "3")]
    pub double_value: Option<f64>,
    #[prost(int64, optional, tag = "4")]
    pub int_value: Option<i64>,
    #[prost(uint64, optional, tag = "5")]
    pub uint_value: Option<u64>,
    #[prost(sint64, optional, tag = "6")]
    pub sint_value: Option<i64>,
    #[prost(bool, optional, tag = "7")]
    pub bool_value: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum GeomType {
    Unknown = 0,
    Point = 1,
    Linestring = 2,
    Polygon = 3,
}

/// A projected trail as rendered into a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailFeature {
    pub id: String,
    pub name: String,
    pub difficulty: String,
    /// `[lon, lat]` pairs.
    pub geometry: Vec<[f64; 2]>,
    pub rating_count: u64,
    pub average_rating: Option<f64>,
    pub comment_count: u64,
}

/// Encode trails as a single `trails` layer.
///
/// Features that collapse to fewer than two distinct points at this zoom are
/// dropped. A tile without features encodes to an empty buffer.
pub fn encode_trails(key: TileKey, trails: &[TrailFeature]) -> Vec<u8> {
    let mut layer = LayerBuilder::default();
    for trail in trails {
        let Some(geometry) = encode_line(key, &trail.geometry) else {
            continue;
        };

        let mut tags = Vec::new();
        layer.tag(&mut tags, "id", PropValue::Str(&trail.id));
        layer.tag(&mut tags, "name", PropValue::Str(&trail.name));
        layer.tag(&mut tags, "difficulty", PropValue::Str(&trail.difficulty));
        layer.tag(&mut tags, "rating_count", PropValue::Uint(trail.rating_count));
        layer.tag(&mut tags, "comment_count", PropValue::Uint(trail.comment_count));
        if let Some(avg) = trail.average_rating {
            layer.tag(&mut tags, "average_rating", PropValue::Double(avg));
        }

        layer.features.push(Feature {
            id: None,
            tags,
            r#type: Some(GeomType::Linestring as i32),
            geometry,
        });
    }

    if layer.features.is_empty() {
        return Vec::new();
    }

    Tile {
        layers: vec![layer.finish()],
    }
    .encode_to_vec()
}

/// Project a lon/lat into this tile's pixel grid.
fn project(key: TileKey, [lon, lat]: [f64; 2]) -> (i64, i64) {
    let n = f64::from(1u32 << key.z());
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();

    let world_x = (lon + 180.0) / 360.0 * n;
    let world_y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n;

    let extent = f64::from(EXTENT);
    let px = ((world_x - f64::from(key.x())) * extent).round() as i64;
    let py = ((world_y - f64::from(key.y())) * extent).round() as i64;
    (px, py)
}

fn encode_line(key: TileKey, points: &[[f64; 2]]) -> Option<Vec<u32>> {
    let mut pixels: Vec<(i64, i64)> = Vec::with_capacity(points.len());
    for p in points {
        let px = project(key, *p);
        if pixels.last() != Some(&px) {
            pixels.push(px);
        }
    }
    if pixels.len() < 2 {
        return None;
    }

    let mut geometry = Vec::with_capacity(2 + pixels.len() * 2);
    let (mut cx, mut cy) = (0i64, 0i64);

    geometry.push(command(CMD_MOVE_TO, 1));
    let (x0, y0) = pixels[0];
    geometry.push(zigzag(x0 - cx));
    geometry.push(zigzag(y0 - cy));
    (cx, cy) = (x0, y0);

    geometry.push(command(CMD_LINE_TO, (pixels.len() - 1) as u32));
    for &(x, y) in &pixels[1..] {
        geometry.push(zigzag(x - cx));
        geometry.push(zigzag(y - cy));
        (cx, cy) = (x, y);
    }
    Some(geometry)
}

fn command(id: u32, count: u32) -> u32 {
    (id & 0x7) | (count << 3)
}

fn zigzag(n: i64) -> u32 {
    let n = n as i32;
    ((n << 1) ^ (n >> 31)) as u32
}

enum PropValue<'a> {
    Str(&'a str),
    Uint(u64),
    Double(f64),
}

/// Interns keys and values as the layer is built.
#[derive(Default)]
struct LayerBuilder {
    keys: Vec<String>,
    key_index: HashMap<String, u32>,
    values: Vec<Value>,
    value_index: HashMap<String, u32>,
    features: Vec<Feature>,
}

impl LayerBuilder {
    fn tag(&mut self, tags: &mut Vec<u32>, key: &str, value: PropValue<'_>) {
        let key_idx = match self.key_index.get(key) {
            Some(idx) => *idx,
            None => {
                let idx = self.keys.len() as u32;
                self.keys.push(key.to_string());
                self.key_index.insert(key.to_string(), idx);
                idx
            }
        };

        let (dedup_key, value) = match value {
            PropValue::Str(s) => (
                format!("s:{}", s),
                Value {
                    string_value: Some(s.to_string()),
                    ..Value::default()
                },
            ),
            PropValue::Uint(u) => (
                format!("u:{}", u),
                Value {
                    uint_value: Some(u),
                    ..Value::default()
                },
            ),
            PropValue::Double(d) => (
                format!("d:{}", d.to_bits()),
                Value {
                    double_value: Some(d),
                    ..Value::default()
                },
            ),
        };
        let value_idx = match self.value_index.get(&dedup_key) {
            Some(idx) => *idx,
            None => {
                let idx = self.values.len() as u32;
                self.values.push(value);
                self.value_index.insert(dedup_key, idx);
                idx
            }
        };

        tags.push(key_idx);
        tags.push(value_idx);
    }

    fn finish(self) -> Layer {
        Layer {
            version: 2,
            name: LAYER_NAME.to_string(),
            features: self.features,
            keys: self.keys,
            values: self.values,
            extent: Some(EXTENT),
        }
    }
}
