//! Typed input records and the scope key.
//!
//! The upstream data feed delivers loosely-typed documents; each record kind
//! is modelled as a closed schema with one explicit `extra` map capturing
//! any fields this library does not interpret, so forward-compatible
//! payloads survive a round trip without becoming untyped dictionaries.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The unit of independent graph/snapshot computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub server_id: String,
    pub railway_mod: String,
    pub dimension: String,
}

impl ScopeKey {
    pub fn new(
        server_id: impl Into<String>,
        railway_mod: impl Into<String>,
        dimension: impl Into<String>,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            railway_mod: railway_mod.into(),
            dimension: dimension.into(),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.server_id, self.railway_mod, self.dimension
        )
    }
}

/// A transit route: an ordered sequence of platforms plus display metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRecord {
    pub entity_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<i32>,
    #[serde(default)]
    pub transport_mode: Option<String>,
    #[serde(default)]
    pub platform_ids: Vec<i64>,
    #[serde(default)]
    pub custom_destinations: Vec<String>,
    #[serde(default)]
    pub route_type: Option<String>,
    #[serde(default)]
    pub circular_state: Option<String>,
    #[serde(default)]
    pub light_rail_route_number: Option<String>,
    /// Last modification, epoch milliseconds.
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(flatten, default)]
    pub extra: HashMap<String, Value>,
}

/// A boarding point, bounded by two packed block positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRecord {
    pub entity_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<i32>,
    #[serde(default)]
    pub transport_mode: Option<String>,
    #[serde(default)]
    pub station_id: Option<i64>,
    #[serde(default)]
    pub pos1: Option<i64>,
    #[serde(default)]
    pub pos2: Option<i64>,
    #[serde(default)]
    pub dwell_time: Option<i64>,
    #[serde(default)]
    pub route_ids: Vec<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(flatten, default)]
    pub extra: HashMap<String, Value>,
}

/// A station: a named bounding box grouping nearby platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationRecord {
    pub entity_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<i32>,
    #[serde(default)]
    pub transport_mode: Option<String>,
    pub x_min: i32,
    pub x_max: i32,
    pub z_min: i32,
    pub z_max: i32,
    #[serde(default)]
    pub zone: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(flatten, default)]
    pub extra: HashMap<String, Value>,
}

impl StationRecord {
    /// Whether a 2D point falls inside the station bounds (inclusive).
    pub fn contains(&self, x: f64, z: f64) -> bool {
        x >= self.x_min as f64
            && x <= self.x_max as f64
            && z >= self.z_min as f64
            && z <= self.z_max as f64
    }

    /// Center of the station bounding box.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.x_min as f64 + self.x_max as f64) / 2.0,
            (self.z_min as f64 + self.z_max as f64) / 2.0,
        )
    }
}

/// Horizontal curve descriptor for one direction of travel along an edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveRecord {
    pub h: f64,
    pub k: f64,
    pub r: f64,
    pub t_start: f64,
    pub t_end: f64,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub is_straight: bool,
}

/// One outgoing connection of a rail segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailConnectionRecord {
    #[serde(default)]
    pub target_node_pos: Option<i64>,
    #[serde(default)]
    pub rail_type: Option<String>,
    #[serde(default)]
    pub transport_mode: Option<String>,
    #[serde(default)]
    pub is_secondary_dir: bool,
    #[serde(default)]
    pub primary: Option<CurveRecord>,
    #[serde(default)]
    pub secondary: Option<CurveRecord>,
    #[serde(default)]
    pub y_start: f64,
    #[serde(default)]
    pub y_end: f64,
    #[serde(default)]
    pub vertical_curve_radius: Option<f64>,
}

/// A rail segment record: one node plus its outgoing connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailRecord {
    pub entity_id: i64,
    #[serde(default)]
    pub node_pos: Option<i64>,
    #[serde(default)]
    pub connections: Vec<RailConnectionRecord>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(flatten, default)]
    pub extra: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_key_display() {
        let key = ScopeKey::new("sv1", "mtr", "overworld");
        assert_eq!(key.to_string(), "sv1/mtr/overworld");
    }

    #[test]
    fn platform_record_tolerates_unknown_fields() {
        let json = r#"{
            "entity_id": 7,
            "name": "Central 1",
            "pos1": 42,
            "someFutureField": {"nested": true}
        }"#;
        let record: PlatformRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.entity_id, 7);
        assert_eq!(record.pos1, Some(42));
        assert!(record.route_ids.is_empty());
        assert!(record.extra.contains_key("someFutureField"));
    }

    #[test]
    fn station_bounds_containment() {
        let station = StationRecord {
            entity_id: 1,
            name: Some("Mid".into()),
            color: None,
            transport_mode: None,
            x_min: -10,
            x_max: 10,
            z_min: 0,
            z_max: 20,
            zone: None,
            updated_at: None,
            extra: HashMap::new(),
        };
        assert!(station.contains(0.0, 10.0));
        assert!(station.contains(-10.0, 0.0));
        assert!(!station.contains(11.0, 10.0));
        assert_eq!(station.center(), (0.0, 10.0));
    }
}
