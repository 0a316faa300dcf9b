// Test-only helpers for `railatlas-lib` tests
#![allow(dead_code)]

use std::collections::HashMap;

use crate::blockpos::BlockPos;
use crate::records::{
    PlatformRecord, RailConnectionRecord, RailRecord, RouteRecord, StationRecord,
};

/// A bare rail record at `pos` with no connections.
pub fn rail(entity_id: i64, pos: BlockPos) -> RailRecord {
    RailRecord {
        entity_id,
        node_pos: Some(pos.pack()),
        connections: Vec::new(),
        updated_at: None,
        extra: HashMap::new(),
    }
}

/// A straight, penalty-free connection record toward `target`.
pub fn straight_connection(target: BlockPos) -> RailConnectionRecord {
    RailConnectionRecord {
        target_node_pos: Some(target.pack()),
        rail_type: Some("iron".to_string()),
        transport_mode: Some("train".to_string()),
        is_secondary_dir: false,
        primary: None,
        secondary: None,
        y_start: target.y as f64,
        y_end: target.y as f64,
        vertical_curve_radius: None,
    }
}

/// Rail records forming a chain along `positions`, linking consecutive nodes.
pub fn chain_rails(positions: &[BlockPos]) -> Vec<RailRecord> {
    positions
        .iter()
        .enumerate()
        .map(|(i, pos)| {
            let mut record = rail(i as i64 + 1, *pos);
            if let Some(next) = positions.get(i + 1) {
                record.connections.push(straight_connection(*next));
            }
            record
        })
        .collect()
}

/// Rail records for an arbitrary set of undirected links.
pub fn linked_rails(links: &[(BlockPos, BlockPos)]) -> Vec<RailRecord> {
    let mut by_node: HashMap<i64, RailRecord> = HashMap::new();
    for (i, (from, to)) in links.iter().enumerate() {
        by_node
            .entry(from.pack())
            .or_insert_with(|| rail(i as i64 + 1, *from))
            .connections
            .push(straight_connection(*to));
        by_node
            .entry(to.pack())
            .or_insert_with(|| rail(links.len() as i64 + i as i64 + 1, *to));
    }
    by_node.into_values().collect()
}

/// Builder for route records in tests.
pub struct RouteRecordBuilder {
    record: RouteRecord,
}

impl RouteRecordBuilder {
    #[must_use]
    pub fn new(entity_id: i64) -> Self {
        Self {
            record: RouteRecord {
                entity_id,
                name: Some(format!("Route {entity_id}")),
                color: Some(0xE4002B),
                transport_mode: Some("train".to_string()),
                platform_ids: Vec::new(),
                custom_destinations: Vec::new(),
                route_type: None,
                circular_state: None,
                light_rail_route_number: None,
                updated_at: Some(1_000),
                extra: HashMap::new(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.record.name = Some(name.to_string());
        self
    }

    pub fn platforms(mut self, ids: &[i64]) -> Self {
        self.record.platform_ids = ids.to_vec();
        self
    }

    pub fn updated_at(mut self, ts: i64) -> Self {
        self.record.updated_at = Some(ts);
        self
    }

    pub fn build(self) -> RouteRecord {
        self.record
    }
}

/// Builder for platform records in tests.
pub struct PlatformRecordBuilder {
    record: PlatformRecord,
}

impl PlatformRecordBuilder {
    #[must_use]
    pub fn new(entity_id: i64) -> Self {
        Self {
            record: PlatformRecord {
                entity_id,
                name: Some(format!("Platform {entity_id}")),
                color: None,
                transport_mode: Some("train".to_string()),
                station_id: None,
                pos1: None,
                pos2: None,
                dwell_time: None,
                route_ids: Vec::new(),
                updated_at: Some(1_000),
                extra: HashMap::new(),
            },
        }
    }

    pub fn at(mut self, pos1: BlockPos, pos2: BlockPos) -> Self {
        self.record.pos1 = Some(pos1.pack());
        self.record.pos2 = Some(pos2.pack());
        self
    }

    pub fn station(mut self, station_id: i64) -> Self {
        self.record.station_id = Some(station_id);
        self
    }

    pub fn routes(mut self, ids: &[i64]) -> Self {
        self.record.route_ids = ids.to_vec();
        self
    }

    pub fn build(self) -> PlatformRecord {
        self.record
    }
}

/// A station covering the given bounds.
pub fn station(entity_id: i64, name: &str, bounds: (i32, i32, i32, i32)) -> StationRecord {
    let (x_min, x_max, z_min, z_max) = bounds;
    StationRecord {
        entity_id,
        name: Some(name.to_string()),
        color: None,
        transport_mode: Some("train".to_string()),
        x_min,
        x_max,
        z_min,
        z_max,
        zone: None,
        updated_at: Some(1_000),
        extra: HashMap::new(),
    }
}
