//! Station route-map bundles.
//!
//! A station's route map groups its routes by line-name prefix and merges
//! variants of the same line into display buckets, so parallel-track
//! duplicates render as one bundle while geographically distant routes that
//! happen to share a line name stay apart.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{BoundingBox, Point2D, RouteGeometry, ScopeContext, StopMarker};
use crate::records::StationRecord;

/// Two routes sharing a group key merge into one bucket only when their
/// bounding-box centers are at most this many map units apart.
pub const DEFAULT_MAX_MERGE_DISTANCE: f64 = 1500.0;

/// One display bundle of merged route variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteGroup {
    /// Group key, suffixed `#2`, `#3`, ... for extra buckets of one line.
    pub key: String,
    pub label: String,
    pub color: Option<i32>,
    pub route_ids: Vec<i64>,
    pub paths: Vec<Vec<Point2D>>,
    pub stops: Vec<StopMarker>,
}

/// A station's complete route map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationRouteMap {
    pub station_id: i64,
    pub groups: Vec<RouteGroup>,
}

/// Line-name prefix of a route name: the text before the first `||`, then
/// before the first `|`. Empty results mean the route has no usable key and
/// is skipped.
pub fn group_key(name: &str) -> Option<String> {
    let before_variant = name.split("||").next().unwrap_or(name);
    let key = before_variant.split('|').next().unwrap_or(before_variant);
    let key = key.trim();
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

struct Bucket {
    base_key: String,
    bounds: BoundingBox,
    group: RouteGroup,
    seen_stops: HashSet<StopIdentity>,
}

#[derive(PartialEq, Eq, Hash)]
enum StopIdentity {
    Station(i64),
    Position(u64, u64, String),
}

impl StopIdentity {
    fn of(stop: &StopMarker) -> Self {
        match stop.station_id {
            Some(id) => Self::Station(id),
            None => Self::Position(stop.x.to_bits(), stop.z.to_bits(), stop.label.clone()),
        }
    }
}

impl Bucket {
    fn new(base_key: String, key: String) -> Self {
        Self {
            group: RouteGroup {
                key,
                label: base_key.clone(),
                color: None,
                route_ids: Vec::new(),
                paths: Vec::new(),
                stops: Vec::new(),
            },
            base_key,
            bounds: BoundingBox::empty(),
            seen_stops: HashSet::new(),
        }
    }

    fn accepts(&self, base_key: &str, bounds: &BoundingBox, max_merge_distance: f64) -> bool {
        if self.base_key != base_key {
            return false;
        }
        if self.bounds.is_empty() || bounds.is_empty() {
            return true;
        }
        self.bounds.center().distance_to(&bounds.center()) <= max_merge_distance
    }

    fn absorb(&mut self, route_id: i64, color: Option<i32>, geometry: &RouteGeometry) {
        self.group.route_ids.push(route_id);
        if self.group.color.is_none() {
            self.group.color = color;
        }
        self.group.paths.extend(geometry.paths.iter().cloned());
        self.bounds.merge(&geometry.bounds);
        for stop in &geometry.stops {
            if self.seen_stops.insert(StopIdentity::of(stop)) {
                self.group.stops.push(stop.clone());
            }
        }
    }
}

/// Build the route map for one station from already-computed route
/// geometries. Routes without a computed geometry or a usable name are
/// skipped.
pub fn build_station_route_map(
    ctx: &ScopeContext<'_>,
    station: &StationRecord,
    geometries: &std::collections::HashMap<i64, RouteGeometry>,
    max_merge_distance: f64,
) -> StationRouteMap {
    // Platforms belonging to the station, by explicit reference or bounds.
    let mut route_ids: BTreeSet<i64> = BTreeSet::new();
    for platform in ctx.platform_map.values() {
        let belongs = match ctx.platform_station(platform) {
            Some(owner) => owner.entity_id == station.entity_id,
            None => false,
        };
        if belongs {
            if let Some(ids) = ctx.platform_route_ids.get(&platform.entity_id) {
                route_ids.extend(ids.iter().copied());
            }
        }
    }

    let mut buckets: Vec<Bucket> = Vec::new();
    for route_id in route_ids {
        let Some(route) = ctx.routes_by_id.get(&route_id) else {
            continue;
        };
        let Some(base_key) = route.name.as_deref().and_then(group_key) else {
            debug!(route_id, "route without usable name skipped from bundles");
            continue;
        };
        let Some(geometry) = geometries.get(&route_id) else {
            continue;
        };

        let index = buckets
            .iter()
            .position(|b| b.accepts(&base_key, &geometry.bounds, max_merge_distance))
            .unwrap_or_else(|| {
                let siblings = buckets.iter().filter(|b| b.base_key == base_key).count();
                let key = if siblings == 0 {
                    base_key.clone()
                } else {
                    format!("{base_key}#{}", siblings + 1)
                };
                buckets.push(Bucket::new(base_key.clone(), key));
                buckets.len() - 1
            });
        buckets[index].absorb(route_id, route.color, geometry);
    }

    StationRouteMap {
        station_id: station.entity_id,
        groups: buckets.into_iter().map(|b| b.group).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockpos::BlockPos;
    use crate::geometry::{build_route_geometry, GeometrySource};
    use crate::source::ScopeDataset;
    use crate::test_helpers::{station, PlatformRecordBuilder, RouteRecordBuilder};
    use std::collections::HashMap;

    #[test]
    fn group_key_strips_variant_delimiters() {
        assert_eq!(group_key("Loop Line||Outbound|1"), Some("Loop Line".into()));
        assert_eq!(group_key("Express|Red"), Some("Express".into()));
        assert_eq!(group_key("Plain"), Some("Plain".into()));
        assert_eq!(group_key("  "), None);
        assert_eq!(group_key("||Outbound"), None);
    }

    fn geometry_at(route_id: i64, x: f64) -> RouteGeometry {
        let path = vec![Point2D::new(x, 0.0), Point2D::new(x + 10.0, 0.0)];
        let bounds = BoundingBox::from_paths(&vec![path.clone()]);
        RouteGeometry {
            route_id,
            source: GeometrySource::PlatformCenters,
            paths: vec![path],
            bounds,
            stops: vec![StopMarker {
                station_id: Some(10),
                x,
                z: 0.0,
                label: "Origin".into(),
            }],
            path_nodes: Vec::new(),
            path_edges: Vec::new(),
        }
    }

    fn dataset_with_routes(names: &[(i64, &str)]) -> ScopeDataset {
        let origin = BlockPos::new(0, 0, 0);
        ScopeDataset {
            routes: names
                .iter()
                .map(|(id, name)| RouteRecordBuilder::new(*id).name(name).platforms(&[1]).build())
                .collect(),
            platforms: vec![PlatformRecordBuilder::new(1)
                .at(origin, origin)
                .station(10)
                .build()],
            stations: vec![station(10, "Origin", (-5, 5, -5, 5))],
            rails: Vec::new(),
        }
    }

    #[test]
    fn nearby_variants_merge_and_distant_ones_split() {
        let dataset = dataset_with_routes(&[
            (100, "Loop Line||Out|1"),
            (101, "Loop Line||In|1"),
            (102, "Loop Line||Far|1"),
        ]);
        let ctx = ScopeContext::new(&dataset);

        let mut geometries = HashMap::new();
        geometries.insert(100, geometry_at(100, 0.0));
        geometries.insert(101, geometry_at(101, 100.0));
        geometries.insert(102, geometry_at(102, 5000.0));

        let map = build_station_route_map(
            &ctx,
            &dataset.stations[0],
            &geometries,
            DEFAULT_MAX_MERGE_DISTANCE,
        );

        assert_eq!(map.groups.len(), 2);
        assert_eq!(map.groups[0].key, "Loop Line");
        assert_eq!(map.groups[0].route_ids, vec![100, 101]);
        assert_eq!(map.groups[1].key, "Loop Line#2");
        assert_eq!(map.groups[1].route_ids, vec![102]);
    }

    #[test]
    fn stops_deduplicate_across_merged_variants() {
        let dataset = dataset_with_routes(&[(100, "A||x|1"), (101, "A||y|1")]);
        let ctx = ScopeContext::new(&dataset);

        let mut geometries = HashMap::new();
        geometries.insert(100, geometry_at(100, 0.0));
        geometries.insert(101, geometry_at(101, 10.0));

        let map = build_station_route_map(
            &ctx,
            &dataset.stations[0],
            &geometries,
            DEFAULT_MAX_MERGE_DISTANCE,
        );

        assert_eq!(map.groups.len(), 1);
        // Both variants carry the same station stop; one marker survives.
        assert_eq!(map.groups[0].stops.len(), 1);
        assert_eq!(map.groups[0].paths.len(), 2);
    }

    #[test]
    fn nameless_routes_are_skipped() {
        let mut dataset = dataset_with_routes(&[(100, "A||x|1")]);
        let mut nameless = RouteRecordBuilder::new(101).platforms(&[1]).build();
        nameless.name = None;
        dataset.routes.push(nameless);
        let ctx = ScopeContext::new(&dataset);

        let mut geometries = HashMap::new();
        geometries.insert(100, geometry_at(100, 0.0));
        geometries.insert(101, geometry_at(101, 10.0));

        let map = build_station_route_map(
            &ctx,
            &dataset.stations[0],
            &geometries,
            DEFAULT_MAX_MERGE_DISTANCE,
        );
        assert_eq!(map.groups.len(), 1);
        assert_eq!(map.groups[0].route_ids, vec![100]);
    }

    #[test]
    fn bundles_use_real_geometry_pipeline() {
        let dataset = dataset_with_routes(&[(100, "A||x|1")]);
        let ctx = ScopeContext::new(&dataset);
        let route = ctx.routes_by_id[&100];
        let geometry = build_route_geometry(&ctx, route, None, None, None, false).unwrap();

        let mut geometries = HashMap::new();
        geometries.insert(100, geometry);

        let map = build_station_route_map(
            &ctx,
            &dataset.stations[0],
            &geometries,
            DEFAULT_MAX_MERGE_DISTANCE,
        );
        assert_eq!(map.groups.len(), 1);
        assert_eq!(map.groups[0].label, "A");
    }
}
