//! Per-route geometry assembly.
//!
//! Resolves a route's ordered platform list against the scope dataset and
//! produces renderable 2D paths, a bounding box, stop markers, and the raw
//! 3D path. Geometry selection walks an explicit fallback chain: rail-graph
//! paths when the finder succeeds, platform centers when it does not, and
//! station-bounds centers as the last resort.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blockpos::BlockPos;
use crate::error::{Error, Result};
use crate::finder::{PlatformNode, RouteFinder};
use crate::graph::RailGraph;
use crate::records::{PlatformRecord, RouteRecord, StationRecord};
use crate::snap::NodeLocator;
use crate::source::ScopeDataset;

/// Where a route's rendered geometry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeometrySource {
    Rails,
    PlatformCenters,
    StationBounds,
}

/// A 2D map point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub z: f64,
}

impl Point2D {
    pub fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }
}

impl From<&BlockPos> for Point2D {
    fn from(pos: &BlockPos) -> Self {
        let (x, z) = pos.horizontal();
        Self { x, z }
    }
}

/// Axis-aligned bounding box over map points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_z: f64,
}

impl BoundingBox {
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_z: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_z: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_z > self.max_z
    }

    pub fn expand(&mut self, point: &Point2D) {
        self.min_x = self.min_x.min(point.x);
        self.min_z = self.min_z.min(point.z);
        self.max_x = self.max_x.max(point.x);
        self.max_z = self.max_z.max(point.z);
    }

    pub fn merge(&mut self, other: &BoundingBox) {
        if other.is_empty() {
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.min_z = self.min_z.min(other.min_z);
        self.max_x = self.max_x.max(other.max_x);
        self.max_z = self.max_z.max(other.max_z);
    }

    pub fn center(&self) -> Point2D {
        Point2D::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_z + self.max_z) / 2.0,
        )
    }

    pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a Vec<Point2D>>) -> Self {
        let mut bounds = Self::empty();
        for path in paths {
            for point in path {
                bounds.expand(point);
            }
        }
        bounds
    }
}

/// A rendered stop marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopMarker {
    pub station_id: Option<i64>,
    pub x: f64,
    pub z: f64,
    pub label: String,
}

/// One traversed graph edge of the primary 3D path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PathEdge {
    pub from: i64,
    pub to: i64,
}

/// Computed geometry for one route within one scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteGeometry {
    pub route_id: i64,
    pub source: GeometrySource,
    /// One 2D point path per rendered variant; index 0 is the primary.
    pub paths: Vec<Vec<Point2D>>,
    pub bounds: BoundingBox,
    pub stops: Vec<StopMarker>,
    /// Raw 3D nodes of the primary path (rails source only).
    pub path_nodes: Vec<BlockPos>,
    pub path_edges: Vec<PathEdge>,
}

/// Lookup tables derived once per scope dataset.
pub struct ScopeContext<'a> {
    pub platform_map: HashMap<i64, &'a PlatformRecord>,
    pub station_map: HashMap<i64, &'a StationRecord>,
    pub routes_by_id: HashMap<i64, &'a RouteRecord>,
    /// Platform id -> owning route ids, preferring the platform's own
    /// `route_ids` and falling back to inverting route `platform_ids`.
    pub platform_route_ids: HashMap<i64, Vec<i64>>,
}

impl<'a> ScopeContext<'a> {
    pub fn new(dataset: &'a ScopeDataset) -> Self {
        let platform_map: HashMap<i64, &PlatformRecord> = dataset
            .platforms
            .iter()
            .map(|p| (p.entity_id, p))
            .collect();
        let station_map: HashMap<i64, &StationRecord> = dataset
            .stations
            .iter()
            .map(|s| (s.entity_id, s))
            .collect();
        let routes_by_id: HashMap<i64, &RouteRecord> =
            dataset.routes.iter().map(|r| (r.entity_id, r)).collect();

        let mut inverted: HashMap<i64, Vec<i64>> = HashMap::new();
        for route in &dataset.routes {
            for platform_id in &route.platform_ids {
                inverted.entry(*platform_id).or_default().push(route.entity_id);
            }
        }

        let mut platform_route_ids = HashMap::new();
        for platform in &dataset.platforms {
            let owned = if platform.route_ids.is_empty() {
                inverted.remove(&platform.entity_id).unwrap_or_default()
            } else {
                platform.route_ids.clone()
            };
            platform_route_ids.insert(platform.entity_id, owned);
        }
        // Platforms referenced by routes but absent from the platform
        // collection still get an inverted entry.
        for (platform_id, routes) in inverted {
            platform_route_ids.entry(platform_id).or_insert(routes);
        }

        Self {
            platform_map,
            station_map,
            routes_by_id,
            platform_route_ids,
        }
    }

    /// Station a platform belongs to: explicit reference first, then
    /// bounding-box containment of the platform center.
    pub fn platform_station(&self, platform: &PlatformRecord) -> Option<&'a StationRecord> {
        if let Some(id) = platform.station_id {
            if let Some(station) = self.station_map.get(&id) {
                return Some(station);
            }
        }
        let center = platform_center(platform)?;
        self.station_map
            .values()
            .find(|s| s.contains(center.x, center.z))
            .copied()
    }
}

/// Center of a platform's boundary positions on the map plane.
pub fn platform_center(platform: &PlatformRecord) -> Option<Point2D> {
    match (platform.pos1, platform.pos2) {
        (Some(a), Some(b)) => {
            let a = BlockPos::unpack(a);
            let b = BlockPos::unpack(b);
            Some(Point2D::new(
                (a.x as f64 + b.x as f64) / 2.0,
                (a.z as f64 + b.z as f64) / 2.0,
            ))
        }
        (Some(only), None) | (None, Some(only)) => Some(Point2D::from(&BlockPos::unpack(only))),
        (None, None) => None,
    }
}

/// Snap a platform's boundary positions to graph nodes.
pub fn platform_boundary_nodes(
    platform: &PlatformRecord,
    locator: &NodeLocator,
) -> Option<PlatformNode> {
    let snapped: Vec<i64> = [platform.pos1, platform.pos2]
        .into_iter()
        .flatten()
        .filter_map(|packed| locator.snap(BlockPos::unpack(packed)))
        .collect();
    match snapped.as_slice() {
        [] => None,
        [first] => Some(PlatformNode::new(platform.entity_id, *first, None)),
        [first, second, ..] => Some(PlatformNode::new(platform.entity_id, *first, Some(*second))),
    }
}

/// Routes rendered as parallel alternates of `route`: identical platform-id
/// sets, or >= 2 shared associated stations with equal station-set sizes.
pub fn alternate_route_ids(ctx: &ScopeContext<'_>, route: &RouteRecord) -> Vec<i64> {
    let my_platforms: BTreeSet<i64> = route.platform_ids.iter().copied().collect();
    let my_stations = associated_stations(ctx, route);

    let mut ids: Vec<i64> = ctx
        .routes_by_id
        .values()
        .filter(|other| other.entity_id != route.entity_id)
        .filter(|other| {
            let other_platforms: BTreeSet<i64> = other.platform_ids.iter().copied().collect();
            if !other_platforms.is_empty() && other_platforms == my_platforms {
                return true;
            }
            let other_stations = associated_stations(ctx, other);
            other_stations.len() == my_stations.len()
                && my_stations.intersection(&other_stations).count() >= 2
        })
        .map(|other| other.entity_id)
        .collect();
    ids.sort_unstable();
    ids
}

fn associated_stations(ctx: &ScopeContext<'_>, route: &RouteRecord) -> BTreeSet<i64> {
    route
        .platform_ids
        .iter()
        .filter_map(|pid| ctx.platform_map.get(pid))
        .filter_map(|platform| ctx.platform_station(platform))
        .map(|station| station.entity_id)
        .collect()
}

/// Build the full geometry for one route.
///
/// `finder` (with its graph and locator) enables the rails source; variants
/// are geometrized with the same finder so their edge densities compound.
pub fn build_route_geometry(
    ctx: &ScopeContext<'_>,
    route: &RouteRecord,
    graph: Option<&RailGraph>,
    locator: Option<&NodeLocator>,
    mut finder: Option<&mut RouteFinder<'_>>,
    include_variants: bool,
) -> Result<RouteGeometry> {
    let platforms = resolve_platforms(ctx, route);
    if platforms.is_empty() {
        return Err(Error::NoUsablePlatforms {
            route_id: route.entity_id,
        });
    }

    let primary = geometrize_platforms(ctx, &platforms, graph, locator, finder.as_deref_mut())
        .ok_or(Error::NoUsablePlatforms {
            route_id: route.entity_id,
        })?;

    let mut paths = vec![primary.path];

    if include_variants {
        for alt_id in alternate_route_ids(ctx, route) {
            let Some(alt_route) = ctx.routes_by_id.get(&alt_id) else {
                continue;
            };
            let alt_platforms = resolve_platforms(ctx, alt_route);
            if alt_platforms.is_empty() {
                continue;
            }
            match geometrize_platforms(ctx, &alt_platforms, graph, locator, finder.as_deref_mut())
            {
                Some(alt) => paths.push(alt.path),
                None => debug!(route_id = alt_id, "skipping variant without geometry"),
            }
        }
    }

    let bounds = BoundingBox::from_paths(&paths);
    let stops = build_stops(ctx, &platforms);

    Ok(RouteGeometry {
        route_id: route.entity_id,
        source: primary.source,
        paths,
        bounds,
        stops,
        path_nodes: primary.path_nodes,
        path_edges: primary.path_edges,
    })
}

fn resolve_platforms<'a>(
    ctx: &ScopeContext<'a>,
    route: &RouteRecord,
) -> Vec<&'a PlatformRecord> {
    route
        .platform_ids
        .iter()
        .filter_map(|id| ctx.platform_map.get(id).copied())
        .collect()
}

struct GeometrizedPath {
    source: GeometrySource,
    path: Vec<Point2D>,
    path_nodes: Vec<BlockPos>,
    path_edges: Vec<PathEdge>,
}

fn geometrize_platforms(
    ctx: &ScopeContext<'_>,
    platforms: &[&PlatformRecord],
    graph: Option<&RailGraph>,
    locator: Option<&NodeLocator>,
    finder: Option<&mut RouteFinder<'_>>,
) -> Option<GeometrizedPath> {
    if let (Some(_), Some(locator), Some(finder)) = (graph, locator, finder) {
        if let Some(result) = rails_geometry(locator, finder, platforms) {
            return Some(result);
        }
    }

    if let Some(path) = centers_path(platforms) {
        return Some(GeometrizedPath {
            source: GeometrySource::PlatformCenters,
            path,
            path_nodes: Vec::new(),
            path_edges: Vec::new(),
        });
    }

    let path = station_bounds_path(ctx, platforms)?;
    Some(GeometrizedPath {
        source: GeometrySource::StationBounds,
        path,
        path_nodes: Vec::new(),
        path_edges: Vec::new(),
    })
}

/// Rail-graph geometry for an ordered platform sequence.
///
/// Each consecutive pair is routed through the graph and the literal
/// platform centers are spliced into the rendered polyline, so every stop
/// marker lies on a drawable edge even where rails stop short of the
/// platform marker. Any unroutable pair aborts the rails attempt.
fn rails_geometry(
    locator: &NodeLocator,
    finder: &mut RouteFinder<'_>,
    platforms: &[&PlatformRecord],
) -> Option<GeometrizedPath> {
    let nodes: Vec<PlatformNode> = platforms
        .iter()
        .map(|p| platform_boundary_nodes(p, locator))
        .collect::<Option<Vec<_>>>()?;

    let mut path: Vec<Point2D> = Vec::new();
    let mut path_nodes: Vec<BlockPos> = Vec::new();
    let mut path_edges: Vec<PathEdge> = Vec::new();

    if nodes.len() == 1 {
        let result = finder.find_route(&nodes)?;
        for point in &result.points {
            push_point(&mut path, Point2D::from(point));
        }
        path_nodes = result.points;
        if let Some(center) = platform_center(platforms[0]) {
            push_point(&mut path, center);
        }
        return Some(GeometrizedPath {
            source: GeometrySource::Rails,
            path,
            path_nodes,
            path_edges,
        });
    }

    for (i, pair) in nodes.windows(2).enumerate() {
        let leg = finder.find_path_between(&pair[0].nodes, &pair[1].nodes)?;
        finder.record_traversal(&leg);

        if let Some(center) = platform_center(platforms[i]) {
            push_point(&mut path, center);
        }
        for point in &leg.points {
            push_point(&mut path, Point2D::from(point));
        }
        if path_nodes.last() == leg.points.first() {
            path_nodes.extend(leg.points.iter().skip(1).copied());
        } else {
            path_nodes.extend(leg.points.iter().copied());
        }
        path_edges.extend(leg.segments.iter().map(|s| PathEdge {
            from: s.start,
            to: s.end,
        }));
    }
    if let Some(center) = platform_center(platforms[platforms.len() - 1]) {
        push_point(&mut path, center);
    }

    Some(GeometrizedPath {
        source: GeometrySource::Rails,
        path,
        path_nodes,
        path_edges,
    })
}

fn centers_path(platforms: &[&PlatformRecord]) -> Option<Vec<Point2D>> {
    let mut path = Vec::new();
    for platform in platforms {
        if let Some(center) = platform_center(platform) {
            push_point(&mut path, center);
        }
    }
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

fn station_bounds_path(
    ctx: &ScopeContext<'_>,
    platforms: &[&PlatformRecord],
) -> Option<Vec<Point2D>> {
    let mut path = Vec::new();
    for platform in platforms {
        let Some(station_id) = platform.station_id else {
            continue;
        };
        if let Some(station) = ctx.station_map.get(&station_id) {
            let (x, z) = station.center();
            push_point(&mut path, Point2D::new(x, z));
        }
    }
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

fn push_point(path: &mut Vec<Point2D>, point: Point2D) {
    if path.last() != Some(&point) {
        path.push(point);
    }
}

/// One stop marker per platform in route order. Station association uses
/// the point-in-bounds test first, then the nearest station by center
/// distance.
fn build_stops(ctx: &ScopeContext<'_>, platforms: &[&PlatformRecord]) -> Vec<StopMarker> {
    platforms
        .iter()
        .filter_map(|platform| {
            let center = platform_center(platform)?;
            let station = ctx
                .station_map
                .values()
                .find(|s| s.contains(center.x, center.z))
                .copied()
                .or_else(|| nearest_station(ctx, &center));
            let label = station
                .and_then(|s| s.name.clone())
                .or_else(|| platform.name.clone())
                .unwrap_or_default();
            Some(StopMarker {
                station_id: station.map(|s| s.entity_id),
                x: center.x,
                z: center.z,
                label,
            })
        })
        .collect()
}

fn nearest_station<'a>(ctx: &ScopeContext<'a>, point: &Point2D) -> Option<&'a StationRecord> {
    ctx.station_map
        .values()
        .map(|station| {
            let (x, z) = station.center();
            (station, point.distance_to(&Point2D::new(x, z)))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(station, _)| *station)
}
