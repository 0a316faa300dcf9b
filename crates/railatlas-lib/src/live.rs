//! On-demand detail resolution.
//!
//! Serves single-route, single-station, and depot queries without touching
//! the snapshot store, for callers that need fresh results outside the batch
//! cycle. Uses the same graph build, snapping, and edge-cost rules as the
//! compiler so live answers stay visually consistent with batch snapshots.

use serde::Serialize;
use tracing::debug;

use crate::blockpos::{BlockPos, NodeId};
use crate::bundles::{build_station_route_map, StationRouteMap, DEFAULT_MAX_MERGE_DISTANCE};
use crate::error::{Error, Result};
use crate::finder::RouteFinder;
use crate::geometry::{
    build_route_geometry, platform_boundary_nodes, Point2D, RouteGeometry, ScopeContext,
};
use crate::graph::RailGraph;
use crate::records::ScopeKey;
use crate::snap::NodeLocator;
use crate::source::ScopeDataSource;

/// Variant paths from a depot position to the scope's platforms.
#[derive(Debug, Clone, Serialize)]
pub struct DepotDetail {
    pub position: BlockPos,
    /// Graph node the depot position snapped to.
    pub node: NodeId,
    pub paths: Vec<Vec<Point2D>>,
}

/// Resolver bound to one data source; every call loads the scope fresh.
pub struct LiveResolver<D> {
    source: D,
    max_merge_distance: f64,
}

impl<D: ScopeDataSource> LiveResolver<D> {
    pub fn new(source: D) -> Self {
        Self {
            source,
            max_merge_distance: DEFAULT_MAX_MERGE_DISTANCE,
        }
    }

    pub fn with_merge_distance(mut self, distance: f64) -> Self {
        self.max_merge_distance = distance;
        self
    }

    /// Fresh geometry for one route, variants included.
    pub fn route_detail(&self, scope: &ScopeKey, route_id: i64) -> Result<RouteGeometry> {
        let dataset = self.source.load(scope)?;
        let ctx = ScopeContext::new(&dataset);
        let route = *ctx
            .routes_by_id
            .get(&route_id)
            .ok_or_else(|| Error::RouteNotFound {
                scope: scope.to_string(),
                route_id,
            })?;

        let graph = RailGraph::build(&dataset.rails);
        let locator = graph.as_ref().map(NodeLocator::build);
        let mut finder = graph.as_ref().map(RouteFinder::new);

        match (&graph, &locator, finder.as_mut()) {
            (Some(graph), Some(locator), Some(finder)) => build_route_geometry(
                &ctx,
                route,
                Some(graph),
                Some(locator),
                Some(finder),
                true,
            ),
            _ => build_route_geometry(&ctx, route, None, None, None, true),
        }
    }

    /// Fresh route map for one station.
    ///
    /// Geometrizes every route of the scope in dataset order, exactly as the
    /// batch pass does, so shared-corridor densities match the snapshots.
    pub fn station_detail(&self, scope: &ScopeKey, station_id: i64) -> Result<StationRouteMap> {
        let dataset = self.source.load(scope)?;
        let ctx = ScopeContext::new(&dataset);
        let station = *ctx
            .station_map
            .get(&station_id)
            .ok_or_else(|| Error::StationNotFound {
                scope: scope.to_string(),
                station_id,
            })?;

        let graph = RailGraph::build(&dataset.rails);
        let locator = graph.as_ref().map(NodeLocator::build);
        let mut finder = graph.as_ref().map(RouteFinder::new);

        let mut geometries = std::collections::HashMap::new();
        for route in &dataset.routes {
            let result = match (&graph, &locator, finder.as_mut()) {
                (Some(graph), Some(locator), Some(finder)) => build_route_geometry(
                    &ctx,
                    route,
                    Some(graph),
                    Some(locator),
                    Some(finder),
                    true,
                ),
                _ => build_route_geometry(&ctx, route, None, None, None, true),
            };
            match result {
                Ok(geometry) => {
                    geometries.insert(route.entity_id, geometry);
                }
                Err(err) => {
                    debug!(route_id = route.entity_id, error = %err, "route skipped in live map");
                }
            }
        }

        Ok(build_station_route_map(
            &ctx,
            station,
            &geometries,
            self.max_merge_distance,
        ))
    }

    /// Snap a packed depot position to the graph and trace one path from it
    /// to each reachable platform boundary node in the scope.
    pub fn depot_detail(&self, scope: &ScopeKey, packed_pos: i64) -> Result<DepotDetail> {
        let dataset = self.source.load(scope)?;
        let graph = RailGraph::build(&dataset.rails).ok_or_else(|| Error::GraphUnavailable {
            scope: scope.to_string(),
        })?;
        let locator = NodeLocator::build(&graph);

        let position = BlockPos::unpack(packed_pos);
        let node = locator.snap(position).ok_or(Error::SnapFailed {
            x: position.x,
            y: position.y,
            z: position.z,
        })?;

        let targets: Vec<NodeId> = dataset
            .platforms
            .iter()
            .filter_map(|platform| platform_boundary_nodes(platform, &locator))
            .flat_map(|platform_node| platform_node.nodes)
            .collect();

        let mut finder = RouteFinder::new(&graph);
        let paths = finder
            .find_route_variants(&[node], &targets)
            .into_iter()
            .map(|path| path.points.iter().map(Point2D::from).collect())
            .collect();

        Ok(DepotDetail {
            position,
            node,
            paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometrySource;
    use crate::source::{MemoryDataSource, ScopeDataset};
    use crate::test_helpers::{chain_rails, station, PlatformRecordBuilder, RouteRecordBuilder};

    fn scope() -> ScopeKey {
        ScopeKey::new("sv", "mtr", "overworld")
    }

    fn dataset() -> ScopeDataset {
        let a = BlockPos::new(0, 0, 0);
        let b = BlockPos::new(0, 0, 50);
        let c = BlockPos::new(0, 0, 100);
        ScopeDataset {
            routes: vec![RouteRecordBuilder::new(100)
                .name("Loop Line||Out|1")
                .platforms(&[1, 2])
                .build()],
            platforms: vec![
                PlatformRecordBuilder::new(1).at(a, a).station(10).build(),
                PlatformRecordBuilder::new(2).at(c, c).station(11).build(),
            ],
            stations: vec![
                station(10, "Origin", (-5, 5, -5, 5)),
                station(11, "Terminus", (-5, 5, 95, 105)),
            ],
            rails: chain_rails(&[a, b, c]),
        }
    }

    fn resolver() -> LiveResolver<MemoryDataSource> {
        LiveResolver::new(MemoryDataSource::new().with_scope(scope(), dataset()))
    }

    #[test]
    fn route_detail_matches_batch_semantics() {
        let detail = resolver().route_detail(&scope(), 100).unwrap();
        assert_eq!(detail.source, GeometrySource::Rails);
        assert_eq!(detail.path_nodes.len(), 3);
        assert_eq!(detail.stops.len(), 2);
    }

    #[test]
    fn unknown_route_is_not_found() {
        let err = resolver().route_detail(&scope(), 999).unwrap_err();
        assert!(matches!(err, Error::RouteNotFound { route_id: 999, .. }));
    }

    #[test]
    fn unknown_scope_propagates() {
        let err = resolver()
            .route_detail(&ScopeKey::new("x", "y", "z"), 100)
            .unwrap_err();
        assert!(matches!(err, Error::ScopeNotFound { .. }));
    }

    #[test]
    fn station_detail_builds_a_route_map() {
        let map = resolver().station_detail(&scope(), 10).unwrap();
        assert_eq!(map.station_id, 10);
        assert_eq!(map.groups.len(), 1);
        assert_eq!(map.groups[0].route_ids, vec![100]);
    }

    #[test]
    fn unknown_station_is_not_found() {
        let err = resolver().station_detail(&scope(), 999).unwrap_err();
        assert!(matches!(err, Error::StationNotFound { station_id: 999, .. }));
    }

    #[test]
    fn depot_detail_snaps_and_traces_variants() {
        // Two blocks off the first rail node: inside the snap radius.
        let depot = BlockPos::new(2, 0, 0).pack();
        let detail = resolver().depot_detail(&scope(), depot).unwrap();

        assert_eq!(detail.node, BlockPos::new(0, 0, 0).pack());
        assert_eq!(detail.paths.len(), 1);
        assert!(!detail.paths[0].is_empty());
    }

    #[test]
    fn depot_without_graph_is_unavailable() {
        let mut data = dataset();
        data.rails.clear();
        let resolver = LiveResolver::new(MemoryDataSource::new().with_scope(scope(), data));

        let err = resolver
            .depot_detail(&scope(), BlockPos::new(0, 0, 0).pack())
            .unwrap_err();
        assert!(matches!(err, Error::GraphUnavailable { .. }));
    }

    #[test]
    fn depot_far_from_rails_fails_to_snap() {
        let err = resolver()
            .depot_detail(&scope(), BlockPos::new(900, 0, 900).pack())
            .unwrap_err();
        assert!(matches!(err, Error::SnapFailed { .. }));
    }
}
