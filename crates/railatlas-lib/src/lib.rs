//! RailAtlas library entry points.
//!
//! This crate turns raw rail-network records into navigable graphs and
//! renderable geometry: a packed block-position codec, the rail graph
//! builder, a density-biased route finder, the per-scope snapshot compiler,
//! and the live detail resolver. Higher-level consumers (CLI, services)
//! should only depend on the types exported here instead of reimplementing
//! behavior.
//!

#![deny(warnings)]

pub mod blockpos;
pub mod bundles;
pub mod compiler;
pub mod error;
pub mod finder;
pub mod geometry;
pub mod graph;
pub mod live;
pub mod records;
pub mod snap;
pub mod source;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use blockpos::{BlockPos, NodeId};
pub use bundles::{build_station_route_map, RouteGroup, StationRouteMap};
pub use compiler::{CompileOutcome, CompilerConfig, SnapshotCompiler};
pub use error::{Error, Result};
pub use finder::{PathResult, PathSegment, PlatformNode, RouteFinder};
pub use geometry::{
    build_route_geometry, BoundingBox, GeometrySource, Point2D, RouteGeometry, ScopeContext,
    StopMarker,
};
pub use graph::{PreferredCurve, RailConnection, RailGraph};
pub use live::{DepotDetail, LiveResolver};
pub use records::{
    PlatformRecord, RailConnectionRecord, RailRecord, RouteRecord, ScopeKey, StationRecord,
};
pub use snap::NodeLocator;
pub use source::{JsonDataSource, MemoryDataSource, ScopeDataSource, ScopeDataset, ScopeStats};
pub use store::{
    ComputeScope, ComputeStatus, MemoryStore, RouteSnapshot, SnapshotStore, StationSnapshot,
};
