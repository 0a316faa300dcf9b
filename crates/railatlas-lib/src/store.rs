//! Snapshot persistence seam.
//!
//! The compiler writes three record kinds: per-route geometry snapshots,
//! per-station route maps, and one status record per compute scope.
//! Relational persistence lives behind the `SnapshotStore` trait; the
//! in-memory implementation backs the services, CLI, and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::bundles::StationRouteMap;
use crate::geometry::RouteGeometry;
use crate::records::ScopeKey;

/// Lifecycle state shared by scopes and individual snapshot items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComputeStatus {
    Running,
    Succeeded,
    Failed,
}

/// Status record for one compute scope. Created on first compute, updated
/// in place on every attempt, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeScope {
    pub key: ScopeKey,
    pub fingerprint: String,
    pub status: ComputeStatus,
    pub message: Option<String>,
    /// Epoch milliseconds of the last status transition.
    pub updated_at: i64,
}

/// Persisted geometry for one route within one scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSnapshot {
    pub scope: ScopeKey,
    pub route_id: i64,
    pub status: ComputeStatus,
    pub source_fingerprint: String,
    pub geometry: Option<RouteGeometry>,
    /// Epoch milliseconds of the computation that produced this snapshot.
    pub generated_at: i64,
    pub error_message: Option<String>,
}

/// Persisted route map for one station within one scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationSnapshot {
    pub scope: ScopeKey,
    pub station_id: i64,
    pub status: ComputeStatus,
    pub source_fingerprint: String,
    pub route_map: Option<StationRouteMap>,
    pub generated_at: i64,
    pub error_message: Option<String>,
}

/// Storage seam for compiled snapshots.
pub trait SnapshotStore: Send + Sync {
    fn scope_status(&self, scope: &ScopeKey) -> Option<ComputeScope>;
    fn put_scope_status(&self, status: ComputeScope);

    fn route_snapshot(&self, scope: &ScopeKey, route_id: i64) -> Option<RouteSnapshot>;
    fn put_route_snapshot(&self, snapshot: RouteSnapshot);
    fn route_snapshots(&self, scope: &ScopeKey) -> Vec<RouteSnapshot>;

    fn station_snapshot(&self, scope: &ScopeKey, station_id: i64) -> Option<StationSnapshot>;
    fn put_station_snapshot(&self, snapshot: StationSnapshot);
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for std::sync::Arc<T> {
    fn scope_status(&self, scope: &ScopeKey) -> Option<ComputeScope> {
        (**self).scope_status(scope)
    }

    fn put_scope_status(&self, status: ComputeScope) {
        (**self).put_scope_status(status)
    }

    fn route_snapshot(&self, scope: &ScopeKey, route_id: i64) -> Option<RouteSnapshot> {
        (**self).route_snapshot(scope, route_id)
    }

    fn put_route_snapshot(&self, snapshot: RouteSnapshot) {
        (**self).put_route_snapshot(snapshot)
    }

    fn route_snapshots(&self, scope: &ScopeKey) -> Vec<RouteSnapshot> {
        (**self).route_snapshots(scope)
    }

    fn station_snapshot(&self, scope: &ScopeKey, station_id: i64) -> Option<StationSnapshot> {
        (**self).station_snapshot(scope, station_id)
    }

    fn put_station_snapshot(&self, snapshot: StationSnapshot) {
        (**self).put_station_snapshot(snapshot)
    }
}

#[derive(Default)]
struct MemoryStoreInner {
    scopes: HashMap<ScopeKey, ComputeScope>,
    routes: HashMap<(ScopeKey, i64), RouteSnapshot>,
    stations: HashMap<(ScopeKey, i64), StationSnapshot>,
}

/// In-memory snapshot store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryStoreInner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryStoreInner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SnapshotStore for MemoryStore {
    fn scope_status(&self, scope: &ScopeKey) -> Option<ComputeScope> {
        self.read().scopes.get(scope).cloned()
    }

    fn put_scope_status(&self, status: ComputeScope) {
        self.write().scopes.insert(status.key.clone(), status);
    }

    fn route_snapshot(&self, scope: &ScopeKey, route_id: i64) -> Option<RouteSnapshot> {
        self.read().routes.get(&(scope.clone(), route_id)).cloned()
    }

    fn put_route_snapshot(&self, snapshot: RouteSnapshot) {
        self.write()
            .routes
            .insert((snapshot.scope.clone(), snapshot.route_id), snapshot);
    }

    fn route_snapshots(&self, scope: &ScopeKey) -> Vec<RouteSnapshot> {
        let mut snapshots: Vec<RouteSnapshot> = self
            .read()
            .routes
            .iter()
            .filter(|((key, _), _)| key == scope)
            .map(|(_, snapshot)| snapshot.clone())
            .collect();
        snapshots.sort_by_key(|s| s.route_id);
        snapshots
    }

    fn station_snapshot(&self, scope: &ScopeKey, station_id: i64) -> Option<StationSnapshot> {
        self.read()
            .stations
            .get(&(scope.clone(), station_id))
            .cloned()
    }

    fn put_station_snapshot(&self, snapshot: StationSnapshot) {
        self.write()
            .stations
            .insert((snapshot.scope.clone(), snapshot.station_id), snapshot);
    }
}
