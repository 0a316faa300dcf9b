//! Scope snapshot compilation.
//!
//! One compile pass per scope: fingerprint gate, dataset load, per-route
//! geometry, per-station route maps, final status. Item failures are
//! recorded on the item and do not abort the scope; a dataset-load failure
//! marks the whole scope failed. Fan-out within each phase is bounded and
//! each worker yields after an item so long scopes do not monopolize the
//! runtime. Concurrent compiles of the same scope are serialized by a
//! per-scope single-flight guard; the fingerprint check alone is optimistic
//! and would otherwise race.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::bundles::{build_station_route_map, DEFAULT_MAX_MERGE_DISTANCE};
use crate::error::Result;
use crate::finder::RouteFinder;
use crate::geometry::{build_route_geometry, RouteGeometry, ScopeContext};
use crate::graph::RailGraph;
use crate::records::ScopeKey;
use crate::snap::NodeLocator;
use crate::source::ScopeDataSource;
use crate::store::{
    ComputeScope, ComputeStatus, RouteSnapshot, SnapshotStore, StationSnapshot,
};

/// Tunables for one compiler instance.
#[derive(Debug, Clone, Copy)]
pub struct CompilerConfig {
    pub route_concurrency: usize,
    pub station_concurrency: usize,
    pub max_merge_distance: f64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            route_concurrency: 2,
            station_concurrency: 2,
            max_merge_distance: DEFAULT_MAX_MERGE_DISTANCE,
        }
    }
}

/// Result summary of one compile pass.
#[derive(Debug, Clone, Serialize)]
pub struct CompileOutcome {
    pub scope: ScopeKey,
    pub status: ComputeStatus,
    pub fingerprint: String,
    /// True when the fingerprint matched a succeeded run and nothing was
    /// recomputed.
    pub skipped: bool,
    pub routes_total: usize,
    pub routes_failed: usize,
    pub stations_total: usize,
    pub stations_failed: usize,
    pub message: Option<String>,
}

/// Batch compiler bound to one data source and one snapshot store.
pub struct SnapshotCompiler<D, S> {
    source: D,
    store: S,
    config: CompilerConfig,
    scope_locks: Mutex<HashMap<ScopeKey, Arc<Mutex<()>>>>,
}

impl<D: ScopeDataSource, S: SnapshotStore> SnapshotCompiler<D, S> {
    pub fn new(source: D, store: S, config: CompilerConfig) -> Self {
        Self {
            source,
            store,
            config,
            scope_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Compile one scope end to end.
    ///
    /// Returns `Err` only for unknown scopes; every other failure is
    /// recorded in the store and reported through the outcome.
    pub async fn compile(&self, scope: &ScopeKey) -> Result<CompileOutcome> {
        let guard = self.scope_guard(scope).await;
        let _held = guard.lock().await;

        let fingerprint = self.source.scope_stats(scope)?.fingerprint();
        if let Some(existing) = self.store.scope_status(scope) {
            if existing.status == ComputeStatus::Succeeded && existing.fingerprint == fingerprint
            {
                debug!(%scope, "fingerprint unchanged, skipping recompute");
                return Ok(CompileOutcome {
                    scope: scope.clone(),
                    status: ComputeStatus::Succeeded,
                    fingerprint,
                    skipped: true,
                    routes_total: 0,
                    routes_failed: 0,
                    stations_total: 0,
                    stations_failed: 0,
                    message: None,
                });
            }
        }

        self.store.put_scope_status(ComputeScope {
            key: scope.clone(),
            fingerprint: fingerprint.clone(),
            status: ComputeStatus::Running,
            message: None,
            updated_at: now_ms(),
        });

        let dataset = match self.source.load(scope) {
            Ok(dataset) => dataset,
            Err(err) => {
                let message = err.to_string();
                warn!(%scope, error = %message, "scope dataset load failed");
                self.store.put_scope_status(ComputeScope {
                    key: scope.clone(),
                    fingerprint: fingerprint.clone(),
                    status: ComputeStatus::Failed,
                    message: Some(message.clone()),
                    updated_at: now_ms(),
                });
                return Ok(CompileOutcome {
                    scope: scope.clone(),
                    status: ComputeStatus::Failed,
                    fingerprint,
                    skipped: false,
                    routes_total: 0,
                    routes_failed: 0,
                    stations_total: 0,
                    stations_failed: 0,
                    message: Some(message),
                });
            }
        };

        let ctx = ScopeContext::new(&dataset);
        let graph = RailGraph::build(&dataset.rails);
        let locator = graph.as_ref().map(NodeLocator::build);
        let finder = graph.as_ref().map(|g| Mutex::new(RouteFinder::new(g)));

        // Phase 1: per-route geometry.
        let geometries: Mutex<HashMap<i64, RouteGeometry>> = Mutex::new(HashMap::new());
        let route_failures = AtomicUsize::new(0);

        stream::iter(&dataset.routes)
            .for_each_concurrent(self.config.route_concurrency, |route| {
                let ctx = &ctx;
                let graph = graph.as_ref();
                let locator = locator.as_ref();
                let finder = finder.as_ref();
                let geometries = &geometries;
                let route_failures = &route_failures;
                let fingerprint = fingerprint.as_str();
                async move {
                    let result = match (graph, locator, finder) {
                        (Some(graph), Some(locator), Some(finder)) => {
                            let mut finder = finder.lock().await;
                            build_route_geometry(
                                ctx,
                                route,
                                Some(graph),
                                Some(locator),
                                Some(&mut finder),
                                true,
                            )
                        }
                        _ => build_route_geometry(ctx, route, None, None, None, true),
                    };

                    let snapshot = match result {
                        Ok(geometry) => {
                            geometries
                                .lock()
                                .await
                                .insert(route.entity_id, geometry.clone());
                            RouteSnapshot {
                                scope: scope.clone(),
                                route_id: route.entity_id,
                                status: ComputeStatus::Succeeded,
                                source_fingerprint: fingerprint.to_string(),
                                geometry: Some(geometry),
                                generated_at: now_ms(),
                                error_message: None,
                            }
                        }
                        Err(err) => {
                            warn!(
                                %scope,
                                route_id = route.entity_id,
                                error = %err,
                                "route geometry failed"
                            );
                            route_failures.fetch_add(1, Ordering::Relaxed);
                            RouteSnapshot {
                                scope: scope.clone(),
                                route_id: route.entity_id,
                                status: ComputeStatus::Failed,
                                source_fingerprint: fingerprint.to_string(),
                                geometry: None,
                                generated_at: now_ms(),
                                error_message: Some(err.to_string()),
                            }
                        }
                    };
                    self.store.put_route_snapshot(snapshot);
                    tokio::task::yield_now().await;
                }
            })
            .await;

        // Phase 2: per-station route maps, built from the geometries phase 1
        // produced.
        let geometries = geometries.into_inner();
        stream::iter(&dataset.stations)
            .for_each_concurrent(self.config.station_concurrency, |station| {
                let ctx = &ctx;
                let geometries = &geometries;
                let fingerprint = fingerprint.as_str();
                async move {
                    let route_map = build_station_route_map(
                        ctx,
                        station,
                        geometries,
                        self.config.max_merge_distance,
                    );
                    self.store.put_station_snapshot(StationSnapshot {
                        scope: scope.clone(),
                        station_id: station.entity_id,
                        status: ComputeStatus::Succeeded,
                        source_fingerprint: fingerprint.to_string(),
                        route_map: Some(route_map),
                        generated_at: now_ms(),
                        error_message: None,
                    });
                    tokio::task::yield_now().await;
                }
            })
            .await;

        self.store.put_scope_status(ComputeScope {
            key: scope.clone(),
            fingerprint: fingerprint.clone(),
            status: ComputeStatus::Succeeded,
            message: None,
            updated_at: now_ms(),
        });

        let routes_failed = route_failures.load(Ordering::Relaxed);
        info!(
            %scope,
            routes = dataset.routes.len(),
            routes_failed,
            stations = dataset.stations.len(),
            "scope compile complete"
        );

        Ok(CompileOutcome {
            scope: scope.clone(),
            status: ComputeStatus::Succeeded,
            fingerprint,
            skipped: false,
            routes_total: dataset.routes.len(),
            routes_failed,
            stations_total: dataset.stations.len(),
            stations_failed: 0,
            message: None,
        })
    }

    async fn scope_guard(&self, scope: &ScopeKey) -> Arc<Mutex<()>> {
        let mut locks = self.scope_locks.lock().await;
        locks.entry(scope.clone()).or_default().clone()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
