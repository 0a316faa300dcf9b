//! The scope data-source seam.
//!
//! The surrounding platform that owns the raw records is out of scope; this
//! trait is the boundary. `scope_stats` supplies the cheap fingerprint
//! inputs, `load` the full record collections. Ships with a JSON-directory
//! implementation for CLI/service use and an in-memory one for tests.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};
use crate::records::{PlatformRecord, RailRecord, RouteRecord, ScopeKey, StationRecord};

/// All records of one scope.
#[derive(Debug, Clone, Default)]
pub struct ScopeDataset {
    pub routes: Vec<RouteRecord>,
    pub platforms: Vec<PlatformRecord>,
    pub stations: Vec<StationRecord>,
    pub rails: Vec<RailRecord>,
}

/// Count and newest update timestamp of one record collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollectionStats {
    pub count: usize,
    /// Epoch milliseconds; records without a timestamp count as 0.
    pub max_updated_at: i64,
}

impl CollectionStats {
    fn gather(timestamps: impl Iterator<Item = Option<i64>>) -> Self {
        let mut stats = Self::default();
        for ts in timestamps {
            stats.count += 1;
            stats.max_updated_at = stats.max_updated_at.max(ts.unwrap_or(0));
        }
        stats
    }
}

/// Fingerprint inputs for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScopeStats {
    pub routes: CollectionStats,
    pub platforms: CollectionStats,
    pub stations: CollectionStats,
    pub rails: CollectionStats,
}

impl ScopeStats {
    pub fn of(dataset: &ScopeDataset) -> Self {
        Self {
            routes: CollectionStats::gather(dataset.routes.iter().map(|r| r.updated_at)),
            platforms: CollectionStats::gather(dataset.platforms.iter().map(|p| p.updated_at)),
            stations: CollectionStats::gather(dataset.stations.iter().map(|s| s.updated_at)),
            rails: CollectionStats::gather(dataset.rails.iter().map(|r| r.updated_at)),
        }
    }

    /// Content fingerprint string; equal stats produce equal strings.
    pub fn fingerprint(&self) -> String {
        let part = |c: &CollectionStats| format!("{}:{}", c.count, c.max_updated_at);
        format!(
            "r={};p={};s={};t={}",
            part(&self.routes),
            part(&self.platforms),
            part(&self.stations),
            part(&self.rails)
        )
    }
}

/// Read-only access to the raw records of a scope.
pub trait ScopeDataSource: Send + Sync {
    /// Cheap fingerprint inputs for change detection.
    fn scope_stats(&self, scope: &ScopeKey) -> Result<ScopeStats>;

    /// All four record collections for the scope.
    fn load(&self, scope: &ScopeKey) -> Result<ScopeDataset>;
}

impl<T: ScopeDataSource + ?Sized> ScopeDataSource for std::sync::Arc<T> {
    fn scope_stats(&self, scope: &ScopeKey) -> Result<ScopeStats> {
        (**self).scope_stats(scope)
    }

    fn load(&self, scope: &ScopeKey) -> Result<ScopeDataset> {
        (**self).load(scope)
    }
}

/// Data source reading per-scope JSON files from a directory tree:
/// `<root>/<server>/<mod>/<dimension>/{routes,platforms,stations,rails}.json`.
/// A missing file is an empty collection; a missing scope directory is an
/// unknown scope.
pub struct JsonDataSource {
    root: PathBuf,
}

impl JsonDataSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn scope_dir(&self, scope: &ScopeKey) -> PathBuf {
        self.root
            .join(&scope.server_id)
            .join(&scope.railway_mod)
            .join(&scope.dimension)
    }

    fn read_collection<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Vec<T>> {
        let path = dir.join(file);
        if !path.exists() {
            debug!(path = %path.display(), "collection file absent, treating as empty");
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl ScopeDataSource for JsonDataSource {
    fn scope_stats(&self, scope: &ScopeKey) -> Result<ScopeStats> {
        // The JSON layout has no cheaper stats than a full read.
        Ok(ScopeStats::of(&self.load(scope)?))
    }

    fn load(&self, scope: &ScopeKey) -> Result<ScopeDataset> {
        let dir = self.scope_dir(scope);
        if !dir.is_dir() {
            return Err(Error::ScopeNotFound {
                scope: scope.to_string(),
            });
        }
        Ok(ScopeDataset {
            routes: Self::read_collection(&dir, "routes.json")?,
            platforms: Self::read_collection(&dir, "platforms.json")?,
            stations: Self::read_collection(&dir, "stations.json")?,
            rails: Self::read_collection(&dir, "rails.json")?,
        })
    }
}

/// In-memory data source for tests and demos.
#[derive(Default)]
pub struct MemoryDataSource {
    scopes: HashMap<ScopeKey, ScopeDataset>,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, scope: ScopeKey, dataset: ScopeDataset) {
        self.scopes.insert(scope, dataset);
    }

    pub fn with_scope(mut self, scope: ScopeKey, dataset: ScopeDataset) -> Self {
        self.insert(scope, dataset);
        self
    }
}

impl ScopeDataSource for MemoryDataSource {
    fn scope_stats(&self, scope: &ScopeKey) -> Result<ScopeStats> {
        Ok(ScopeStats::of(&self.load(scope)?))
    }

    fn load(&self, scope: &ScopeKey) -> Result<ScopeDataset> {
        self.scopes
            .get(scope)
            .cloned()
            .ok_or_else(|| Error::ScopeNotFound {
                scope: scope.to_string(),
            })
    }
}
