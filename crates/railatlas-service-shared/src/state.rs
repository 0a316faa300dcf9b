//! Shared application state for the RailAtlas services.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use railatlas_lib::{
    CompilerConfig, JsonDataSource, LiveResolver, MemoryStore, SnapshotCompiler,
};

/// Errors raised while constructing [`AppState`].
#[derive(Debug, Error)]
pub enum AppStateError {
    #[error("data directory not found: {0}")]
    DataRootMissing(PathBuf),
}

/// State shared by all handlers of a service instance.
///
/// The compiler and resolver read the same JSON data directory; snapshots
/// live in an in-memory store for the lifetime of the process.
#[derive(Clone)]
pub struct AppState {
    pub service: &'static str,
    pub version: &'static str,
    pub data_root: PathBuf,
    pub compiler: Arc<SnapshotCompiler<JsonDataSource, MemoryStore>>,
    pub resolver: Arc<LiveResolver<JsonDataSource>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.service)
            .field("version", &self.version)
            .field("data_root", &self.data_root)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        service: &'static str,
        version: &'static str,
        data_root: impl AsRef<Path>,
    ) -> Result<Self, AppStateError> {
        let data_root = data_root.as_ref().to_path_buf();
        if !data_root.is_dir() {
            return Err(AppStateError::DataRootMissing(data_root));
        }

        let compiler = SnapshotCompiler::new(
            JsonDataSource::new(&data_root),
            MemoryStore::new(),
            CompilerConfig::default(),
        );
        let resolver = LiveResolver::new(JsonDataSource::new(&data_root));

        info!(service, data_root = %data_root.display(), "application state initialized");
        Ok(Self {
            service,
            version,
            data_root,
            compiler: Arc::new(compiler),
            resolver: Arc::new(resolver),
        })
    }

    /// Whether the backing data directory is still reachable.
    pub fn data_root_ready(&self) -> bool {
        self.data_root.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_root_is_rejected() {
        let err = AppState::new("map", "0.0.0", "/definitely/not/here").unwrap_err();
        assert!(matches!(err, AppStateError::DataRootMissing(_)));
    }

    #[test]
    fn state_initializes_over_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new("map", "0.0.0", dir.path()).unwrap();
        assert!(state.data_root_ready());
        assert_eq!(state.service, "map");
    }
}
