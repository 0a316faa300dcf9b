use thiserror::Error;

/// Convenient result alias for the RailAtlas library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Raised when a route identifier does not exist in the scope.
    #[error("route {route_id} not found in scope {scope}")]
    RouteNotFound { scope: String, route_id: i64 },

    /// Raised when a station identifier does not exist in the scope.
    #[error("station {station_id} not found in scope {scope}")]
    StationNotFound { scope: String, station_id: i64 },

    /// Raised when a scope has no records at all.
    #[error("scope {scope} has no records")]
    ScopeNotFound { scope: String },

    /// Raised when a caller-supplied identifier cannot be parsed.
    #[error("invalid identifier: {value}")]
    InvalidIdentifier { value: String },

    /// Raised when a route resolves to no platforms with usable positions.
    #[error("route {route_id} has no usable platforms")]
    NoUsablePlatforms { route_id: i64 },

    /// Raised when no rail graph could be built for a scope that needs one.
    #[error("no rail graph available for scope {scope}")]
    GraphUnavailable { scope: String },

    /// Raised when a position could not be snapped to the rail graph.
    #[error("no graph node within snap radius of ({x}, {y}, {z})")]
    SnapFailed { x: i32, y: i32, z: i32 },

    /// Scope-level computation failure (dataset load or graph build).
    #[error("scope computation failed: {message}")]
    ScopeCompute { message: String },

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for JSON (de)serialization errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
