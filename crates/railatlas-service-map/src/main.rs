//! RailAtlas transit-map HTTP microservice.
//!
//! Exposes the live detail resolver and a snapshot-compile trigger over a
//! JSON data directory.
//!
//! # Endpoints
//!
//! - `POST /api/v1/compile` - Compile one scope's snapshots
//! - `GET /api/v1/routes/{server}/{mod}/{dimension}/{route_id}` - Live route geometry
//! - `GET /api/v1/stations/{server}/{mod}/{dimension}/{station_id}` - Live station route map
//! - `GET /api/v1/depots/{server}/{mod}/{dimension}/{packed_pos}` - Depot variant paths
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//!
//! # Configuration
//!
//! - `RAILATLAS_DATA_DIR` - Root of the per-scope JSON data tree (default `/data`)
//! - `RUST_LOG` - Log level (default: info)
//! - `LOG_FORMAT` - Log format: json (default) or text
//! - `SERVICE_PORT` - HTTP port (default: 8080)

use std::env;
use std::net::SocketAddr;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use railatlas_lib::{Error as LibError, ScopeKey};
use railatlas_service_shared::{
    from_lib_error, health_live, health_ready, init_logging, AppState, LoggingConfig,
    ProblemDetails, ServiceResponse,
};

const SERVICE_NAME: &str = "map";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_config = LoggingConfig::from_env().with_service(SERVICE_NAME);
    init_logging(&logging_config);

    let data_dir = env::var("RAILATLAS_DATA_DIR").unwrap_or_else(|_| "/data".to_string());
    let port: u16 = env::var("SERVICE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    info!(data_dir = %data_dir, port, "starting map service");

    let state = AppState::new(SERVICE_NAME, env!("CARGO_PKG_VERSION"), &data_dir).map_err(|e| {
        error!(error = %e, data_dir = %data_dir, "failed to initialize application state");
        e
    })?;

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "listening on");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/compile", post(compile_handler))
        .route(
            "/api/v1/routes/{server}/{railway_mod}/{dimension}/{route_id}",
            get(route_handler),
        )
        .route(
            "/api/v1/stations/{server}/{railway_mod}/{dimension}/{station_id}",
            get(station_handler),
        )
        .route(
            "/api/v1/depots/{server}/{railway_mod}/{dimension}/{packed_pos}",
            get(depot_handler),
        )
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Parse a caller-supplied numeric path segment.
fn parse_id(value: &str) -> Result<i64, ProblemDetails> {
    value.parse::<i64>().map_err(|_| {
        from_lib_error(&LibError::InvalidIdentifier {
            value: value.to_string(),
        })
    })
}

async fn compile_handler(State(state): State<AppState>, Json(scope): Json<ScopeKey>) -> Response {
    info!(%scope, "handling compile request");
    match state.compiler.compile(&scope).await {
        Ok(outcome) => ServiceResponse::new(outcome).into_response(),
        Err(err) => from_lib_error(&err).into_response(),
    }
}

async fn route_handler(
    State(state): State<AppState>,
    Path((server, railway_mod, dimension, route_id)): Path<(String, String, String, String)>,
) -> Response {
    let route_id = match parse_id(&route_id) {
        Ok(id) => id,
        Err(problem) => return problem.into_response(),
    };
    let scope = ScopeKey::new(server, railway_mod, dimension);

    match state.resolver.route_detail(&scope, route_id) {
        Ok(geometry) => ServiceResponse::new(geometry).into_response(),
        Err(err) => from_lib_error(&err).into_response(),
    }
}

async fn station_handler(
    State(state): State<AppState>,
    Path((server, railway_mod, dimension, station_id)): Path<(String, String, String, String)>,
) -> Response {
    let station_id = match parse_id(&station_id) {
        Ok(id) => id,
        Err(problem) => return problem.into_response(),
    };
    let scope = ScopeKey::new(server, railway_mod, dimension);

    match state.resolver.station_detail(&scope, station_id) {
        Ok(route_map) => ServiceResponse::new(route_map).into_response(),
        Err(err) => from_lib_error(&err).into_response(),
    }
}

async fn depot_handler(
    State(state): State<AppState>,
    Path((server, railway_mod, dimension, packed_pos)): Path<(String, String, String, String)>,
) -> Response {
    let packed_pos = match parse_id(&packed_pos) {
        Ok(packed) => packed,
        Err(problem) => return problem.into_response(),
    };
    let scope = ScopeKey::new(server, railway_mod, dimension);

    match state.resolver.depot_detail(&scope, packed_pos) {
        Ok(detail) => ServiceResponse::new(detail).into_response(),
        Err(err) => from_lib_error(&err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;
    use railatlas_lib::BlockPos;
    use std::fs;
    use tempfile::TempDir;

    fn fixture_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let scope_dir = dir.path().join("sv/mtr/overworld");
        fs::create_dir_all(&scope_dir).unwrap();

        let a = BlockPos::new(0, 0, 0);
        let b = BlockPos::new(0, 0, 50);
        let c = BlockPos::new(0, 0, 100);

        fs::write(
            scope_dir.join("routes.json"),
            r#"[{"entity_id": 100, "name": "Loop Line||Out|1", "platform_ids": [1, 2], "updated_at": 1000}]"#,
        )
        .unwrap();
        fs::write(
            scope_dir.join("platforms.json"),
            format!(
                r#"[
                    {{"entity_id": 1, "name": "Origin 1", "station_id": 10, "pos1": {p1}, "pos2": {p1}, "updated_at": 1000}},
                    {{"entity_id": 2, "name": "Terminus 1", "station_id": 11, "pos1": {p2}, "pos2": {p2}, "updated_at": 1000}}
                ]"#,
                p1 = a.pack(),
                p2 = c.pack(),
            ),
        )
        .unwrap();
        fs::write(
            scope_dir.join("stations.json"),
            r#"[
                {"entity_id": 10, "name": "Origin", "x_min": -5, "x_max": 5, "z_min": -5, "z_max": 5, "updated_at": 1000},
                {"entity_id": 11, "name": "Terminus", "x_min": -5, "x_max": 5, "z_min": 95, "z_max": 105, "updated_at": 1000}
            ]"#,
        )
        .unwrap();
        fs::write(
            scope_dir.join("rails.json"),
            format!(
                r#"[
                    {{"entity_id": 1, "node_pos": {a}, "connections": [{{"target_node_pos": {b}}}], "updated_at": 1000}},
                    {{"entity_id": 2, "node_pos": {b}, "connections": [{{"target_node_pos": {c}}}], "updated_at": 1000}},
                    {{"entity_id": 3, "node_pos": {c}, "connections": [], "updated_at": 1000}}
                ]"#,
                a = a.pack(),
                b = b.pack(),
                c = c.pack(),
            ),
        )
        .unwrap();

        dir
    }

    fn server(dir: &TempDir) -> TestServer {
        let state = AppState::new("map", "0.0.0-test", dir.path()).unwrap();
        TestServer::new(build_router(state)).unwrap()
    }

    #[tokio::test]
    async fn health_probes_respond() {
        let dir = fixture_dir();
        let server = server(&dir);

        server.get("/health/live").await.assert_status_ok();
        server.get("/health/ready").await.assert_status_ok();
    }

    #[tokio::test]
    async fn route_detail_returns_geometry() {
        let dir = fixture_dir();
        let server = server(&dir);

        let response = server.get("/api/v1/routes/sv/mtr/overworld/100").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["route_id"], 100);
        assert_eq!(body["source"], "rails");
        assert_eq!(body["stops"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let dir = fixture_dir();
        let server = server(&dir);

        let response = server.get("/api/v1/routes/sv/mtr/overworld/999").await;
        response.assert_status(axum::http::StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json();
        assert_eq!(body["type"], "/problems/entity-not-found");
    }

    #[tokio::test]
    async fn unknown_scope_is_404() {
        let dir = fixture_dir();
        let server = server(&dir);

        let response = server.get("/api/v1/routes/sv/mtr/nether/100").await;
        response.assert_status(axum::http::StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json();
        assert_eq!(body["type"], "/problems/scope-not-found");
    }

    #[tokio::test]
    async fn malformed_identifier_is_400() {
        let dir = fixture_dir();
        let server = server(&dir);

        let response = server.get("/api/v1/routes/sv/mtr/overworld/not-a-number").await;
        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["type"], "/problems/invalid-request");
    }

    #[tokio::test]
    async fn station_route_map_groups_routes() {
        let dir = fixture_dir();
        let server = server(&dir);

        let response = server.get("/api/v1/stations/sv/mtr/overworld/10").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["station_id"], 10);
        assert_eq!(body["groups"][0]["key"], "Loop Line");
    }

    #[tokio::test]
    async fn depot_detail_traces_paths() {
        let dir = fixture_dir();
        let server = server(&dir);

        let depot = BlockPos::new(2, 0, 0).pack();
        let response = server
            .get(&format!("/api/v1/depots/sv/mtr/overworld/{depot}"))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["paths"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn compile_trigger_reports_outcome() {
        let dir = fixture_dir();
        let server = server(&dir);

        let response = server
            .post("/api/v1/compile")
            .json(&serde_json::json!({
                "server_id": "sv",
                "railway_mod": "mtr",
                "dimension": "overworld"
            }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "SUCCEEDED");
        assert_eq!(body["routes_total"], 1);
        assert_eq!(body["skipped"], false);

        // Second trigger hits the fingerprint gate.
        let again = server
            .post("/api/v1/compile")
            .json(&serde_json::json!({
                "server_id": "sv",
                "railway_mod": "mtr",
                "dimension": "overworld"
            }))
            .await;
        again.assert_status_ok();
        let body: serde_json::Value = again.json();
        assert_eq!(body["skipped"], true);
    }

    #[tokio::test]
    async fn compile_unknown_scope_is_404() {
        let dir = fixture_dir();
        let server = server(&dir);

        let response = server
            .post("/api/v1/compile")
            .json(&serde_json::json!({
                "server_id": "sv",
                "railway_mod": "mtr",
                "dimension": "the-end"
            }))
            .await;
        response.assert_status(axum::http::StatusCode::NOT_FOUND);
    }
}
