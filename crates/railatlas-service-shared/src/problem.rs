//! RFC 9457 Problem Details for HTTP APIs.
//!
//! See: <https://www.rfc-editor.org/rfc/rfc9457.html>

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use railatlas_lib::Error as LibError;

/// Problem type URI for unknown compute scopes.
pub const PROBLEM_SCOPE_NOT_FOUND: &str = "/problems/scope-not-found";

/// Problem type URI for missing routes, stations, or depot positions.
pub const PROBLEM_ENTITY_NOT_FOUND: &str = "/problems/entity-not-found";

/// Problem type URI for malformed request parameters.
pub const PROBLEM_INVALID_REQUEST: &str = "/problems/invalid-request";

/// Problem type URI for internal server errors.
pub const PROBLEM_INTERNAL_ERROR: &str = "/problems/internal-error";

/// Problem type URI for scopes that cannot serve graph queries yet.
pub const PROBLEM_SERVICE_UNAVAILABLE: &str = "/problems/service-unavailable";

/// RFC 9457 Problem Details response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type (relative).
    #[serde(rename = "type")]
    pub type_uri: String,

    /// Short, human-readable summary of the problem.
    pub title: String,

    /// HTTP status code for this problem.
    pub status: u16,

    /// Human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProblemDetails {
    pub fn new(type_uri: impl Into<String>, title: impl Into<String>, status: StatusCode) -> Self {
        Self {
            type_uri: type_uri.into(),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// 400 Bad Request for malformed input.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INVALID_REQUEST,
            "Invalid Request",
            StatusCode::BAD_REQUEST,
        )
        .with_detail(detail)
    }

    /// 404 Not Found for an unknown scope.
    pub fn scope_not_found(detail: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_SCOPE_NOT_FOUND,
            "Scope Not Found",
            StatusCode::NOT_FOUND,
        )
        .with_detail(detail)
    }

    /// 404 Not Found for a missing route/station/depot.
    pub fn entity_not_found(detail: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_ENTITY_NOT_FOUND,
            "Entity Not Found",
            StatusCode::NOT_FOUND,
        )
        .with_detail(detail)
    }

    /// 500 Internal Server Error.
    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INTERNAL_ERROR,
            "Internal Error",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .with_detail(detail)
    }

    /// 503 Service Unavailable.
    pub fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_SERVICE_UNAVAILABLE,
            "Service Unavailable",
            StatusCode::SERVICE_UNAVAILABLE,
        )
        .with_detail(detail)
    }
}

impl std::fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.detail.as_deref().unwrap_or(""))
    }
}

impl std::error::Error for ProblemDetails {}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Json(&self).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        *response.status_mut() = status;
        response
    }
}

/// Map library errors onto problem responses.
///
/// Missing scope/entity become 404, malformed identifiers 400, a scope
/// without a usable rail graph 503; anything else is wrapped as a generic
/// 500 so internals never leak structure to callers.
pub fn from_lib_error(error: &LibError) -> ProblemDetails {
    match error {
        LibError::ScopeNotFound { .. } => ProblemDetails::scope_not_found(error.to_string()),
        LibError::RouteNotFound { .. }
        | LibError::StationNotFound { .. }
        | LibError::NoUsablePlatforms { .. }
        | LibError::SnapFailed { .. } => ProblemDetails::entity_not_found(error.to_string()),
        LibError::InvalidIdentifier { .. } => ProblemDetails::bad_request(error.to_string()),
        LibError::GraphUnavailable { .. } => {
            ProblemDetails::service_unavailable(error.to_string())
        }
        _ => ProblemDetails::internal_error(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_status_codes() {
        assert_eq!(ProblemDetails::bad_request("x").status, 400);
        assert_eq!(ProblemDetails::scope_not_found("x").status, 404);
        assert_eq!(ProblemDetails::entity_not_found("x").status, 404);
        assert_eq!(ProblemDetails::internal_error("x").status, 500);
        assert_eq!(ProblemDetails::service_unavailable("x").status, 503);
    }

    #[test]
    fn serializes_rfc9457_fields() {
        let problem = ProblemDetails::bad_request("packed position is not an integer");
        let json = serde_json::to_string(&problem).unwrap();
        assert!(json.contains("\"type\":\"/problems/invalid-request\""));
        assert!(json.contains("\"title\":\"Invalid Request\""));
        assert!(json.contains("\"status\":400"));
        assert!(json.contains("packed position"));
    }

    #[test]
    fn scope_errors_map_to_404() {
        let error = LibError::ScopeNotFound {
            scope: "sv/mtr/overworld".into(),
        };
        let problem = from_lib_error(&error);
        assert_eq!(problem.type_uri, PROBLEM_SCOPE_NOT_FOUND);
        assert_eq!(problem.status, 404);
    }

    #[test]
    fn route_errors_map_to_404() {
        let error = LibError::RouteNotFound {
            scope: "sv/mtr/overworld".into(),
            route_id: 42,
        };
        let problem = from_lib_error(&error);
        assert_eq!(problem.type_uri, PROBLEM_ENTITY_NOT_FOUND);
        assert!(problem.detail.as_deref().unwrap().contains("42"));
    }

    #[test]
    fn identifier_errors_map_to_400() {
        let error = LibError::InvalidIdentifier {
            value: "not-a-number".into(),
        };
        assert_eq!(from_lib_error(&error).status, 400);
    }

    #[test]
    fn io_errors_map_to_500() {
        let error = LibError::Io(std::io::Error::other("disk gone"));
        let problem = from_lib_error(&error);
        assert_eq!(problem.status, 500);
    }
}
