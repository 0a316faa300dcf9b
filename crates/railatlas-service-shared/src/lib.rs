//! Shared infrastructure for RailAtlas HTTP microservices.
//!
//! This crate provides the common glue used by the service containers:
//!
//! - [`AppState`]: data source, compiler, and live resolver wired to a data
//!   directory
//! - [`health`]: liveness/readiness probe handlers
//! - [`ProblemDetails`]: RFC 9457 Problem Details for error responses
//! - [`ServiceResponse`]: wrapper for successful responses
//! - [`logging`]: structured logging setup
//!
//! The services follow a thin-handler pattern: all business logic lives in
//! `railatlas-lib`, handlers only parse, delegate, and format.

#![deny(warnings)]

mod health;
pub mod logging;
mod problem;
mod response;
mod state;

pub use health::{health_live, health_ready, HealthStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use problem::{
    from_lib_error, ProblemDetails, PROBLEM_ENTITY_NOT_FOUND, PROBLEM_INTERNAL_ERROR,
    PROBLEM_INVALID_REQUEST, PROBLEM_SCOPE_NOT_FOUND, PROBLEM_SERVICE_UNAVAILABLE,
};
pub use response::ServiceResponse;
pub use state::{AppState, AppStateError};
