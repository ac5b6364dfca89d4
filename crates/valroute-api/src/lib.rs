//! # valroute-api: Schema-Validated Axum Routes
//!
//! Registers axum routes whose path parameters, body, query string and
//! response are checked against named JSON Schemas from a
//! [`SchemaRegistry`](valroute_schema::SchemaRegistry).
//!
//! ## API Surface
//!
//! | Route                 | Module               | Notes |
//! |-----------------------|----------------------|-------|
//! | `PUT /todo/{id}`      | [`routes::todo`]     | Demonstration route |
//! | `GET /health/*`       | this module          | Liveness and readiness probes |
//! | `GET /metrics`        | [`middleware::metrics`] | Counter snapshot (JSON) |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → BodyLimit → Handler
//! ```
//!
//! ## Error Mapping
//!
//! Rejected params, body or query → 422 `VALIDATION_ERROR` with the stage
//! and violations. A handler whose output fails its response schema →
//! 500 `INTERNAL_ERROR`. See [`error::AppError`].

pub mod error;
pub mod extractors;
pub mod middleware;
pub mod route;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Method, StatusCode, Uri};
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Extension, Json, Router};

pub use error::AppError;
pub use route::{
    handler_fn, register_validated_route, typed, RouteError, RouteHandler, ValidatedRouter,
};
pub use state::{AppConfig, AppState};

use crate::middleware::metrics::ApiMetrics;

/// Request body limit for validated routes.
const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes and `/metrics` are mounted outside the metrics middleware
/// so probe traffic is not counted.
///
/// # Errors
///
/// Returns [`RouteError`] if a route names a schema missing from the
/// state's registry.
pub fn app(state: AppState) -> Result<Router, RouteError> {
    let metrics = ApiMetrics::new();

    let validated = ValidatedRouter::<AppState>::new(state.registry.clone());
    let validated = routes::todo::routes(validated)?;

    let api = validated
        .into_router()
        .method_not_allowed_fallback(method_not_allowed)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(Extension(metrics.clone()))
        .with_state(state.clone());

    let operational = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .route("/metrics", axum::routing::get(metrics_snapshot))
        .method_not_allowed_fallback(method_not_allowed)
        .layer(Extension(metrics))
        .with_state(state);

    Ok(Router::new()
        .merge(operational)
        .merge(api)
        .fallback(not_found))
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 once at least one schema is registered.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if state.registry.schema_count() == 0 {
        return (StatusCode::SERVICE_UNAVAILABLE, "no schemas loaded").into_response();
    }
    (StatusCode::OK, "ready").into_response()
}

/// GET /metrics: current counter values.
async fn metrics_snapshot(Extension(metrics): Extension<ApiMetrics>) -> impl IntoResponse {
    Json(metrics.snapshot())
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {uri}"))
}

async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::MethodNotAllowed(format!("{method} is not supported on {uri}"))
}
