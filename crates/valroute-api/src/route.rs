//! # Validated Routes
//!
//! Registers axum routes whose requests pass through a [`RoutePipeline`]
//! before and after the handler runs:
//!
//! ```text
//! params → body → query → handler → response → 200 JSON
//! ```
//!
//! Schema references are resolved when the route is registered, so an
//! unknown schema name fails at startup instead of on the first request.
//! Each input is decoded to JSON only after the stages before it pass.
//! Handlers are synchronous and run inline on the request task.

use std::marker::PhantomData;
use std::sync::Arc;

use axum::http::Method;
use axum::routing::{on, MethodFilter};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use valroute_schema::{
    PipelineError, RoutePipeline, RouteSchemas, SchemaBound, SchemaRegistry,
    SchemaValidationError, Stage,
};

use crate::error::AppError;
use crate::extractors::{body_value, params_value, query_value, RawBody, RawParams, RawQuery};

/// Route registration failure.
#[derive(Error, Debug)]
pub enum RouteError {
    /// A schema reference could not be resolved.
    #[error("route {method} {path}: {source}")]
    Schema {
        method: Method,
        path: String,
        #[source]
        source: SchemaValidationError,
    },

    /// The method has no axum routing filter (extension methods).
    #[error("route {method} {path}: method cannot be routed")]
    UnsupportedMethod { method: Method, path: String },
}

/// Computes a response payload from validated inputs.
pub trait RouteHandler: Send + Sync + 'static {
    fn call(&self, params: Value, body: Value, query: Value) -> Result<Value, AppError>;
}

/// Adapter for plain `Fn(params, body, query) -> response` closures.
pub struct FnHandler<F>(F);

/// Wrap an untyped handler function.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(Value, Value, Value) -> Value + Send + Sync + 'static,
{
    FnHandler(f)
}

impl<F> RouteHandler for FnHandler<F>
where
    F: Fn(Value, Value, Value) -> Value + Send + Sync + 'static,
{
    fn call(&self, params: Value, body: Value, query: Value) -> Result<Value, AppError> {
        Ok((self.0)(params, body, query))
    }
}

/// Adapter for handlers over typed payloads.
///
/// Validated inputs are deserialized into `P`, `B` and `Q`; the returned
/// `R` is serialized back to JSON before the response check.
pub struct Typed<F, P, B, Q, R> {
    f: F,
    _types: PhantomData<fn(P, B, Q) -> R>,
}

/// Wrap a typed handler function.
pub fn typed<F, P, B, Q, R>(f: F) -> Typed<F, P, B, Q, R>
where
    F: Fn(P, B, Q) -> R,
{
    Typed {
        f,
        _types: PhantomData,
    }
}

impl<F, P, B, Q, R> RouteHandler for Typed<F, P, B, Q, R>
where
    F: Fn(P, B, Q) -> R + Send + Sync + 'static,
    P: DeserializeOwned + 'static,
    B: DeserializeOwned + 'static,
    Q: DeserializeOwned + 'static,
    R: Serialize + 'static,
{
    fn call(&self, params: Value, body: Value, query: Value) -> Result<Value, AppError> {
        let params = decode(Stage::Params, params)?;
        let body = decode(Stage::Body, body)?;
        let query = decode(Stage::Query, query)?;
        let output = (self.f)(params, body, query);
        serde_json::to_value(output)
            .map_err(|e| AppError::Internal(format!("response serialization failed: {e}")))
    }
}

/// A value that passed its schema but not the handler's type is a
/// schema/type mismatch on the server side.
fn decode<T: DeserializeOwned>(stage: Stage, value: Value) -> Result<T, AppError> {
    serde_json::from_value(value).map_err(|e| {
        AppError::Internal(format!(
            "{stage} passed schema validation but does not match the handler type: {e}"
        ))
    })
}

/// Add one validated route to `router`.
///
/// `path` uses axum's template syntax (`/todo/{id}`). The route stays
/// registered for the lifetime of the router.
///
/// # Errors
///
/// Returns [`RouteError::Schema`] if a reference in `schemas` is not in
/// `registry`, and [`RouteError::UnsupportedMethod`] for extension methods.
pub fn register_validated_route<S, H>(
    router: Router<S>,
    registry: &SchemaRegistry,
    method: Method,
    path: &str,
    schemas: &RouteSchemas,
    handler: H,
) -> Result<Router<S>, RouteError>
where
    S: Clone + Send + Sync + 'static,
    H: RouteHandler,
{
    let pipeline =
        RoutePipeline::compile(registry, schemas).map_err(|source| RouteError::Schema {
            method: method.clone(),
            path: path.to_string(),
            source,
        })?;
    let filter =
        MethodFilter::try_from(method.clone()).map_err(|_| RouteError::UnsupportedMethod {
            method: method.clone(),
            path: path.to_string(),
        })?;

    tracing::debug!(
        %method,
        path,
        params = ?schemas.params,
        body = ?schemas.body,
        query = ?schemas.query,
        response = ?schemas.response,
        "registered validated route"
    );

    let endpoint = Arc::new(Endpoint {
        label: format!("{method} {path}"),
        pipeline,
        handler,
    });

    Ok(router.route(
        path,
        on(filter, move |params: RawParams, query: RawQuery, body: RawBody| {
            let endpoint = Arc::clone(&endpoint);
            async move { endpoint.dispatch(params, query, body) }
        }),
    ))
}

/// One registered route: its compiled checks and its handler.
struct Endpoint<H> {
    label: String,
    pipeline: RoutePipeline,
    handler: H,
}

impl<H: RouteHandler> Endpoint<H> {
    fn dispatch(
        &self,
        params: RawParams,
        query: RawQuery,
        body: RawBody,
    ) -> Result<Json<Value>, AppError> {
        self.pipeline
            .run_with(
                || params_value(params),
                || body_value(body),
                || query_value(query),
                |p, b, q| self.handler.call(p, b, q),
            )
            .map(Json)
            .map_err(|err| {
                if let PipelineError::Rejected(failure) = &err {
                    if failure.stage.is_client_input() {
                        tracing::debug!(
                            route = %self.label,
                            stage = %failure.stage,
                            violations = failure.violations.len(),
                            "request rejected"
                        );
                    }
                }
                AppError::from(err)
            })
    }
}

/// Builder collecting validated routes against one registry.
pub struct ValidatedRouter<S = ()> {
    registry: Arc<SchemaRegistry>,
    router: Router<S>,
}

impl<S> ValidatedRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            router: Router::new(),
        }
    }

    /// Register a route with explicit schema references.
    pub fn route<H: RouteHandler>(
        self,
        method: Method,
        path: &str,
        schemas: RouteSchemas,
        handler: H,
    ) -> Result<Self, RouteError> {
        let router =
            register_validated_route(self.router, &self.registry, method, path, &schemas, handler)?;
        Ok(Self {
            registry: self.registry,
            router,
        })
    }

    /// Register a typed route; schema references come from the payload
    /// types' [`SchemaBound`] bindings.
    pub fn typed_route<F, P, B, Q, R>(
        self,
        method: Method,
        path: &str,
        f: F,
    ) -> Result<Self, RouteError>
    where
        F: Fn(P, B, Q) -> R + Send + Sync + 'static,
        P: SchemaBound + DeserializeOwned + 'static,
        B: SchemaBound + DeserializeOwned + 'static,
        Q: SchemaBound + DeserializeOwned + 'static,
        R: SchemaBound + Serialize + 'static,
    {
        let schemas = RouteSchemas::bound::<P, B, Q, R>();
        self.route(method, path, schemas, typed(f))
    }

    pub fn into_router(self) -> Router<S> {
        self.router
    }
}
