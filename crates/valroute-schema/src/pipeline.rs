//! # Validation Pipeline
//!
//! The per-route check sequence: params, body, query, handler, response.
//! Each stage either passes its value through unchanged or yields a
//! [`StageFailure`]. The first failure ends the run; later stages and the
//! handler are not reached.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::binding::RouteSchemas;
use crate::registry::{BoundSchema, SchemaRegistry, SchemaValidationError, ValidationViolations};

/// A validation point in the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Params,
    Body,
    Query,
    Response,
}

impl Stage {
    /// All stages in the order they run.
    pub const ORDER: [Stage; 4] = [Stage::Params, Stage::Body, Stage::Query, Stage::Response];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Params => "params",
            Stage::Body => "body",
            Stage::Query => "query",
            Stage::Response => "response",
        }
    }

    /// False only for [`Stage::Response`], whose failures are handler defects.
    pub fn is_client_input(&self) -> bool {
        !matches!(self, Stage::Response)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload rejected by its stage's schema.
#[derive(Error, Debug, Clone)]
#[error(
    "{stage} validation failed against schema '{}':\n{violations}",
    .schema_name.as_deref().unwrap_or("(any)")
)]
pub struct StageFailure {
    /// Which payload failed.
    pub stage: Stage,
    /// Registry name of the schema, `None` for the always-pass schema.
    pub schema_name: Option<String>,
    /// The schema document the value was checked against.
    pub schema: Value,
    /// The offending value.
    pub value: Value,
    /// Every violation reported for the value.
    pub violations: ValidationViolations,
}

/// Outcome of a failed pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError<E> {
    /// A stage rejected its payload.
    #[error(transparent)]
    Rejected(StageFailure),

    /// A payload could not be decoded into JSON before its check.
    #[error("{0} could not be decoded: {1}")]
    Decode(Stage, E),

    /// The handler itself failed.
    #[error("handler failed: {0}")]
    Handler(E),
}

impl<E> PipelineError<E> {
    /// The rejecting stage, if a stage rejected.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Rejected(failure) => Some(failure.stage),
            PipelineError::Decode(stage, _) => Some(*stage),
            PipelineError::Handler(_) => None,
        }
    }
}

/// The four compiled checks of one route, resolved at registration time.
#[derive(Debug, Clone)]
pub struct RoutePipeline {
    params: BoundSchema,
    body: BoundSchema,
    query: BoundSchema,
    response: BoundSchema,
}

impl RoutePipeline {
    /// Resolve every reference in `schemas` against `registry`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaNotFound` for the first reference naming an
    /// unregistered schema.
    pub fn compile(
        registry: &SchemaRegistry,
        schemas: &RouteSchemas,
    ) -> Result<Self, SchemaValidationError> {
        Ok(Self {
            params: registry.resolve(schemas.params.as_deref())?,
            body: registry.resolve(schemas.body.as_deref())?,
            query: registry.resolve(schemas.query.as_deref())?,
            response: registry.resolve(schemas.response.as_deref())?,
        })
    }

    /// The schema checked at `stage`.
    pub fn schema(&self, stage: Stage) -> &BoundSchema {
        match stage {
            Stage::Params => &self.params,
            Stage::Body => &self.body,
            Stage::Query => &self.query,
            Stage::Response => &self.response,
        }
    }

    /// Check one payload. A valid value is returned unchanged.
    pub fn check(&self, stage: Stage, value: Value) -> Result<Value, StageFailure> {
        let schema = self.schema(stage);
        match schema.validate(&value) {
            Ok(()) => Ok(value),
            Err(violations) => Err(StageFailure {
                stage,
                schema_name: schema.name().map(str::to_string),
                schema: schema.document().clone(),
                value,
                violations,
            }),
        }
    }

    /// Run the full sequence around `handler` over already-decoded values.
    ///
    /// The handler runs only after params, body and query all pass; its
    /// output is checked against the response schema before being returned.
    pub fn run<F, E>(
        &self,
        params: Value,
        body: Value,
        query: Value,
        handler: F,
    ) -> Result<Value, PipelineError<E>>
    where
        F: FnOnce(Value, Value, Value) -> Result<Value, E>,
    {
        self.run_with(|| Ok(params), || Ok(body), || Ok(query), handler)
    }

    /// Run the full sequence, decoding each input just before its check.
    ///
    /// A payload is only decoded once every earlier stage has passed, so a
    /// params rejection is reported even when the body would not parse.
    pub fn run_with<P, B, Q, F, E>(
        &self,
        params: P,
        body: B,
        query: Q,
        handler: F,
    ) -> Result<Value, PipelineError<E>>
    where
        P: FnOnce() -> Result<Value, E>,
        B: FnOnce() -> Result<Value, E>,
        Q: FnOnce() -> Result<Value, E>,
        F: FnOnce(Value, Value, Value) -> Result<Value, E>,
    {
        let params = self.decode_and_check(Stage::Params, params)?;
        let body = self.decode_and_check(Stage::Body, body)?;
        let query = self.decode_and_check(Stage::Query, query)?;

        let output = handler(params, body, query).map_err(PipelineError::Handler)?;

        self.check(Stage::Response, output)
            .map_err(PipelineError::Rejected)
    }

    fn decode_and_check<D, E>(&self, stage: Stage, decode: D) -> Result<Value, PipelineError<E>>
    where
        D: FnOnce() -> Result<Value, E>,
    {
        let value = decode().map_err(|e| PipelineError::Decode(stage, e))?;
        self.check(stage, value).map_err(PipelineError::Rejected)
    }
}
