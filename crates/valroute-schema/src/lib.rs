//! # valroute-schema: Schema Registry & Validation Pipeline
//!
//! Framework-independent half of valroute: named JSON Schemas, compiled
//! once, and the fixed-order check sequence each validated route runs.
//!
//! ## Registry (`registry`)
//!
//! [`SchemaRegistry`] loads schema documents from a directory or from
//! memory, compiles them (Draft 2020-12) with local `$ref` resolution, and
//! resolves optional schema references to shared [`BoundSchema`]s. A
//! missing reference resolves to the always-pass schema `{}`.
//!
//! ## Binding (`binding`)
//!
//! [`SchemaBound`] attaches a schema name to a Rust type;
//! [`RouteSchemas`] holds one route's four references.
//!
//! ## Pipeline (`pipeline`)
//!
//! [`RoutePipeline`] checks params → body → query → handler → response and
//! stops at the first [`StageFailure`].
//!
//! ## Crate Policy
//!
//! - No web framework dependency; HTTP mapping lives in `valroute-api`.
//! - Schema compilation happens at construction only, never per request.

pub mod binding;
pub mod pipeline;
pub mod registry;

pub use binding::{RouteSchemas, SchemaBound};
pub use pipeline::{PipelineError, RoutePipeline, Stage, StageFailure};
pub use registry::{
    BoundSchema, SchemaRegistry, SchemaValidationError, ValidationViolations, Violation,
};
