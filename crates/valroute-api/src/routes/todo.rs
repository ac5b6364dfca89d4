//! # Todo Route
//!
//! Routes:
//! - PUT /todo/{id}: Echo a todo item with its `completed` flag toggled
//!
//! The toggle is demonstration behaviour for exercising the validation
//! pipeline, not a model for real handlers.

use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use valroute_schema::{SchemaBound, SchemaValidationError};

use crate::route::{RouteError, ValidatedRouter};

const TODO_PARAMS_SCHEMA: &str = include_str!("../../../../schemas/todo-params.schema.json");
const TODO_BODY_SCHEMA: &str = include_str!("../../../../schemas/todo-body.schema.json");
const TODO_RESPONSE_SCHEMA: &str = include_str!("../../../../schemas/todo-response.schema.json");

/// Path parameters of `/todo/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TodoParams {
    pub id: String,
}

impl SchemaBound for TodoParams {
    const SCHEMA: Option<&'static str> = Some("todo-params");
}

/// Request body of `PUT /todo/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TodoBody {
    pub message: String,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl SchemaBound for TodoBody {
    const SCHEMA: Option<&'static str> = Some("todo-body");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoResponse {
    pub id: String,
    pub message: String,
    pub completed: bool,
}

impl SchemaBound for TodoResponse {
    const SCHEMA: Option<&'static str> = Some("todo-response");
}

/// The todo schemas compiled into the binary, keyed by registry name.
pub fn embedded_schemas() -> Result<Vec<(&'static str, Value)>, SchemaValidationError> {
    [
        ("todo-params", TODO_PARAMS_SCHEMA),
        ("todo-body", TODO_BODY_SCHEMA),
        ("todo-response", TODO_RESPONSE_SCHEMA),
    ]
    .into_iter()
    .map(|(name, raw)| {
        serde_json::from_str(raw)
            .map(|value| (name, value))
            .map_err(|e| SchemaValidationError::SchemaLoadError {
                schema_name: name.to_string(),
                reason: format!("invalid embedded JSON: {e}"),
            })
    })
    .collect()
}

/// PUT /todo/{id}: echo `id` and `message`, negate `completed`.
///
/// An absent `completed` counts as `false`, so the reply carries `true`.
pub fn update_todo(params: TodoParams, body: TodoBody, _query: Value) -> TodoResponse {
    TodoResponse {
        id: params.id,
        message: body.message,
        completed: !body.completed.unwrap_or(false),
    }
}

/// Register the todo routes.
pub fn routes<S>(router: ValidatedRouter<S>) -> Result<ValidatedRouter<S>, RouteError>
where
    S: Clone + Send + Sync + 'static,
{
    router.typed_route(Method::PUT, "/todo/{id}", update_todo)
}
