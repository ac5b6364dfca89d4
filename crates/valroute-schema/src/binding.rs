//! # Schema Binding
//!
//! Ties Rust payload types to registry schema names at compile time so
//! route code never spells schema names as loose strings.

use serde_json::Value;

/// A payload type described by a named schema in the registry.
///
/// ```
/// use valroute_schema::SchemaBound;
///
/// #[derive(serde::Deserialize)]
/// struct TodoParams {
///     id: String,
/// }
///
/// impl SchemaBound for TodoParams {
///     const SCHEMA: Option<&'static str> = Some("todo-params");
/// }
/// ```
pub trait SchemaBound {
    /// Registry name of the schema, or `None` to accept any value.
    const SCHEMA: Option<&'static str>;
}

/// Untyped payloads are not checked.
impl SchemaBound for Value {
    const SCHEMA: Option<&'static str> = None;
}

/// The four schema references of one route.
///
/// A `None` reference accepts anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSchemas {
    /// Schema for the path-parameter object.
    pub params: Option<String>,
    /// Schema for the request body.
    pub body: Option<String>,
    /// Schema for the query-parameter object.
    pub query: Option<String>,
    /// Schema for the handler's return value.
    pub response: Option<String>,
}

impl RouteSchemas {
    /// No references: every stage accepts anything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Take all four references from the types' [`SchemaBound`] bindings.
    pub fn bound<P, B, Q, R>() -> Self
    where
        P: SchemaBound,
        B: SchemaBound,
        Q: SchemaBound,
        R: SchemaBound,
    {
        Self {
            params: P::SCHEMA.map(str::to_string),
            body: B::SCHEMA.map(str::to_string),
            query: Q::SCHEMA.map(str::to_string),
            response: R::SCHEMA.map(str::to_string),
        }
    }

    pub fn with_params(mut self, name: impl Into<String>) -> Self {
        self.params = Some(name.into());
        self
    }

    pub fn with_body(mut self, name: impl Into<String>) -> Self {
        self.body = Some(name.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>) -> Self {
        self.query = Some(name.into());
        self
    }

    pub fn with_response(mut self, name: impl Into<String>) -> Self {
        self.response = Some(name.into());
        self
    }
}
