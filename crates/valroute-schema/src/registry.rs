//! # Schema Registry
//!
//! Loads named JSON Schema documents, compiles each one exactly once, and
//! hands out shared validators for the lifetime of the process.
//!
//! ## Naming
//!
//! A schema file's registry name is its file stem with the schema suffix
//! removed: `todo-body.schema.json` is registered as `todo-body`. YAML
//! documents (`*.schema.yaml`, `*.schema.yml`) are accepted and converted
//! to JSON values before compilation.
//!
//! ## Schema Resolution
//!
//! Cross-schema `$ref`s are resolved locally. A reference may name a
//! schema by its `$id`, by its file name (`todo-params.schema.json`), or
//! by its registry name. Nothing is fetched over the network; a `$ref`
//! that matches no loaded document fails compilation.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonschema::{Retrieve, Uri, Validator};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// File suffixes recognised as schema documents, longest first.
const SCHEMA_SUFFIXES: [&str; 3] = [".schema.json", ".schema.yaml", ".schema.yml"];

/// Resolves `$ref` URIs against the documents held by the registry.
struct LocalSchemaRetriever {
    schemas_by_uri: Arc<HashMap<String, Value>>,
}

impl Retrieve for LocalSchemaRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();
        let without_fragment = uri_str.split('#').next().unwrap_or(uri_str);

        if let Some(value) = self.schemas_by_uri.get(without_fragment) {
            return Ok(value.clone());
        }

        // Relative references arrive joined onto the referencing schema's
        // base URI, so fall back to the last path segment.
        let filename = without_fragment
            .rsplit('/')
            .next()
            .unwrap_or(without_fragment);
        if let Some(value) = self.schemas_by_uri.get(filename) {
            return Ok(value.clone());
        }

        Err(format!("unresolved schema reference: {uri_str}").into())
    }
}

/// Error while loading, compiling, or validating against a schema.
#[derive(Error, Debug)]
pub enum SchemaValidationError {
    /// The document did not conform to the schema.
    #[error("validation failed against schema '{schema_name}':\n{violations}")]
    ValidationFailed {
        /// Name of the schema that was validated against.
        schema_name: String,
        /// Structured list of individual violations.
        violations: ValidationViolations,
    },

    /// No schema is registered under the requested name.
    #[error("schema '{schema_name}' is not registered")]
    SchemaNotFound {
        /// The name that failed to resolve.
        schema_name: String,
    },

    /// The schema file could not be read or parsed.
    #[error("schema load error for '{schema_name}': {reason}")]
    SchemaLoadError {
        /// Schema filename or identifier.
        schema_name: String,
        /// Reason the schema could not be loaded.
        reason: String,
    },

    /// The schema parsed but could not be compiled into a validator.
    #[error("validator build error for schema '{schema_name}': {reason}")]
    ValidatorBuildError {
        /// Schema name.
        schema_name: String,
        /// Reason the validator could not be built.
        reason: String,
    },

    /// IO error reading the schema directory.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single validation violation with structured context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// JSON Pointer path to the violating field in the instance.
    pub instance_path: String,
    /// JSON Pointer path within the schema that triggered the error.
    pub schema_path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.instance_path, self.message)
        }
    }
}

/// Collection of validation violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationViolations {
    violations: Vec<Violation>,
}

impl ValidationViolations {
    /// Collect every violation `validator` reports for `instance`.
    pub fn collect(validator: &Validator, instance: &Value) -> Self {
        let violations = validator
            .iter_errors(instance)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                schema_path: e.schema_path.to_string(),
                message: e.to_string(),
            })
            .collect();
        Self { violations }
    }

    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl From<Vec<Violation>> for ValidationViolations {
    fn from(violations: Vec<Violation>) -> Self {
        Self { violations }
    }
}

impl fmt::Display for ValidationViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// A schema reference resolved against the registry.
///
/// Cloning is cheap: the document and the compiled validator are shared.
#[derive(Clone)]
pub struct BoundSchema {
    name: Option<String>,
    document: Arc<Value>,
    validator: Arc<Validator>,
}

impl BoundSchema {
    /// Registry name, or `None` for the always-pass schema.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The schema document this validator was compiled from.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Returns true if `instance` satisfies the schema.
    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }

    /// Validate `instance`, returning every violation on failure.
    pub fn validate(&self, instance: &Value) -> Result<(), ValidationViolations> {
        if self.validator.is_valid(instance) {
            return Ok(());
        }
        Err(ValidationViolations::collect(&self.validator, instance))
    }
}

impl fmt::Debug for BoundSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundSchema")
            .field("name", &self.name)
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

/// Named schemas, compiled once at construction and read-only afterwards.
///
/// Share it behind an `Arc`; every lookup hands out clones of the
/// already-compiled validators.
pub struct SchemaRegistry {
    /// Directory the schemas were loaded from, if any.
    source_dir: Option<PathBuf>,
    schemas: HashMap<String, BoundSchema>,
    accept_any: BoundSchema,
}

impl SchemaRegistry {
    /// Load and compile every schema file in `schema_dir`.
    ///
    /// Files without a recognised schema suffix are skipped.
    ///
    /// # Errors
    ///
    /// Returns `SchemaLoadError` if the directory or a schema file cannot
    /// be read or parsed, and `ValidatorBuildError` if a schema does not
    /// compile.
    pub fn new(schema_dir: impl AsRef<Path>) -> Result<Self, SchemaValidationError> {
        let schema_dir = schema_dir.as_ref().to_path_buf();

        let entries = std::fs::read_dir(&schema_dir).map_err(|e| {
            SchemaValidationError::SchemaLoadError {
                schema_name: schema_dir.display().to_string(),
                reason: format!("cannot read schema directory: {e}"),
            }
        })?;

        let mut documents = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((name, suffix)) = split_schema_name(file_name) else {
                continue;
            };

            let content = std::fs::read_to_string(&path)?;
            let value: Value = if suffix == ".schema.json" {
                serde_json::from_str(&content).map_err(|e| {
                    SchemaValidationError::SchemaLoadError {
                        schema_name: file_name.to_string(),
                        reason: format!("invalid JSON: {e}"),
                    }
                })?
            } else {
                serde_yaml::from_str(&content).map_err(|e| {
                    SchemaValidationError::SchemaLoadError {
                        schema_name: file_name.to_string(),
                        reason: format!("invalid YAML: {e}"),
                    }
                })?
            };
            documents.push((name.to_string(), value));
        }

        let mut registry = Self::from_documents(documents)?;
        registry.source_dir = Some(schema_dir);
        Ok(registry)
    }

    /// Compile a registry from in-memory `(name, document)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `ValidatorBuildError` for the first document that does not
    /// compile, including unresolvable `$ref`s.
    pub fn from_documents<I, N>(documents: I) -> Result<Self, SchemaValidationError>
    where
        I: IntoIterator<Item = (N, Value)>,
        N: Into<String>,
    {
        let documents: Vec<(String, Value)> = documents
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();

        let mut schemas_by_uri: HashMap<String, Value> = HashMap::new();
        for (name, value) in &documents {
            schemas_by_uri.insert(name.clone(), value.clone());
            schemas_by_uri.insert(format!("{name}.schema.json"), value.clone());
            if let Some(id) = value.get("$id").and_then(Value::as_str) {
                schemas_by_uri.insert(id.to_string(), value.clone());
            }
        }
        let schemas_by_uri = Arc::new(schemas_by_uri);

        let mut schemas = HashMap::with_capacity(documents.len());
        for (name, value) in documents {
            let validator = compile(&name, &value, &schemas_by_uri)?;
            tracing::debug!(schema = %name, "compiled schema");
            schemas.insert(
                name.clone(),
                BoundSchema {
                    name: Some(name),
                    document: Arc::new(value),
                    validator: Arc::new(validator),
                },
            );
        }

        let accept_any = Value::Object(serde_json::Map::new());
        let accept_any = BoundSchema {
            name: None,
            validator: Arc::new(compile("(any)", &accept_any, &schemas_by_uri)?),
            document: Arc::new(accept_any),
        };

        Ok(Self {
            source_dir: None,
            schemas,
            accept_any,
        })
    }

    /// Resolve an optional schema reference.
    ///
    /// `None` resolves to the always-pass schema `{}`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaNotFound` if `name` is not registered.
    pub fn resolve(&self, name: Option<&str>) -> Result<BoundSchema, SchemaValidationError> {
        match name {
            None => Ok(self.accept_any.clone()),
            Some(name) => self.schemas.get(name).cloned().ok_or_else(|| {
                SchemaValidationError::SchemaNotFound {
                    schema_name: name.to_string(),
                }
            }),
        }
    }

    /// Validate a JSON value against a named schema.
    ///
    /// # Errors
    ///
    /// Returns `SchemaNotFound` for an unknown name and `ValidationFailed`
    /// with every violation if the document is invalid.
    pub fn validate_document(
        &self,
        instance: &Value,
        schema_name: &str,
    ) -> Result<(), SchemaValidationError> {
        let schema = self.resolve(Some(schema_name))?;
        schema
            .validate(instance)
            .map_err(|violations| SchemaValidationError::ValidationFailed {
                schema_name: schema_name.to_string(),
                violations,
            })
    }

    /// Directory the schemas were loaded from, if loaded from disk.
    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    /// Returns the number of registered schemas.
    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// Returns true if a schema is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Returns the names of all registered schemas, sorted alphabetically.
    pub fn schema_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up a registered schema document by name.
    pub fn get_schema(&self, name: &str) -> Option<&Value> {
        self.schemas.get(name).map(BoundSchema::document)
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("source_dir", &self.source_dir)
            .field("schemas", &self.schema_names())
            .finish()
    }
}

fn compile(
    name: &str,
    schema: &Value,
    schemas_by_uri: &Arc<HashMap<String, Value>>,
) -> Result<Validator, SchemaValidationError> {
    let mut opts = jsonschema::options();
    opts.with_draft(jsonschema::Draft::Draft202012);
    opts.with_retriever(LocalSchemaRetriever {
        schemas_by_uri: Arc::clone(schemas_by_uri),
    });
    opts.build(schema)
        .map_err(|e| SchemaValidationError::ValidatorBuildError {
            schema_name: name.to_string(),
            reason: e.to_string(),
        })
}

/// Split `todo-body.schema.json` into (`todo-body`, `.schema.json`).
fn split_schema_name(file_name: &str) -> Option<(&str, &'static str)> {
    SCHEMA_SUFFIXES.iter().find_map(|suffix| {
        file_name
            .strip_suffix(suffix)
            .filter(|stem| !stem.is_empty())
            .map(|stem| (stem, *suffix))
    })
}
