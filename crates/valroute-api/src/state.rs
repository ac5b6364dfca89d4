//! # Application State
//!
//! Configuration read from the environment and the shared schema registry
//! passed to route construction and health probes.

use std::path::PathBuf;
use std::sync::Arc;

use valroute_schema::{SchemaRegistry, SchemaValidationError};

use crate::routes::todo;

/// Default listen port when `PORT` is unset or unparsable.
pub const DEFAULT_PORT: u16 = 3000;

/// Process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Directory to load schemas from. `None` uses the embedded schemas.
    pub schema_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Read `PORT` and `SCHEMA_DIR` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let schema_dir = lookup("SCHEMA_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);
        Self { port, schema_dir }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            schema_dir: None,
        }
    }
}

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// Compiled once here and read-only for the life of the process.
    pub registry: Arc<SchemaRegistry>,
}

impl AppState {
    /// State with the default configuration and the embedded schemas.
    pub fn try_new() -> Result<Self, SchemaValidationError> {
        Self::try_with_config(AppConfig::default())
    }

    /// Load the registry named by `config`.
    ///
    /// # Errors
    ///
    /// Returns the registry's load or compile error.
    pub fn try_with_config(config: AppConfig) -> Result<Self, SchemaValidationError> {
        let registry = match &config.schema_dir {
            Some(dir) => SchemaRegistry::new(dir)?,
            None => SchemaRegistry::from_documents(todo::embedded_schemas()?)?,
        };
        Ok(Self::with_registry(config, Arc::new(registry)))
    }

    /// State over an already-built registry.
    pub fn with_registry(config: AppConfig, registry: Arc<SchemaRegistry>) -> Self {
        Self { config, registry }
    }
}
