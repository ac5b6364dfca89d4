//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Pipeline failures are mapped here: rejected client input becomes 422
//! with the failing stage and violations in `details`; a handler whose
//! output breaks its own response schema becomes an opaque 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use valroute_schema::{PipelineError, StageFailure};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Params, body or query rejected by its schema (422).
    #[error("validation error: {0}")]
    Validation(Box<StageFailure>),

    /// Handler output rejected by the response schema (500).
    #[error("response validation error: {0}")]
    ResponseValidation(Box<StageFailure>),

    /// Request could not be decoded into JSON values (422).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request body exceeds the configured limit (413).
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// No route matched (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The path exists but not for this method (405).
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::MethodNotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED"),
            Self::ResponseValidation(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }

    /// The stage failure behind this error, if any.
    pub fn stage_failure(&self) -> Option<&StageFailure> {
        match self {
            Self::Validation(failure) | Self::ResponseValidation(failure) => Some(&**failure),
            _ => None,
        }
    }
}

impl From<StageFailure> for AppError {
    fn from(failure: StageFailure) -> Self {
        if failure.stage.is_client_input() {
            Self::Validation(Box::new(failure))
        } else {
            Self::ResponseValidation(Box::new(failure))
        }
    }
}

impl From<PipelineError<AppError>> for AppError {
    fn from(err: PipelineError<AppError>) -> Self {
        match err {
            PipelineError::Rejected(failure) => failure.into(),
            PipelineError::Decode(_, err) | PipelineError::Handler(err) => err,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) | Self::ResponseValidation(_) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ResponseValidation(failure) => tracing::error!(
                stage = %failure.stage,
                schema = failure.schema_name.as_deref().unwrap_or("(any)"),
                value = %failure.value,
                error = %self,
                "handler output violates its response schema"
            ),
            _ => {}
        }

        let details = match &self {
            Self::Validation(failure) => Some(serde_json::json!({
                "stage": failure.stage,
                "schema": failure.schema_name,
                "value": failure.value,
                "violations": failure.violations,
            })),
            _ => None,
        };

        let stage = self.stage_failure().map(|failure| failure.stage);

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        let mut response = (status, Json(body)).into_response();
        // Read by the metrics middleware to count rejections per stage.
        if let Some(stage) = stage {
            response.extensions_mut().insert(stage);
        }
        response
    }
}
