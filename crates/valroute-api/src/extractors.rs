//! # Request Extraction
//!
//! Turns the raw pieces of a request (path parameters, query string, body
//! bytes) into the JSON values the validation pipeline checks. Decoding
//! failures map to [`AppError::BadRequest`]; schema checks happen later.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::extract::{Path, Query};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Path parameters as extracted by axum.
pub type RawParams = Result<Path<HashMap<String, String>>, PathRejection>;

/// Query parameters as extracted by axum. Repeated keys keep the last value.
pub type RawQuery = Result<Query<HashMap<String, String>>, QueryRejection>;

/// Request body bytes as buffered by axum, subject to the body limit.
pub type RawBody = Result<Bytes, BytesRejection>;

/// Path parameters as a JSON object of strings.
///
/// Routes without path variables yield `{}`.
pub fn params_value(result: RawParams) -> Result<Value, AppError> {
    match result {
        Ok(Path(params)) => Ok(string_map(params)),
        Err(PathRejection::MissingPathParams(_)) => Ok(Value::Object(Map::new())),
        Err(err) => Err(AppError::BadRequest(err.body_text())),
    }
}

/// Query parameters as a JSON object of strings.
pub fn query_value(result: RawQuery) -> Result<Value, AppError> {
    result
        .map(|Query(query)| string_map(query))
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// The request body as JSON. An empty body is treated as `{}`.
///
/// A body over the size limit maps to [`AppError::PayloadTooLarge`].
pub fn body_value(result: RawBody) -> Result<Value, AppError> {
    let body = result.map_err(|err| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::BadRequest(err.body_text())
        }
    })?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(&body)
        .map_err(|err| AppError::BadRequest(format!("invalid JSON body: {err}")))
}

fn string_map(map: HashMap<String, String>) -> Value {
    Value::Object(
        map.into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
    )
}
