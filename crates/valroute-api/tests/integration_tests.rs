//! # Integration Tests for valroute-api
//!
//! Drives the assembled router with `oneshot` requests: the todo route's
//! success and rejection paths, stage ordering, response-schema
//! enforcement on custom routes, health probes and metrics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use valroute_api::state::AppState;
use valroute_api::{handler_fn, register_validated_route, ValidatedRouter};
use valroute_schema::{RouteSchemas, SchemaRegistry};

/// Helper: build the full app over the embedded schemas.
fn test_app() -> Router {
    let state = AppState::try_new().unwrap();
    valroute_api::app(state).unwrap()
}

/// Helper: a registry with the todo schemas plus a query schema.
fn test_registry() -> Arc<SchemaRegistry> {
    let mut docs = valroute_api::routes::todo::embedded_schemas().unwrap();
    docs.push((
        "paging",
        json!({
            "type": "object",
            "properties": { "limit": { "type": "string", "pattern": "^[0-9]+$" } },
            "required": ["limit"]
        }),
    ));
    Arc::new(SchemaRegistry::from_documents(docs).unwrap())
}

fn put_todo(id: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::PUT)
        .uri(format!("/todo/{id}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Helper: read response body as JSON.
async fn body_json(response: axum::http::Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Helper: read response body as string.
async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// -- Todo route ---------------------------------------------------------------

#[tokio::test]
async fn test_put_todo_absent_completed_returns_true() {
    let response = test_app()
        .oneshot(put_todo("1", r#"{"message":"todo"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"id": "1", "message": "todo", "completed": true})
    );
}

#[tokio::test]
async fn test_put_todo_completed_true_returns_false() {
    let response = test_app()
        .oneshot(put_todo("1", r#"{"message":"todo","completed":true}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"id": "1", "message": "todo", "completed": false})
    );
}

#[tokio::test]
async fn test_put_todo_is_idempotent() {
    let app = test_app();
    let first = app
        .clone()
        .oneshot(put_todo("42", r#"{"message":"again"}"#))
        .await
        .unwrap();
    let second = app
        .oneshot(put_todo("42", r#"{"message":"again"}"#))
        .await
        .unwrap();
    assert_eq!(body_json(first).await, body_json(second).await);
}

#[tokio::test]
async fn test_put_todo_missing_message_rejected_at_body() {
    let response = test_app().oneshot(put_todo("1", "{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["stage"], "body");
    assert_eq!(body["error"]["details"]["schema"], "todo-body");
    assert_eq!(body["error"]["details"]["value"], json!({}));
}

#[tokio::test]
async fn test_put_todo_empty_body_rejected_at_body() {
    let response = test_app().oneshot(put_todo("1", "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["details"]["stage"], "body");
}

#[tokio::test]
async fn test_put_todo_wrong_completed_type_rejected() {
    let response = test_app()
        .oneshot(put_todo("1", r#"{"message":"todo","completed":"yes"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(
        body["error"]["details"]["violations"][0]["instance_path"],
        "/completed"
    );
}

#[tokio::test]
async fn test_put_todo_malformed_json_is_bad_request() {
    let response = test_app()
        .oneshot(put_todo("1", "{ not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_get_todo_is_method_not_allowed() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/todo/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(response).await["error"]["code"], "METHOD_NOT_ALLOWED");
}

#[tokio::test]
async fn test_post_liveness_is_method_not_allowed() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/health/liveness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(response).await["error"]["code"], "METHOD_NOT_ALLOWED");
}

#[tokio::test]
async fn test_put_todo_oversized_body_is_payload_too_large() {
    let message = "x".repeat(3 * 1024 * 1024);
    let body = json!({ "message": message }).to_string();
    let response = test_app().oneshot(put_todo("1", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = test_app()
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
}

// -- Stage ordering on custom routes ------------------------------------------

/// `/items` has no path variable, so the todo-params schema (which
/// requires `id`) rejects every request at the params stage.
fn params_always_fail(calls: Arc<AtomicUsize>) -> Router {
    let schemas = RouteSchemas::none()
        .with_params("todo-params")
        .with_body("todo-body")
        .with_query("paging");
    register_validated_route(
        Router::new(),
        &test_registry(),
        Method::POST,
        "/items",
        &schemas,
        handler_fn(move |_, body, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            body
        }),
    )
    .unwrap()
}

#[tokio::test]
async fn test_missing_params_short_circuit_body_and_query() {
    let calls = Arc::new(AtomicUsize::new(0));
    // Body and query are invalid too; only the params stage is reported.
    let response = params_always_fail(calls.clone())
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/items")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["details"]["stage"], "params");
    assert_eq!(body["error"]["details"]["value"], json!({}));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_params_rejection_precedes_malformed_body() {
    let calls = Arc::new(AtomicUsize::new(0));
    let response = params_always_fail(calls.clone())
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/items")
                .body(Body::from("{ nope"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["stage"], "params");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

fn search_route(calls: Arc<AtomicUsize>) -> Router {
    let schemas = RouteSchemas::none()
        .with_params("todo-params")
        .with_query("paging");
    register_validated_route(
        Router::new(),
        &test_registry(),
        Method::GET,
        "/lists/{id}/items",
        &schemas,
        handler_fn(move |params, _, query| {
            calls.fetch_add(1, Ordering::SeqCst);
            json!({"list": params["id"], "limit": query["limit"]})
        }),
    )
    .unwrap()
}

#[tokio::test]
async fn test_query_validated_after_params_and_body() {
    let calls = Arc::new(AtomicUsize::new(0));
    let response = search_route(calls.clone())
        .oneshot(
            Request::builder()
                .uri("/lists/a/items?limit=ten")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["details"]["stage"], "query");
    assert_eq!(body["error"]["details"]["schema"], "paging");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_valid_query_reaches_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let response = search_route(calls.clone())
        .oneshot(
            Request::builder()
                .uri("/lists/a/items?limit=10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"list": "a", "limit": "10"}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_lying_handler_fails_response_stage() {
    let router = ValidatedRouter::<()>::new(test_registry())
        .route(
            Method::PUT,
            "/todo/{id}",
            RouteSchemas::none()
                .with_params("todo-params")
                .with_body("todo-body")
                .with_response("todo-response"),
            // Drops `completed`, which the response schema requires.
            handler_fn(|params, body, _| json!({"id": params["id"], "message": body["message"]})),
        )
        .unwrap()
        .into_router();

    let response = router
        .oneshot(put_todo("1", r#"{"message":"todo"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert!(body["error"].get("details").is_none());
}

#[tokio::test]
async fn test_route_without_schemas_accepts_anything() {
    let router = ValidatedRouter::<()>::new(test_registry())
        .route(
            Method::POST,
            "/echo",
            RouteSchemas::none(),
            handler_fn(|_, body, _| body),
        )
        .unwrap()
        .into_router();

    let response = router
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/echo")
                .body(Body::from("[1, \"two\", null]"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([1, "two", null]));
}

// -- Health & metrics ---------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/health/liveness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_probe() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/health/readiness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

#[test]
fn test_app_rejects_registry_without_todo_schemas() {
    let registry = Arc::new(SchemaRegistry::from_documents(Vec::<(String, Value)>::new()).unwrap());
    let state = AppState::with_registry(Default::default(), registry);
    let err = valroute_api::app(state).unwrap_err();
    assert!(err.to_string().contains("/todo/{id}"));
}

#[tokio::test]
async fn test_metrics_count_rejections_by_stage() {
    let app = test_app();
    for request in [
        put_todo("1", r#"{"message":"ok"}"#),
        put_todo("1", "{}"),
        put_todo("2", r#"{"completed":false}"#),
    ] {
        app.clone().oneshot(request).await.unwrap();
    }

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "requests": 3,
            "errors": 2,
            "rejections": {"params": 0, "body": 2, "query": 0, "response": 0}
        })
    );
}
