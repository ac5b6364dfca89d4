//! # Request Metrics
//!
//! In-process atomic counters: total requests, error responses, and
//! validation rejections broken down by pipeline stage. The stage is read
//! from the `Stage` extension [`AppError`](crate::AppError) attaches to
//! its responses.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;
use valroute_schema::Stage;

/// Shared metrics state.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    errors: AtomicU64,
    params_rejections: AtomicU64,
    body_rejections: AtomicU64,
    query_rejections: AtomicU64,
    response_rejections: AtomicU64,
}

/// Point-in-time copy of the counters, served at `/metrics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub rejections: StageCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub params: u64,
    pub body: u64,
    pub query: u64,
    pub response: u64,
}

impl ApiMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return current request count.
    pub fn requests(&self) -> u64 {
        self.inner.requests.load(Ordering::Relaxed)
    }

    /// Return current error count (4xx and 5xx).
    pub fn errors(&self) -> u64 {
        self.inner.errors.load(Ordering::Relaxed)
    }

    /// Return the number of rejections at `stage`.
    pub fn rejections(&self, stage: Stage) -> u64 {
        self.stage_counter(stage).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests(),
            errors: self.errors(),
            rejections: StageCounts {
                params: self.rejections(Stage::Params),
                body: self.rejections(Stage::Body),
                query: self.rejections(Stage::Query),
                response: self.rejections(Stage::Response),
            },
        }
    }

    fn stage_counter(&self, stage: Stage) -> &AtomicU64 {
        match stage {
            Stage::Params => &self.inner.params_rejections,
            Stage::Body => &self.inner.body_rejections,
            Stage::Query => &self.inner.query_rejections,
            Stage::Response => &self.inner.response_rejections,
        }
    }

    fn record(&self, response: &Response) {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            self.inner.errors.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(stage) = response.extensions().get::<Stage>() {
            self.stage_counter(*stage).fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Middleware that updates the counters from each response.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record(&response);
    }

    response
}
