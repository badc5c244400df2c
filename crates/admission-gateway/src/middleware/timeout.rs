//! Request timeout middleware.
//!
//! Bounds the whole request, handler pipeline included. A request that runs
//! out of time is answered with 504 and the `E_TIMEOUT` error body; the
//! handler future is dropped, so a submit that has not yet reached the
//! buffer leaves its prepared entry in place.

use super::BoxResponseFuture;
use crate::domain::error::ApiError;
use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct TimeoutLayer {
    budget: Duration,
}

impl TimeoutLayer {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = RequestBudget<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestBudget {
            inner,
            budget: self.budget,
        }
    }
}

#[derive(Clone)]
pub struct RequestBudget<S> {
    inner: S,
    budget: Duration,
}

fn timed_out(method: &str, path: &str, budget: Duration) -> Response {
    let budget_ms = budget.as_millis();
    warn!(method = method, path = path, budget_ms = budget_ms, "Request timed out");
    ApiError::timeout(format!("request exceeded {budget_ms}ms")).into_response()
}

impl<S> Service<Request<Body>> for RequestBudget<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxResponseFuture<S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let budget = self.budget;
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let response = self.inner.clone().call(req);

        Box::pin(async move {
            tokio::time::timeout(budget, response)
                .await
                .unwrap_or_else(|_| Ok(timed_out(&method, &path, budget)))
        })
    }
}
