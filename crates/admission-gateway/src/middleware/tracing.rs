//! Request tracing middleware.
//!
//! Opens an `api_request` span per request carrying the HTTP method, target
//! and matched route pattern. The status and latency are recorded once the
//! response is out; server errors are logged at `warn!`.

use super::BoxResponseFuture;
use axum::{body::Body, extract::MatchedPath, http::Request, response::Response};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{debug, field, info_span, warn, Instrument, Span};

#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = RequestSpan<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestSpan { inner }
    }
}

#[derive(Clone)]
pub struct RequestSpan<S> {
    inner: S,
}

fn request_span(req: &Request<Body>) -> Span {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or("");

    info_span!(
        "api_request",
        http.method = %req.method(),
        http.target = %req.uri().path(),
        http.route = route,
        http.status = field::Empty,
        elapsed_ms = field::Empty,
    )
}

impl<S> Service<Request<Body>> for RequestSpan<S>
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
        let span = request_span(&req);
        let started = Instant::now();
        let response = self.inner.clone().call(req);

        Box::pin(
            async move {
                let response = response.await?;
                let status = response.status();
                let elapsed_ms = started.elapsed().as_millis() as u64;

                let span = Span::current();
                span.record("http.status", status.as_u16());
                span.record("elapsed_ms", elapsed_ms);
                if status.is_server_error() {
                    warn!(status = status.as_u16(), "Request failed");
                } else {
                    debug!("Request finished");
                }
                Ok::<_, S::Error>(response)
            }
            .instrument(span),
        )
    }
}
