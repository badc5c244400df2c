//! Handler pipelines.
//!
//! A route runs an ordered list of handlers over one `RequestContext`. Each
//! handler either lets the request through to the next one or finishes it
//! with a reply. Middlewares (guard, auth) pass; terminal handlers reply.

use crate::domain::context::RequestContext;
use crate::domain::error::{ApiError, ApiResult};
use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

/// What a handler decided about the request.
#[derive(Debug)]
pub enum Flow {
    /// Hand the request to the next handler
    Next,
    /// Stop here and answer
    Done(Reply),
}

/// Successful response body of a route.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json(serde_json::Value),
    Binary {
        content_type: &'static str,
        body: Vec<u8>,
    },
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Reply::Json(value) => (StatusCode::OK, Json(value)).into_response(),
            Reply::Binary { content_type, body } => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
                body,
            )
                .into_response(),
        }
    }
}

/// One step of a route pipeline.
#[async_trait]
pub trait ApiHandler: Send + Sync {
    /// Short name used in logs and route listings
    fn name(&self) -> &'static str;

    async fn handle(&self, ctx: &mut RequestContext) -> ApiResult<Flow>;
}

pub type SharedHandler = Arc<dyn ApiHandler>;

/// True if both handles point at the same handler instance.
pub fn same_handler(a: &SharedHandler, b: &SharedHandler) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Ordered, immutable handler list of one route.
#[derive(Clone, Default)]
pub struct Chain {
    handlers: Vec<SharedHandler>,
}

impl Chain {
    pub fn new(handlers: Vec<SharedHandler>) -> Self {
        Self { handlers }
    }

    pub fn handlers(&self) -> &[SharedHandler] {
        &self.handlers
    }

    pub fn first(&self) -> Option<&SharedHandler> {
        self.handlers.first()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler names in order, e.g. `["chain_guard", "auth_wallet", "prepare_contract"]`
    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Run the handlers in order until one replies or fails.
    pub async fn run(&self, ctx: &mut RequestContext) -> ApiResult<Reply> {
        for handler in &self.handlers {
            match handler.handle(ctx).await? {
                Flow::Next => continue,
                Flow::Done(reply) => return Ok(reply),
            }
        }
        Err(ApiError::internal(format!(
            "route {} {} has no terminal handler",
            ctx.method, ctx.route
        )))
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
