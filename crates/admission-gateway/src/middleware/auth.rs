//! Wallet authentication middleware.
//!
//! Reads the `Authorization: Bearer <token>` header captured on the request
//! context and resolves it into a wallet session.

use crate::domain::context::RequestContext;
use crate::domain::error::{ApiError, ApiResult};
use crate::middleware::chain::{ApiHandler, Flow};
use crate::ports::SessionAuthenticator;
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct WalletAuth {
    authenticator: Arc<dyn SessionAuthenticator>,
}

impl WalletAuth {
    pub fn new(authenticator: Arc<dyn SessionAuthenticator>) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl ApiHandler for WalletAuth {
    fn name(&self) -> &'static str {
        "auth_wallet"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> ApiResult<Flow> {
        let Some(token) = ctx.bearer_token.as_deref() else {
            warn!(route = %ctx.route, "Wallet route called without a token");
            return Err(ApiError::unauthorized("authorization token is required"));
        };

        let session = self.authenticator.authenticate(token).await?;
        debug!(
            key_id = session.key_id,
            ecosystem_id = session.ecosystem_id,
            "Wallet session resolved"
        );
        ctx.session = Some(session);
        Ok(Flow::Next)
    }
}

/// Extract the bearer token from request headers
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
