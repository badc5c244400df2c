//! Chain-state guard.
//!
//! Refuses every request while the node is applying blocks. The route
//! composer puts one shared instance at the head of every pipeline.

use crate::domain::context::RequestContext;
use crate::domain::error::{ApiError, ApiResult};
use crate::middleware::chain::{ApiHandler, Flow};
use crate::ports::ChainState;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Retry hint while the chain is updating
const UPDATING_RETRY_MS: u64 = 1000;

pub struct ChainGuard {
    chain: Arc<dyn ChainState>,
}

impl ChainGuard {
    pub fn new(chain: Arc<dyn ChainState>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl ApiHandler for ChainGuard {
    fn name(&self) -> &'static str {
        "chain_guard"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> ApiResult<Flow> {
        if self.chain.is_updating() {
            debug!(route = %ctx.route, "Refused while blockchain is updating");
            return Err(ApiError::unavailable(
                "blockchain is being updated",
                Some(UPDATING_RETRY_MS),
            ));
        }
        Ok(Flow::Next)
    }
}
