//! Business endpoints answered by the backend port.

use crate::domain::context::RequestContext;
use crate::domain::error::ApiResult;
use crate::middleware::chain::{ApiHandler, Flow, Reply, SharedHandler};
use crate::ports::BusinessBackend;
use async_trait::async_trait;
use std::sync::Arc;

/// Terminal handler forwarding the validated request to `endpoint`.
pub struct Delegate {
    endpoint: &'static str,
    backend: Arc<dyn BusinessBackend>,
}

impl Delegate {
    pub fn shared(endpoint: &'static str, backend: &Arc<dyn BusinessBackend>) -> SharedHandler {
        Arc::new(Self {
            endpoint,
            backend: Arc::clone(backend),
        })
    }
}

#[async_trait]
impl ApiHandler for Delegate {
    fn name(&self) -> &'static str {
        self.endpoint
    }

    async fn handle(&self, ctx: &mut RequestContext) -> ApiResult<Flow> {
        let body = self.backend.call(self.endpoint, ctx).await?;
        Ok(Flow::Done(Reply::Json(body)))
    }
}
