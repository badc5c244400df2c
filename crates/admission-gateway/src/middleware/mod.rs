//! Middleware for the admission gateway.
//!
//! Two kinds live here. Route pipeline steps (`ChainGuard`, `WalletAuth`)
//! implement `ApiHandler` and run inside a route's `Chain`. Tower layers
//! (`TracingLayer`, `TimeoutLayer`, CORS) wrap the whole router.
//!
//! Pipeline order: ChainGuard → [WalletAuth] → [ChainGuard] → terminal handler

pub mod auth;
pub mod chain;
pub mod cors;
pub mod guard;
pub mod timeout;
pub mod tracing;
pub mod validation;

pub use auth::{bearer_token, WalletAuth};
pub use chain::{same_handler, ApiHandler, Chain, Flow, Reply, SharedHandler};
pub use cors::{create_cors_layer, preflight_response};
pub use guard::ChainGuard;
pub use timeout::TimeoutLayer;
pub use self::tracing::TracingLayer;
pub use validation::{collect_params, json_to_form};

use axum::response::Response;
use std::future::Future;
use std::pin::Pin;

/// Response future of the tower layers in this module
pub type BoxResponseFuture<E> = Pin<Box<dyn Future<Output = Result<Response, E>> + Send>>;
