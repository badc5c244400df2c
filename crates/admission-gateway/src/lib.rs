// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Admission gateway - typed route contracts, handler pipelines and the
//! prepare/submit transaction buffer of the node's REST API.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          ADMISSION GATEWAY                           │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  Tower layers:  CORS → Tracing → Timeout → Body limit                │
//! │                              │                                       │
//! │  Route table   (method, path shape) → contract + chain               │
//! │                              │                                       │
//! │  Contract      query/body inputs → typed, validated Params           │
//! │                              │                                       │
//! │  Chain         ChainGuard → [WalletAuth] → [ChainGuard] → handler    │
//! │                              │                                       │
//! │  Handlers      prepare ──put──▶ ┌────────────────┐                   │
//! │                                 │ RequestBuffer  │ TTL, at-most-once │
//! │                submit ◀──take── └────────────────┘                   │
//! └──────────────────────────────┼───────────────────────────────────────┘
//!                                │ ports
//!      ContractEngine · SessionAuthenticator · ChainState · BusinessBackend · BinaryStore
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use admission_gateway::{GatewayConfig, GatewayService};
//!
//! let config = GatewayConfig::load("gateway.toml")?;
//! admission_gateway::telemetry::init_tracing(&config.logging)?;
//! let service = GatewayService::new(config, collaborators)?;
//! service.start().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod router;
pub mod service;
pub mod telemetry;

// Re-exports for public API
pub use adapters::{BufferError, MultiRequestBuffer, RequestBuffer};
pub use domain::config::GatewayConfig;
pub use domain::error::{ApiError, ApiResult, ErrorKind, GatewayError, RouteError};
pub use domain::params::{ContractError, ParamContract, ParamKind, ParamSpec, Params};
pub use domain::request_id::RequestId;
pub use ports::Collaborators;
pub use router::{RouteComposer, RouteTable};
pub use service::GatewayService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
