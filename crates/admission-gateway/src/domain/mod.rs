//! Domain types for the admission gateway.
//!
//! Route contracts, request identifiers, prepared transaction state,
//! configuration and errors. Nothing here touches the network.

pub mod config;
pub mod context;
pub mod error;
pub mod params;
pub mod prepared;
pub mod request_id;

// Re-exports for convenience
pub use config::{BufferConfig, Eviction, GatewayConfig};
pub use context::{RequestContext, Session};
pub use error::{ApiError, ApiResult, ErrorKind, GatewayError, RouteError};
pub use params::{ContractError, ParamContract, ParamKind, ParamSpec, ParamValue, Params};
pub use prepared::{ContractCall, PreparedContract, PreparedRequest, Submission};
pub use request_id::RequestId;
