//! Ports to the collaborators the gateway depends on.

pub mod outbound;

pub use outbound::{
    BinaryStore, BusinessBackend, ChainState, Clock, ContractEngine, ManualClock,
    SessionAuthenticator, SystemClock,
};

use std::sync::Arc;

/// Everything the gateway needs from the rest of the node.
#[derive(Clone)]
pub struct Collaborators {
    pub engine: Arc<dyn ContractEngine>,
    pub authenticator: Arc<dyn SessionAuthenticator>,
    pub chain: Arc<dyn ChainState>,
    pub backend: Arc<dyn BusinessBackend>,
    pub store: Arc<dyn BinaryStore>,
}
