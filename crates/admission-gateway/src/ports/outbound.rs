//! Outbound ports for the admission gateway.
//!
//! The contract engine, session store, chain state and binary column store
//! live outside this crate; the gateway only sees these traits.

use crate::domain::context::{RequestContext, Session};
use crate::domain::error::ApiResult;
use crate::domain::prepared::{ContractCall, PreparedContract, Submission};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Real monotonic clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Used for deterministic expiry tests.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

/// Contract execution engine: builds transactions and pushes them to the chain.
///
/// Permission refusals and execution failures come back as
/// `ApiError::downstream` and are relayed to the client untouched.
#[async_trait]
pub trait ContractEngine: Send + Sync {
    /// Build the transaction for `call`, stamped with `time`.
    async fn prepare(
        &self,
        session: &Session,
        call: &ContractCall,
        time: &str,
    ) -> ApiResult<PreparedContract>;

    /// Sign-check and submit a prepared transaction; returns its hash.
    async fn submit(
        &self,
        session: &Session,
        prepared: PreparedContract,
        submission: Submission,
    ) -> ApiResult<String>;

    /// Submit a batch in order. Stops at the first failure.
    async fn submit_multiple(
        &self,
        session: &Session,
        batch: Vec<(PreparedContract, Submission)>,
    ) -> ApiResult<Vec<String>> {
        let mut hashes = Vec::with_capacity(batch.len());
        for (prepared, submission) in batch {
            hashes.push(self.submit(session, prepared, submission).await?);
        }
        Ok(hashes)
    }

    /// Prepare and submit in one step, signed with the node key.
    async fn submit_as_node(&self, call: &ContractCall) -> ApiResult<String>;
}

/// Resolves bearer tokens into wallet sessions
#[async_trait]
pub trait SessionAuthenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> ApiResult<Session>;
}

/// Blockchain state as seen by the request guard
pub trait ChainState: Send + Sync {
    /// True while the node is applying blocks and must not admit requests
    fn is_updating(&self) -> bool;
}

/// Business endpoints (contract lookup, tables, pages, history...)
#[async_trait]
pub trait BusinessBackend: Send + Sync {
    async fn call(&self, endpoint: &str, ctx: &RequestContext) -> ApiResult<serde_json::Value>;
}

/// Raw binary column storage
#[async_trait]
pub trait BinaryStore: Send + Sync {
    async fn fetch(&self, table: &str, id: i64, column: &str) -> ApiResult<Option<Vec<u8>>>;
}
