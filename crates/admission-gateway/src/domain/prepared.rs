//! Prepared transaction state held between the prepare and submit phases.

use crate::domain::request_id::RequestId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One in-flight prepare outcome awaiting its submit.
///
/// Lifecycle: created by a prepare call, then either consumed by exactly one
/// submit or expired once `now > expires_at`. Both ends are terminal.
#[derive(Debug, Clone)]
pub struct PreparedRequest<T> {
    pub request_id: RequestId,
    pub payload: T,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl<T> PreparedRequest<T> {
    pub fn new(request_id: RequestId, payload: T, now: Instant, ttl: Duration) -> Self {
        Self {
            request_id,
            payload,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    /// Time left before expiry (zero once expired)
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// A contract invocation as requested by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    /// Contract name
    pub contract: String,
    /// Contract arguments, as submitted
    pub params: HashMap<String, String>,
    /// Ecosystem whose token pays for execution
    pub token_ecosystem: Option<i64>,
    /// Spending cap
    pub max_sum: Option<String>,
    /// Priority surcharge
    pub payover: Option<String>,
}

/// Transaction prepared by the contract engine, waiting for the client's
/// signature over `for_sign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedContract {
    pub call: ContractCall,
    /// Exact string the client has to sign
    pub for_sign: String,
    /// Unix time stamped at preparation; the submit must echo it
    pub time: String,
}

/// Client signature delivered with the submit phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub signature: Vec<u8>,
    pub pubkey: Option<Vec<u8>>,
}
