//! # Test Fixtures
//!
//! In-memory stand-ins for the node components behind the gateway ports,
//! plus helpers to send requests through a router without a socket.

use admission_gateway::domain::{
    ContractCall, PreparedContract, RequestContext, Session, Submission,
};
use admission_gateway::ports::{
    BinaryStore, BusinessBackend, ChainState, Clock, ContractEngine, ManualClock,
    SessionAuthenticator,
};
use admission_gateway::{ApiError, ApiResult, Collaborators, GatewayConfig, GatewayService};
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// Token accepted by `FakeAuthenticator`
pub const TOKEN: &str = "wallet-token";

pub const API: &str = "/api/v2/";

pub fn session() -> Session {
    Session {
        key_id: -42,
        ecosystem_id: 1,
        role_id: 0,
    }
}

/// Contract engine that signs nothing and records every submission.
#[derive(Default)]
pub struct FakeEngine {
    submitted: Mutex<Vec<(PreparedContract, Submission)>>,
}

impl FakeEngine {
    pub fn submitted(&self) -> Vec<(PreparedContract, Submission)> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl ContractEngine for FakeEngine {
    async fn prepare(
        &self,
        _session: &Session,
        call: &ContractCall,
        time: &str,
    ) -> ApiResult<PreparedContract> {
        if call.contract == "Forbidden" {
            return Err(ApiError::access_denied());
        }
        Ok(PreparedContract {
            call: call.clone(),
            for_sign: format!("{},{}", call.contract, time),
            time: time.to_string(),
        })
    }

    async fn submit(
        &self,
        _session: &Session,
        prepared: PreparedContract,
        submission: Submission,
    ) -> ApiResult<String> {
        let hash = hex::encode(Keccak256::digest(&submission.signature));
        self.submitted.lock().push((prepared, submission));
        Ok(hash)
    }

    async fn submit_as_node(&self, call: &ContractCall) -> ApiResult<String> {
        Ok(hex::encode(Keccak256::digest(call.contract.as_bytes())))
    }
}

pub struct FakeAuthenticator;

#[async_trait]
impl SessionAuthenticator for FakeAuthenticator {
    async fn authenticate(&self, token: &str) -> ApiResult<Session> {
        if token == TOKEN {
            Ok(session())
        } else {
            Err(ApiError::unauthorized("unknown token"))
        }
    }
}

#[derive(Default)]
pub struct FakeChain {
    updating: AtomicBool,
}

impl FakeChain {
    pub fn set_updating(&self, updating: bool) {
        self.updating.store(updating, Ordering::SeqCst);
    }
}

impl ChainState for FakeChain {
    fn is_updating(&self) -> bool {
        self.updating.load(Ordering::SeqCst)
    }
}

/// Answers every business endpoint with what it was called with
pub struct EchoBackend;

#[async_trait]
impl BusinessBackend for EchoBackend {
    async fn call(&self, endpoint: &str, ctx: &RequestContext) -> ApiResult<Value> {
        Ok(json!({
            "endpoint": endpoint,
            "path": ctx.path,
            "form": ctx.form,
            "key_id": ctx.session.as_ref().map(|s| s.key_id),
        }))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    columns: Mutex<HashMap<(String, i64, String), Vec<u8>>>,
}

impl MemoryStore {
    pub fn insert(&self, table: &str, id: i64, column: &str, data: &[u8]) {
        self.columns
            .lock()
            .insert((table.to_string(), id, column.to_string()), data.to_vec());
    }
}

#[async_trait]
impl BinaryStore for MemoryStore {
    async fn fetch(&self, table: &str, id: i64, column: &str) -> ApiResult<Option<Vec<u8>>> {
        Ok(self
            .columns
            .lock()
            .get(&(table.to_string(), id, column.to_string()))
            .cloned())
    }
}

/// Collaborators plus handles to inspect or steer them
pub struct Harness {
    pub engine: Arc<FakeEngine>,
    pub chain: Arc<FakeChain>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            engine: Arc::new(FakeEngine::default()),
            chain: Arc::new(FakeChain::default()),
            store: Arc::new(MemoryStore::default()),
            clock: Arc::new(ManualClock::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            engine: self.engine.clone(),
            authenticator: Arc::new(FakeAuthenticator),
            chain: self.chain.clone(),
            backend: Arc::new(EchoBackend),
            store: self.store.clone(),
        }
    }

    /// Service on the harness clock
    pub fn service(&self, config: GatewayConfig) -> GatewayService {
        let clock: Arc<dyn Clock> = self.clock.clone();
        GatewayService::with_clock(config, self.collaborators(), clock)
            .expect("valid test configuration")
    }

    pub fn router(&self) -> Router {
        self.service(GatewayConfig::default()).router()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Response as seen by a client
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("JSON body")
    }

    /// Error code of an error response
    pub fn error(&self) -> String {
        self.json()["error"].as_str().unwrap_or_default().to_string()
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> Reply {
    let response = router.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    Reply {
        status,
        headers,
        body,
    }
}

fn builder(method: Method, path: &str, token: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder()
        .method(method)
        .uri(format!("{API}{path}"));
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

pub fn get(path: &str, token: Option<&str>) -> Request<Body> {
    builder(Method::GET, path, token)
        .body(Body::empty())
        .expect("request")
}

pub fn options(path: &str) -> Request<Body> {
    builder(Method::OPTIONS, path, None)
        .body(Body::empty())
        .expect("request")
}

pub fn post_json(path: &str, token: Option<&str>, body: Value) -> Request<Body> {
    builder(Method::POST, path, token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

/// Urlencoded body; values must not need escaping
pub fn post_form(path: &str, token: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    builder(Method::POST, path, token)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .expect("request")
}
