//! Two-phase contract submission.
//!
//! `prepare` asks the engine to build a transaction and parks it in the
//! request buffer; the client signs `forsign` and calls `contract` with the
//! returned request id, which consumes the parked transaction exactly once.
//! The multi variants do the same for an ordered batch under one id.

use crate::adapters::buffer::{MultiRequestBuffer, RequestBuffer};
use crate::domain::context::RequestContext;
use crate::domain::error::{ApiError, ApiResult};
use crate::domain::prepared::{ContractCall, PreparedContract, Submission};
use crate::domain::request_id::RequestId;
use crate::middleware::chain::{ApiHandler, Flow, Reply, SharedHandler};
use crate::middleware::validation::json_to_form;
use crate::ports::ContractEngine;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Terminal operations of the contract routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractOp {
    /// `POST prepare/:name`
    Prepare,
    /// `POST prepareMultiple`
    PrepareMultiple,
    /// `POST contract/:request_id`
    Submit,
    /// `POST contractMultiple/:request_id`
    SubmitMultiple,
    /// `POST node/:name`
    Node,
}

impl ContractOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Prepare => "prepare_contract",
            Self::PrepareMultiple => "prepare_multiple_contract",
            Self::Submit => "contract",
            Self::SubmitMultiple => "contract_multi",
            Self::Node => "node_contract",
        }
    }
}

/// Engine and buffers shared by all contract routes.
pub struct ContractState {
    engine: Arc<dyn ContractEngine>,
    requests: Arc<RequestBuffer<PreparedContract>>,
    multi_requests: Arc<MultiRequestBuffer<PreparedContract>>,
}

impl ContractState {
    pub fn new(
        engine: Arc<dyn ContractEngine>,
        requests: Arc<RequestBuffer<PreparedContract>>,
        multi_requests: Arc<MultiRequestBuffer<PreparedContract>>,
    ) -> Self {
        Self {
            engine,
            requests,
            multi_requests,
        }
    }

    /// Pipeline step running `op` against this state
    pub fn handler(self: &Arc<Self>, op: ContractOp) -> SharedHandler {
        Arc::new(ContractHandler {
            op,
            state: Arc::clone(self),
        })
    }

    pub fn requests(&self) -> &Arc<RequestBuffer<PreparedContract>> {
        &self.requests
    }

    pub fn multi_requests(&self) -> &Arc<MultiRequestBuffer<PreparedContract>> {
        &self.multi_requests
    }
}

pub struct ContractHandler {
    op: ContractOp,
    state: Arc<ContractState>,
}

#[async_trait]
impl ApiHandler for ContractHandler {
    fn name(&self) -> &'static str {
        self.op.name()
    }

    async fn handle(&self, ctx: &mut RequestContext) -> ApiResult<Flow> {
        let body = match self.op {
            ContractOp::Prepare => self.prepare(ctx).await?,
            ContractOp::PrepareMultiple => self.prepare_multiple(ctx).await?,
            ContractOp::Submit => self.submit(ctx).await?,
            ContractOp::SubmitMultiple => self.submit_multiple(ctx).await?,
            ContractOp::Node => self.node(ctx).await?,
        };
        Ok(Flow::Done(Reply::Json(body)))
    }
}

#[derive(Debug, Deserialize)]
struct PrepareBatch {
    contracts: Vec<BatchEntry>,
}

#[derive(Debug, Deserialize)]
struct BatchEntry {
    contract: String,
    #[serde(default)]
    params: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SubmitBatch {
    signatures: Vec<String>,
    time: String,
    #[serde(default)]
    pubkey: Option<String>,
}

impl ContractHandler {
    #[instrument(skip_all)]
    async fn prepare(&self, ctx: &RequestContext) -> ApiResult<serde_json::Value> {
        let session = ctx.session()?;
        let call = contract_call(ctx.path_param("name")?, ctx);
        let time = unix_time();

        let prepared = self.state.engine.prepare(session, &call, &time).await?;
        let for_sign = prepared.for_sign.clone();
        let request_id = self.state.requests.put(prepared)?;

        info!(request_id = %request_id, key_id = session.key_id, "Prepared contract");
        Ok(json!({
            "request_id": request_id,
            "forsign": for_sign,
            "time": time,
            "expiration": expiration(self.state.requests.ttl())?,
        }))
    }

    #[instrument(skip_all)]
    async fn prepare_multiple(&self, ctx: &RequestContext) -> ApiResult<serde_json::Value> {
        let session = ctx.session()?;
        let batch: PrepareBatch = serde_json::from_str(ctx.params.require_str("data")?)?;
        if batch.contracts.is_empty() {
            return Err(ApiError::invalid_params("data: contracts list is empty"));
        }

        let time = unix_time();
        let mut prepared = Vec::with_capacity(batch.contracts.len());
        for entry in batch.contracts {
            let call = ContractCall {
                contract: entry.contract,
                params: json_to_form(serde_json::Value::Object(entry.params))?,
                ..Default::default()
            };
            prepared.push(self.state.engine.prepare(session, &call, &time).await?);
        }

        let for_sign: Vec<String> = prepared.iter().map(|p| p.for_sign.clone()).collect();
        let count = prepared.len();
        let request_id = self.state.multi_requests.put_multi(prepared)?;

        info!(request_id = %request_id, count = count, "Prepared contract batch");
        Ok(json!({
            "request_id": request_id,
            "forsign": for_sign,
            "time": time,
            "expiration": expiration(self.state.multi_requests.ttl())?,
        }))
    }

    #[instrument(skip_all)]
    async fn submit(&self, ctx: &RequestContext) -> ApiResult<serde_json::Value> {
        let session = ctx.session()?;
        let request_id = request_id(ctx)?;
        let time = ctx.params.require_str("time")?;
        let submission = Submission {
            signature: ctx.params.require_hex("signature")?.to_vec(),
            pubkey: ctx.params.hex("pubkey").map(<[u8]>::to_vec),
        };

        let requests = &self.state.requests;
        let mut prepared = match requests.take_if(&request_id, |p| p.time == time) {
            Some(prepared) => prepared,
            None if requests.is_pending(&request_id) => {
                return Err(ApiError::invalid_params(format!(
                    "time {time} does not match the prepared request"
                )));
            }
            None => {
                warn!(request_id = %request_id, "Submit for unknown or expired request");
                return Err(ApiError::expired_request(request_id));
            }
        };

        override_options(&mut prepared.call, ctx);

        let hash = self.state.engine.submit(session, prepared, submission).await?;
        info!(request_id = %request_id, hash = %hash, "Submitted contract");
        Ok(json!({ "hash": hash }))
    }

    #[instrument(skip_all)]
    async fn submit_multiple(&self, ctx: &RequestContext) -> ApiResult<serde_json::Value> {
        let session = ctx.session()?;
        let request_id = request_id(ctx)?;
        let data: SubmitBatch = serde_json::from_str(ctx.params.require_str("data")?)?;

        let signatures = data
            .signatures
            .iter()
            .map(|s| decode_hex(s))
            .collect::<ApiResult<Vec<_>>>()?;
        let pubkey = data.pubkey.as_deref().map(decode_hex).transpose()?;

        let multi = &self.state.multi_requests;
        let accept = |batch: &[PreparedContract]| {
            batch.len() == signatures.len() && batch.iter().all(|p| p.time == data.time)
        };
        let batch = match multi.take_multi_if(&request_id, accept) {
            Some(batch) => batch,
            None if multi.is_pending(&request_id) => {
                return Err(ApiError::invalid_params(
                    "signatures or time do not match the prepared batch",
                ));
            }
            None => {
                warn!(request_id = %request_id, "Submit for unknown or expired batch");
                return Err(ApiError::expired_request(request_id));
            }
        };

        let submissions = batch
            .into_iter()
            .zip(signatures)
            .map(|(prepared, signature)| {
                (
                    prepared,
                    Submission {
                        signature,
                        pubkey: pubkey.clone(),
                    },
                )
            })
            .collect();

        let hashes = self
            .state
            .engine
            .submit_multiple(session, submissions)
            .await?;
        info!(request_id = %request_id, count = hashes.len(), "Submitted contract batch");
        Ok(json!({ "hashes": hashes }))
    }

    #[instrument(skip_all)]
    async fn node(&self, ctx: &RequestContext) -> ApiResult<serde_json::Value> {
        let call = contract_call(ctx.path_param("name")?, ctx);
        let hash = self.state.engine.submit_as_node(&call).await?;
        debug!(contract = %call.contract, hash = %hash, "Node contract submitted");
        Ok(json!({ "hash": hash }))
    }
}

fn contract_call(name: &str, ctx: &RequestContext) -> ContractCall {
    let mut call = ContractCall {
        contract: name.to_string(),
        params: ctx.form.clone(),
        ..Default::default()
    };
    override_options(&mut call, ctx);
    call
}

/// Apply the fee options present on the request
fn override_options(call: &mut ContractCall, ctx: &RequestContext) {
    if let Some(ecosystem) = ctx.params.int64("token_ecosystem") {
        call.token_ecosystem = Some(ecosystem);
    }
    if let Some(max_sum) = ctx.params.str("max_sum") {
        call.max_sum = Some(max_sum.to_string());
    }
    if let Some(payover) = ctx.params.str("payover") {
        call.payover = Some(payover.to_string());
    }
}

/// Malformed ids are refused before the buffer is consulted
fn request_id(ctx: &RequestContext) -> ApiResult<RequestId> {
    let raw = ctx.path_param("request_id")?;
    raw.parse()
        .map_err(|_| ApiError::invalid_params(format!("request_id {raw:?} is malformed")))
}

fn decode_hex(value: &str) -> ApiResult<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    Ok(hex::decode(digits)?)
}

fn unix_time() -> String {
    chrono::Utc::now().timestamp().to_string()
}

fn expiration(ttl: Duration) -> ApiResult<String> {
    let ttl = chrono::Duration::from_std(ttl).map_err(|e| ApiError::internal(e.to_string()))?;
    Ok((chrono::Utc::now() + ttl).to_rfc3339())
}
