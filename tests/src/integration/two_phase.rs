//! # Two-Phase Submission Flows
//!
//! `POST prepare/:name` parks a transaction and returns a request id;
//! `POST contract/:request_id` consumes it exactly once, before expiry.
//!
//! ## Flows Tested:
//!
//! 1. **prepare → submit**: the signed transaction reaches the engine once
//! 2. **at-most-once**: replays and concurrent submits lose with E_EXPIREDREQUEST
//! 3. **expiry**: entries are dead one tick after their TTL, without a sweep
//! 4. **guard ordering**: a chain update refuses submits without consuming
//! 5. **multi**: batches behave like single requests under one id

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use admission_gateway::GatewayConfig;
    use axum::http::StatusCode;
    use axum::Router;
    use serde_json::{json, Value};
    use std::time::Duration;

    // =============================================================================
    // HELPERS
    // =============================================================================

    async fn prepare(router: &Router, contract: &str, body: Value) -> Value {
        let reply = send(router, post_json(&format!("prepare/{contract}"), Some(TOKEN), body)).await;
        assert_eq!(reply.status, StatusCode::OK, "{:?}", reply.body);
        reply.json()
    }

    fn submit_request(prepared: &Value, signature: &str) -> axum::http::Request<axum::body::Body> {
        let request_id = prepared["request_id"].as_str().unwrap();
        post_json(
            &format!("contract/{request_id}"),
            Some(TOKEN),
            json!({
                "signature": signature,
                "time": prepared["time"],
            }),
        )
    }

    // =============================================================================
    // SINGLE REQUESTS
    // =============================================================================

    #[tokio::test]
    async fn test_prepare_then_submit() {
        let harness = Harness::new();
        let router = harness.router();

        let prepared = prepare(
            &router,
            "NewToken",
            json!({ "Amount": "100", "token_ecosystem": 2 }),
        )
        .await;
        let time = prepared["time"].as_str().unwrap();
        assert_eq!(prepared["forsign"], format!("NewToken,{time}"));
        assert!(prepared["expiration"].as_str().unwrap().contains('T'));

        let reply = send(&router, submit_request(&prepared, "0xdeadbeef")).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.json()["hash"].as_str().unwrap().len(), 64);

        let submitted = harness.engine.submitted();
        assert_eq!(submitted.len(), 1);
        let (contract, submission) = &submitted[0];
        assert_eq!(contract.call.contract, "NewToken");
        assert_eq!(contract.call.params["Amount"], "100");
        assert_eq!(contract.call.token_ecosystem, Some(2));
        assert_eq!(submission.signature, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(submission.pubkey, None);
    }

    #[tokio::test]
    async fn test_submit_options_override_prepared() {
        let harness = Harness::new();
        let router = harness.router();

        let prepared = prepare(&router, "Pay", json!({ "max_sum": "10" })).await;
        let request_id = prepared["request_id"].as_str().unwrap();
        let reply = send(
            &router,
            post_form(
                &format!("contract/{request_id}"),
                Some(TOKEN),
                &[
                    ("signature", "ab"),
                    ("pubkey", "cd"),
                    ("time", prepared["time"].as_str().unwrap()),
                    ("max_sum", "25"),
                    ("payover", "3"),
                ],
            ),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);

        let (contract, submission) = harness.engine.submitted().remove(0);
        assert_eq!(contract.call.max_sum.as_deref(), Some("25"));
        assert_eq!(contract.call.payover.as_deref(), Some("3"));
        assert_eq!(submission.pubkey, Some(vec![0xcd]));
    }

    #[tokio::test]
    async fn test_second_submit_is_expired() {
        let harness = Harness::new();
        let router = harness.router();
        let prepared = prepare(&router, "NewToken", json!({})).await;

        let first = send(&router, submit_request(&prepared, "01")).await;
        assert_eq!(first.status, StatusCode::OK);

        let second = send(&router, submit_request(&prepared, "01")).await;
        assert_eq!(second.status, StatusCode::NOT_FOUND);
        assert_eq!(second.error(), "E_EXPIREDREQUEST");
        assert_eq!(harness.engine.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_submits_single_winner() {
        let harness = Harness::new();
        let router = harness.router();
        let prepared = prepare(&router, "NewToken", json!({})).await;

        let submits = (0..16).map(|_| send(&router, submit_request(&prepared, "02")));
        let replies = futures::future::join_all(submits).await;

        let winners = replies.iter().filter(|r| r.status == StatusCode::OK).count();
        let expired = replies
            .iter()
            .filter(|r| r.status == StatusCode::NOT_FOUND && r.error() == "E_EXPIREDREQUEST")
            .count();
        assert_eq!(winners, 1);
        assert_eq!(expired, 15);
        assert_eq!(harness.engine.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_expiry_without_sweep() {
        let harness = Harness::new();
        let mut config = GatewayConfig::default();
        config.buffer.ttl = Duration::from_secs(5);
        let router = harness.service(config).router();

        let on_time = prepare(&router, "NewToken", json!({})).await;
        let late = prepare(&router, "NewToken", json!({})).await;

        // Valid up to and including the TTL
        harness.clock.advance(Duration::from_secs(5));
        let reply = send(&router, submit_request(&on_time, "03")).await;
        assert_eq!(reply.status, StatusCode::OK);

        harness.clock.advance(Duration::from_secs(1));
        let reply = send(&router, submit_request(&late, "03")).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(reply.error(), "E_EXPIREDREQUEST");
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids() {
        let router = Harness::new().router();
        let body = json!({ "signature": "01", "time": "1700000000" });

        let unknown = send(
            &router,
            post_json(
                "contract/0190a3f2-7c4e-7000-8000-000000000000",
                Some(TOKEN),
                body.clone(),
            ),
        )
        .await;
        assert_eq!(unknown.status, StatusCode::NOT_FOUND);
        assert_eq!(unknown.error(), "E_EXPIREDREQUEST");

        let malformed = send(&router, post_json("contract/not-an-id", Some(TOKEN), body)).await;
        assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
        assert_eq!(malformed.error(), "E_INVALIDPARAMS");
    }

    #[tokio::test]
    async fn test_wrong_time_keeps_request() {
        let harness = Harness::new();
        let router = harness.router();
        let prepared = prepare(&router, "NewToken", json!({})).await;
        let request_id = prepared["request_id"].as_str().unwrap();

        let reply = send(
            &router,
            post_json(
                &format!("contract/{request_id}"),
                Some(TOKEN),
                json!({ "signature": "01", "time": "1" }),
            ),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.error(), "E_INVALIDPARAMS");

        let reply = send(&router, submit_request(&prepared, "01")).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_signature_keeps_request() {
        let harness = Harness::new();
        let router = harness.router();
        let prepared = prepare(&router, "NewToken", json!({})).await;
        let request_id = prepared["request_id"].as_str().unwrap();

        let reply = send(
            &router,
            post_json(
                &format!("contract/{request_id}"),
                Some(TOKEN),
                json!({ "time": prepared["time"] }),
            ),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert!(reply.json()["msg"].as_str().unwrap().contains("signature"));

        let reply = send(&router, submit_request(&prepared, "01")).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_chain_update_refuses_without_consuming() {
        let harness = Harness::new();
        let router = harness.router();
        let prepared = prepare(&router, "NewToken", json!({})).await;

        harness.chain.set_updating(true);
        let reply = send(&router, submit_request(&prepared, "04")).await;
        assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(reply.error(), "E_UNAVAILABLE");
        assert!(harness.engine.submitted().is_empty());

        harness.chain.set_updating(false);
        let reply = send(&router, submit_request(&prepared, "04")).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_engine_refusal_is_relayed() {
        let router = Harness::new().router();
        let reply = send(&router, post_json("prepare/Forbidden", Some(TOKEN), json!({}))).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.json(), json!({ "type": "panic", "error": "Access denied" }));
        assert_eq!(&reply.body[..], br#"{"type":"panic","error":"Access denied"}"#);
    }

    #[tokio::test]
    async fn test_prepare_requires_wallet() {
        let router = Harness::new().router();

        let reply = send(&router, post_json("prepare/NewToken", None, json!({}))).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.error(), "E_UNAUTHORIZED");

        let reply = send(&router, post_json("prepare/NewToken", Some("stolen"), json!({}))).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_node_contract_needs_no_wallet() {
        let router = Harness::new().router();
        let reply = send(&router, post_json("node/UpdateSysParam", None, json!({}))).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.json()["hash"].as_str().unwrap().len(), 64);
    }

    // =============================================================================
    // BATCHES
    // =============================================================================

    async fn prepare_batch(router: &Router) -> Value {
        let data = json!({
            "contracts": [
                { "contract": "NewToken", "params": { "Amount": 5 } },
                { "contract": "Pay", "params": { "Recipient": "0x01" } },
            ]
        });
        let reply = send(
            router,
            post_json("prepareMultiple", Some(TOKEN), json!({ "data": data.to_string() })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK, "{:?}", reply.body);
        reply.json()
    }

    fn submit_batch(prepared: &Value, signatures: &[&str]) -> axum::http::Request<axum::body::Body> {
        let request_id = prepared["request_id"].as_str().unwrap();
        let data = json!({ "signatures": signatures, "time": prepared["time"] });
        post_json(
            &format!("contractMultiple/{request_id}"),
            Some(TOKEN),
            json!({ "data": data.to_string() }),
        )
    }

    #[tokio::test]
    async fn test_batch_prepare_then_submit() {
        let harness = Harness::new();
        let router = harness.router();

        let prepared = prepare_batch(&router).await;
        assert_eq!(prepared["forsign"].as_array().unwrap().len(), 2);

        let reply = send(&router, submit_batch(&prepared, &["0a", "0b"])).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.json()["hashes"].as_array().unwrap().len(), 2);

        let submitted = harness.engine.submitted();
        let order: Vec<&str> = submitted
            .iter()
            .map(|(p, _)| p.call.contract.as_str())
            .collect();
        assert_eq!(order, vec!["NewToken", "Pay"]);
        assert_eq!(submitted[0].0.call.params["Amount"], "5");

        let replay = send(&router, submit_batch(&prepared, &["0a", "0b"])).await;
        assert_eq!(replay.status, StatusCode::NOT_FOUND);
        assert_eq!(replay.error(), "E_EXPIREDREQUEST");
    }

    #[tokio::test]
    async fn test_batch_signature_count_must_match() {
        let harness = Harness::new();
        let router = harness.router();
        let prepared = prepare_batch(&router).await;

        let reply = send(&router, submit_batch(&prepared, &["0a"])).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert!(harness.engine.submitted().is_empty());

        let reply = send(&router, submit_batch(&prepared, &["0a", "0b"])).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_batch_expires() {
        let harness = Harness::new();
        let router = harness.router();
        let prepared = prepare_batch(&router).await;

        harness.clock.advance(GatewayConfig::default().buffer.ttl + Duration::from_secs(1));
        let reply = send(&router, submit_batch(&prepared, &["0a", "0b"])).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(reply.error(), "E_EXPIREDREQUEST");
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let router = Harness::new().router();
        let data = json!({ "contracts": [] }).to_string();
        let reply = send(
            &router,
            post_json("prepareMultiple", Some(TOKEN), json!({ "data": data })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.error(), "E_INVALIDPARAMS");
    }
}
