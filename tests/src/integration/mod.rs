//! # Integration Tests
//!
//! Every test builds a `GatewayService` over the in-memory collaborators in
//! `fixtures` and drives it through its axum router, so layers, route
//! contracts and handler chains all run as they do in production.

pub mod two_phase;
