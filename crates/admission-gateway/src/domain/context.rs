//! Per-request state threaded through a handler chain.

use crate::domain::error::{ApiError, ApiResult};
use crate::domain::params::Params;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Authenticated wallet session, filled in by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub key_id: i64,
    pub ecosystem_id: i64,
    pub role_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// HTTP method of the matched route
    pub method: String,
    /// Route pattern relative to the api prefix, e.g. `contract/:request_id`
    pub route: String,
    /// Path segments by the route's own parameter names
    pub path: HashMap<String, String>,
    /// Every query/body input as received
    pub form: HashMap<String, String>,
    /// Inputs that passed the route contract
    pub params: Params,
    pub bearer_token: Option<String>,
    pub session: Option<Session>,
}

impl RequestContext {
    pub fn path_param(&self, name: &str) -> ApiResult<&str> {
        self.path
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ApiError::missing_param(name))
    }

    /// Session set by the auth middleware; absent means the route was
    /// registered without it.
    pub fn session(&self) -> ApiResult<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| ApiError::unauthorized("no wallet session"))
    }
}
