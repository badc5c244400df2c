//! Request input collection.
//!
//! Merges query string and body into the flat name/value form that route
//! contracts validate. Body values win over query values of the same name.

use crate::domain::error::{ApiError, ApiResult};
use axum::extract::{FromRequest, Query, Request};
use axum::http::{header, Method};
use axum::{Form, Json};
use std::collections::HashMap;
use tracing::warn;

/// Collect every query and body input of `request`.
///
/// Bodies are read for non-GET requests when they are
/// `application/x-www-form-urlencoded` or a JSON object.
pub async fn collect_params(request: Request) -> ApiResult<HashMap<String, String>> {
    let mut form = match request.uri().query() {
        Some(_) => {
            let Query(query) = Query::<HashMap<String, String>>::try_from_uri(request.uri())
                .map_err(|e| ApiError::invalid_params(e.body_text()))?;
            query
        }
        None => HashMap::new(),
    };

    if request.method() == Method::GET || request.method() == Method::HEAD {
        return Ok(form);
    }

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") {
        let Json(body) = Json::<serde_json::Value>::from_request(request, &())
            .await
            .map_err(|e| {
                warn!(error = %e.body_text(), "Rejected JSON body");
                ApiError::invalid_params(e.body_text())
            })?;
        form.extend(json_to_form(body)?);
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(body) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(|e| ApiError::invalid_params(e.body_text()))?;
        form.extend(body);
    }

    Ok(form)
}

/// Flatten a JSON object into string values.
///
/// Strings are taken as is, other scalars in their JSON text form, nested
/// arrays and objects as JSON text. Nulls are dropped.
pub fn json_to_form(body: serde_json::Value) -> ApiResult<HashMap<String, String>> {
    let serde_json::Value::Object(object) = body else {
        return Err(ApiError::invalid_params("request body must be a JSON object"));
    };

    Ok(object
        .into_iter()
        .filter_map(|(name, value)| {
            let text = match value {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            Some((name, text))
        })
        .collect())
}
