//! CORS handling.
//!
//! A tower-http CORS layer answers real browser preflights; every `OPTIONS`
//! request under the api prefix also gets a plain 200 with the allow
//! headers, without passing through any route pipeline.

use crate::domain::config::CorsConfig;
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::str::FromStr;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer as TowerCorsLayer};

fn wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v == "*")
}

/// Entries that parse as `T`; the rest are skipped
fn parsed<T: FromStr>(values: &[String]) -> Vec<T> {
    values.iter().filter_map(|v| v.parse().ok()).collect()
}

/// tower-http CORS layer for the configured origins, methods and headers.
/// A disabled config yields a layer that adds no CORS headers.
pub fn create_cors_layer(config: &CorsConfig) -> TowerCorsLayer {
    if !config.enabled {
        return TowerCorsLayer::new();
    }

    let origins = if wildcard(&config.allowed_origins) {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(parsed::<HeaderValue>(&config.allowed_origins))
    };
    let headers = if wildcard(&config.allowed_headers) {
        AllowHeaders::any()
    } else {
        AllowHeaders::list(parsed::<HeaderName>(&config.allowed_headers))
    };

    TowerCorsLayer::new()
        .allow_origin(origins)
        .allow_methods(parsed::<Method>(&config.allowed_methods))
        .allow_headers(headers)
        .max_age(Duration::from_secs(config.max_age))
}

/// Answer for `OPTIONS` on any api path
pub fn preflight_response(config: &CorsConfig) -> Response {
    if !config.enabled {
        return StatusCode::OK.into_response();
    }

    let origin = if wildcard(&config.allowed_origins) {
        "*".to_string()
    } else {
        config.allowed_origins.join(", ")
    };

    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    for (name, value) in [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, origin),
        (
            header::ACCESS_CONTROL_ALLOW_METHODS,
            config.allowed_methods.join(", "),
        ),
        (
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            config.allowed_headers.join(", "),
        ),
        (header::ACCESS_CONTROL_MAX_AGE, config.max_age.to_string()),
    ] {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
    response
}
