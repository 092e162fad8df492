// @file: chart_gateway/src/core/error.rs
// @description: Gateway error taxonomy and its mapping onto JSON HTTP responses.
// @author: LAS.

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use thiserror::Error;


//
// CONSTANTS
//

// HeaderMap only accepts lowercase static names
pub const HEADER_RATE_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_RATE_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RATE_RESET: &str = "x-ratelimit-reset";

const MSG_NOT_CONFIGURED: &str = "Kiwoom API credentials are not configured. Set KIWOOM_API_BASE_URL, KIWOOM_API_APP_KEY and KIWOOM_API_APP_SECRET in .env.local.";
const MSG_UPSTREAM_FAILED: &str = "Kiwoom API request failed.";
const MSG_RATE_LIMITED: &str = "Too many requests. Please try again shortly.";
const MSG_NETWORK: &str = "Could not reach the Kiwoom API.";
const MSG_MALFORMED: &str = "Kiwoom API returned a payload that is not valid JSON.";


//
// TYPE DEFINITIONS
//

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Required upstream credentials are missing or blank.
    #[error("upstream connection is not configured: {0}")]
    Configuration(String),

    /// Final upstream response was not 2xx (after any retries).
    #[error("upstream responded with status {status}")]
    Upstream { status: u16, details: Value },

    /// Upstream answered 2xx with a body that is not JSON.
    #[error("malformed upstream payload: {0}")]
    MalformedPayload(String),

    #[error("rate limit exceeded")]
    RateLimited { limit: Option<u32>, reset_at: Option<i64> },

    /// Transport-level failure talking to the upstream.
    #[error("network failure: {0}")]
    Network(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Rejected at startup, e.g. a zero retry budget.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Counter store failure. Never surfaced to callers (the gate fails open).
    #[error("counter store failure: {0}")]
    Store(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::MalformedPayload(_) | Self::Network(_) => StatusCode::BAD_GATEWAY,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSettings(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body returned to the caller for this error.
    pub fn body(&self) -> Value {
        match self {
            Self::Configuration(_) => json!({ "error": MSG_NOT_CONFIGURED }),
            Self::Upstream { status, details } => json!({
                "error": MSG_UPSTREAM_FAILED,
                "status": status,
                "details": details,
            }),
            Self::MalformedPayload(msg) => json!({ "error": MSG_MALFORMED, "details": msg }),
            Self::RateLimited { .. } => json!({ "error": MSG_RATE_LIMITED }),
            Self::Network(msg) => json!({ "error": MSG_NETWORK, "details": msg }),
            Self::InvalidQuery(msg) => json!({ "error": msg }),
            Self::InvalidSettings(_) | Self::Store(_) => {
                json!({ "error": "Unexpected server error.", "details": self.to_string() })
            }
        }
    }
}


//
// HTTP MAPPING
//

pub fn rate_limit_headers(limit: Option<u32>, remaining: Option<i64>, reset_at: Option<i64>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(limit) = limit {
        headers.insert(HEADER_RATE_LIMIT, HeaderValue::from(limit));
    }
    if let Some(remaining) = remaining {
        headers.insert(HEADER_RATE_REMAINING, HeaderValue::from(remaining.max(0)));
    }
    if let Some(reset) = reset_at {
        headers.insert(HEADER_RATE_RESET, HeaderValue::from(reset));
    }

    headers
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = axum::Json(self.body());

        match self {
            Self::RateLimited { limit, reset_at } => {
                // A rejection always leaves nothing in the window
                let remaining = limit.map(|_| 0);
                (status, rate_limit_headers(limit, remaining, reset_at), body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(e: url::ParseError) -> Self {
        Self::Configuration(format!("invalid base url: {e}"))
    }
}

impl From<config::ConfigError> for GatewayError {
    fn from(e: config::ConfigError) -> Self {
        Self::InvalidSettings(e.to_string())
    }
}
