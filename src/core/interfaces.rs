// @file: chart_gateway/src/core/interfaces.rs
// @description: Seams between the chart core and its network collaborators (upstream HTTP, counter store).
// @author: LAS.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;
use crate::core::error::GatewayResult;


//
// UPSTREAM HTTP
//

/// A GET request to the upstream: target URL plus headers.
#[derive(Clone, PartialEq)]
pub struct UpstreamRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl UpstreamRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// Header values carry credentials, so only names are printed
impl std::fmt::Debug for UpstreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("UpstreamRequest")
            .field("url", &self.url.as_str())
            .field("headers", &names)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpExecutor: Send + Sync {
    /// Performs one GET. Only transport failures are errors; any HTTP status is a response.
    async fn execute(&self, request: &UpstreamRequest) -> GatewayResult<UpstreamResponse>;
}


//
// RATE LIMIT COUNTER STORE
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOutcome {
    pub success: bool,
    pub limit: u32,
    pub remaining: i64,
    pub reset_at: i64,
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically checks `key` against a sliding window of `limit` hits per `window`
    /// and records the hit if admitted. `now_ms` is the caller's clock in epoch millis.
    async fn sliding_window(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        now_ms: i64,
    ) -> GatewayResult<WindowOutcome>;
}
