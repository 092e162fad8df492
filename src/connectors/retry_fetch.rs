// @file: chart_gateway/src/connectors/retry_fetch.rs
// @description: Exponential backoff around upstream GETs for 429/503 responses.
// @author: LAS.

use log::warn;
use std::time::Duration;
use tokio::time::sleep;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::interfaces::{HttpExecutor, UpstreamRequest, UpstreamResponse};


//
// CONSTANTS
//

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);
const RETRYABLE_STATUSES: [u16; 2] = [429, 503];


//
// POLICY
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    attempts: u32,
    initial_delay: Duration,
}

impl BackoffPolicy {
    /// `attempts` counts the first call, so it must be at least 1.
    pub fn new(attempts: u32, initial_delay: Duration) -> GatewayResult<Self> {
        if attempts == 0 {
            return Err(GatewayError::InvalidSettings(
                "upstream retry attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self { attempts, initial_delay })
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

pub fn should_retry(response: &UpstreamResponse) -> bool {
    RETRYABLE_STATUSES.contains(&response.status)
}


//
// PUBLIC INTERFACE
//

/// Performs `request`, retrying 429/503 with doubling delays.
///
/// Returns the last response once a non-retryable status arrives or the
/// attempt budget runs out. Transport errors are returned immediately.
pub async fn fetch_with_backoff(
    executor: &dyn HttpExecutor,
    request: &UpstreamRequest,
    policy: &BackoffPolicy,
) -> GatewayResult<UpstreamResponse> {
    let mut attempt: u32 = 0;
    let mut delay: Duration = policy.initial_delay;

    loop {
        let response = executor.execute(request).await?;
        attempt += 1;

        if !should_retry(&response) || attempt >= policy.attempts {
            return Ok(response);
        }

        warn!(
            "Upstream answered {} (attempt {}/{}), retrying in {}ms",
            response.status,
            attempt,
            policy.attempts,
            delay.as_millis()
        );

        sleep(delay).await;
        delay = delay.saturating_mul(2);
    }
}
