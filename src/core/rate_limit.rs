// @file: chart_gateway/src/core/rate_limit.rs
// @description: Per-identity sliding-window gate in front of the chart service.
// @author: LAS.

use log::warn;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use crate::core::interfaces::CounterStore;
use crate::core::models::RateLimitDecision;


//
// CONSTANTS
//

pub const DEFAULT_MAX_REQUESTS: u32 = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);
pub const DEFAULT_PREFIX: &str = "ratelimit:chart";
pub const ANONYMOUS_IDENTITY: &str = "anonymous";


//
// TYPE DEFINITIONS
//

#[derive(Clone)]
pub enum RateLimiterMode {
    /// No counter store configured: every request is admitted.
    Disabled,
    SlidingWindow(Arc<dyn CounterStore>),
}

#[derive(Clone)]
pub struct RateLimitGate {
    mode: RateLimiterMode,
    max_requests: u32,
    window: Duration,
    prefix: String,
}

impl RateLimitGate {
    pub fn new(mode: RateLimiterMode, max_requests: u32, window: Duration, prefix: impl Into<String>) -> Self {
        Self {
            mode,
            max_requests,
            window,
            prefix: prefix.into(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(RateLimiterMode::Disabled, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW, DEFAULT_PREFIX)
    }

    pub fn sliding_window(store: Arc<dyn CounterStore>) -> Self {
        Self::new(RateLimiterMode::SlidingWindow(store), DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW, DEFAULT_PREFIX)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.mode, RateLimiterMode::SlidingWindow(_))
    }

    pub async fn check(&self, identity: &str) -> RateLimitDecision {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;

        self.check_at(identity, now_ms).await
    }

    /// Decides admission for `identity` as of `now_ms` (epoch millis).
    pub async fn check_at(&self, identity: &str, now_ms: i64) -> RateLimitDecision {
        let store = match &self.mode {
            RateLimiterMode::Disabled => return RateLimitDecision::admit_unconditionally(),
            RateLimiterMode::SlidingWindow(store) => store,
        };

        let key = format!("{}:{}", self.prefix, identity);

        match store.sliding_window(&key, self.max_requests, self.window, now_ms).await {
            Ok(outcome) => RateLimitDecision {
                admitted: outcome.success,
                limit: Some(outcome.limit),
                remaining: Some(outcome.remaining),
                reset_at: Some(outcome.reset_at),
            },
            Err(e) => {
                // Fail open, same as running without a store
                warn!("Rate limit store unavailable, admitting {}: {}", identity, e);
                RateLimitDecision::admit_unconditionally()
            }
        }
    }
}


//
// SLIDING WINDOW MATH
//

/// Bucket index for `now_ms` under a window of `window_ms`.
pub fn window_bucket(now_ms: i64, window_ms: i64) -> i64 {
    now_ms.div_euclid(window_ms)
}

/// Share of the previous bucket still inside the trailing window.
pub fn weighted_previous(previous: i64, now_ms: i64, window_ms: i64) -> i64 {
    let elapsed = now_ms.rem_euclid(window_ms) as f64 / window_ms as f64;
    ((1.0 - elapsed) * previous as f64).floor() as i64
}

pub fn window_ms(window: Duration) -> i64 {
    (window.as_millis() as i64).max(1)
}


//
// IDENTITY
//

/// Picks the caller identity: socket address, then first `X-Forwarded-For` hop, then "anonymous".
pub fn resolve_identity(peer: Option<&str>, forwarded_for: Option<&str>) -> String {
    peer.map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            forwarded_for
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or(ANONYMOUS_IDENTITY)
        .to_string()
}
