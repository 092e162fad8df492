// @file: chart_gateway/src/connectors/mod.rs
// @description: Network collaborators plus factories that pick them from configuration.
// @author: LAS.

pub mod kiwoom_rest;
pub mod memory_store;
pub mod retry_fetch;
pub mod upstash;

use log::{info, warn};
use std::sync::Arc;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::interfaces::CounterStore;
use crate::core::rate_limit::{RateLimitGate, RateLimiterMode};
use crate::utils::config::AppConfig;
use self::memory_store::LocalWindowStore;
use self::upstash::UpstashStore;


//
// FACTORY FUNCTIONS
//

/// Chooses the rate limiter mode: Upstash when configured, else the local store if
/// enabled, else disabled.
pub fn build_rate_limit_gate(config: &AppConfig) -> GatewayResult<RateLimitGate> {
    if config.rate_limit_max_requests == 0 || config.rate_limit_window_ms == 0 {
        return Err(GatewayError::InvalidSettings(
            "rate limit requests and window must be greater than zero".to_string(),
        ));
    }

    let store: Option<Arc<dyn CounterStore>> = match config.upstash() {
        Some(upstash) => {
            info!("Rate limiting via Upstash Redis ({})", upstash.rest_url);
            let store: Arc<dyn CounterStore> = Arc::new(UpstashStore::new(upstash)?);
            Some(store)
        }
        None if config.rate_limit_local => {
            info!("Rate limiting via in-process window store");
            let store: Arc<dyn CounterStore> = Arc::new(LocalWindowStore::new());
            Some(store)
        }
        None => {
            warn!("UPSTASH_REDIS_REST_URL/TOKEN not set, chart rate limiting is disabled");
            None
        }
    };

    let mode = match store {
        Some(store) => RateLimiterMode::SlidingWindow(store),
        None => RateLimiterMode::Disabled,
    };

    Ok(RateLimitGate::new(
        mode,
        config.rate_limit_max_requests,
        config.rate_limit_window(),
        config.rate_limit_prefix.clone(),
    ))
}
