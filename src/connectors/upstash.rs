// @file: chart_gateway/src/connectors/upstash.rs
// @description: Upstash Redis REST counter store running the sliding-window check as one atomic EVAL.
// @author: LAS.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::interfaces::{CounterStore, WindowOutcome};
use crate::core::rate_limit::{window_bucket, window_ms};
use crate::utils::config::UpstashConfig;


//
// SLIDING WINDOW SCRIPT
//

// KEYS: current bucket, previous bucket. ARGV: limit, now_ms, window_ms, increment.
// Returns remaining tokens, or -1 when the request is rejected.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local currentKey  = KEYS[1]
local previousKey = KEYS[2]
local tokens      = tonumber(ARGV[1])
local now         = tonumber(ARGV[2])
local window      = tonumber(ARGV[3])
local incrementBy = tonumber(ARGV[4])

local current = tonumber(redis.call("GET", currentKey) or "0")
local previous = tonumber(redis.call("GET", previousKey) or "0")

local elapsed = (now % window) / window
previous = math.floor((1 - elapsed) * previous)
if previous + current >= tokens then
  return -1
end

local newValue = redis.call("INCRBY", currentKey, incrementBy)
if newValue == incrementBy then
  redis.call("PEXPIRE", currentKey, window * 2 + 1000)
end
return tokens - (newValue + previous)
"#;

const STORE_TIMEOUT: Duration = Duration::from_secs(2);


//
// WIRE MODELS
//

#[derive(Deserialize)]
struct UpstashReply {
    result: Option<Value>,
    error: Option<String>,
}


//
// STORE
//

#[derive(Debug, Clone)]
pub struct UpstashStore {
    client: Client,
    config: UpstashConfig,
}

impl UpstashStore {
    pub fn new(config: UpstashConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(STORE_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::InvalidSettings(format!("upstash client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Builds the EVAL command body for one window check.
    pub fn eval_command(key: &str, limit: u32, window: Duration, now_ms: i64) -> Value {
        let win = window_ms(window);
        let bucket = window_bucket(now_ms, win);

        json!([
            "EVAL",
            SLIDING_WINDOW_SCRIPT,
            "2",
            format!("{}:{}", key, bucket),
            format!("{}:{}", key, bucket - 1),
            limit.to_string(),
            now_ms.to_string(),
            win.to_string(),
            "1",
        ])
    }
}

#[async_trait]
impl CounterStore for UpstashStore {
    async fn sliding_window(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        now_ms: i64,
    ) -> GatewayResult<WindowOutcome> {
        let win = window_ms(window);
        let command = Self::eval_command(key, limit, window, now_ms);

        let response = self
            .client
            .post(&self.config.rest_url)
            .bearer_auth(&self.config.rest_token)
            .json(&command)
            .send()
            .await
            .map_err(|e| GatewayError::Store(e.without_url().to_string()))?;

        let reply: UpstashReply = response
            .json()
            .await
            .map_err(|e| GatewayError::Store(format!("invalid reply: {}", e.without_url())))?;

        if let Some(err) = reply.error {
            return Err(GatewayError::Store(err));
        }

        let remaining = reply
            .result
            .as_ref()
            .and_then(Value::as_i64)
            .ok_or_else(|| GatewayError::Store("missing integer result".to_string()))?;

        Ok(WindowOutcome {
            success: remaining >= 0,
            limit,
            remaining: remaining.max(0),
            reset_at: (window_bucket(now_ms, win) + 1) * win,
        })
    }
}
