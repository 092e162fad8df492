// @file: chart_gateway/src/utils/config.rs
// @description: Layered configuration (defaults, config file, .env files, environment) and credential validation.
// @author: LAS.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::Url;
use crate::connectors::retry_fetch::BackoffPolicy;
use crate::core::error::{GatewayError, GatewayResult};


//
// TYPE DEFINITIONS
//

#[derive(Deserialize, Clone)]
pub struct AppConfig {
    // Server Settings
    pub server_bind: String,
    pub server_port: u16,
    pub client_origin: Option<String>,

    // Kiwoom Upstream
    pub kiwoom_api_base_url: Option<String>,
    pub kiwoom_api_app_key: Option<String>,
    pub kiwoom_api_app_secret: Option<String>,
    pub kiwoom_api_access_token: Option<String>,
    pub kiwoom_api_tr_id: Option<String>,

    // Retry
    pub upstream_retry_attempts: u32,
    pub upstream_retry_initial_delay_ms: u64,
    pub upstream_timeout_ms: u64,

    // Rate Limiting
    pub upstash_redis_rest_url: Option<String>,
    pub upstash_redis_rest_token: Option<String>,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_ms: u64,
    pub rate_limit_prefix: String,
    pub rate_limit_local: bool,
}

/// Validated upstream credentials.
#[derive(Clone, PartialEq)]
pub struct ConnectionConfig {
    pub base_url: Url,
    pub app_key: String,
    pub app_secret: String,
    pub access_token: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Clone, PartialEq)]
pub struct UpstashConfig {
    pub rest_url: String,
    pub rest_token: String,
}


//
// LOADING
//

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // dotenv never overwrites, so .env.local is read first to take precedence over .env
        let _ = dotenv::from_filename(".env.local");
        let _ = dotenv::dotenv();

        Self::builder()?
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::default())
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server_bind", "0.0.0.0")?
            .set_default("server_port", 4000)?
            .set_default("upstream_retry_attempts", 4)?
            .set_default("upstream_retry_initial_delay_ms", 1000)?
            .set_default("upstream_timeout_ms", 10_000)?
            .set_default("rate_limit_max_requests", 5)?
            .set_default("rate_limit_window_ms", 1000)?
            .set_default("rate_limit_prefix", "ratelimit:chart")?
            .set_default("rate_limit_local", false)
    }

    /// Defaults only, ignoring files and the environment.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::builder()?.build()?.try_deserialize()
    }


    //
    // DERIVED SETTINGS
    //

    /// Validates the upstream credentials.
    ///
    /// Base URL, app key and app secret must be non-blank after trimming.
    pub fn connection(&self) -> GatewayResult<ConnectionConfig> {
        let base_url = trimmed(&self.kiwoom_api_base_url);
        let app_key = trimmed(&self.kiwoom_api_app_key);
        let app_secret = trimmed(&self.kiwoom_api_app_secret);

        let (base_url, app_key, app_secret) = match (base_url, app_key, app_secret) {
            (Some(u), Some(k), Some(s)) => (u, k, s),
            _ => {
                return Err(GatewayError::Configuration(
                    "KIWOOM_API_BASE_URL, KIWOOM_API_APP_KEY and KIWOOM_API_APP_SECRET are required".to_string(),
                ))
            }
        };

        Ok(ConnectionConfig {
            base_url: Url::parse(&base_url)?,
            app_key,
            app_secret,
            access_token: trimmed(&self.kiwoom_api_access_token),
            transaction_id: trimmed(&self.kiwoom_api_tr_id),
        })
    }

    /// Upstash credentials, or `None` when either is missing.
    pub fn upstash(&self) -> Option<UpstashConfig> {
        Some(UpstashConfig {
            rest_url: trimmed(&self.upstash_redis_rest_url)?,
            rest_token: trimmed(&self.upstash_redis_rest_token)?,
        })
    }

    pub fn backoff_policy(&self) -> GatewayResult<BackoffPolicy> {
        BackoffPolicy::new(
            self.upstream_retry_attempts,
            Duration::from_millis(self.upstream_retry_initial_delay_ms),
        )
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_bind, self.server_port)
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}


//
// REDACTED DEBUG
//

fn mask(value: &Option<String>) -> &'static str {
    if trimmed(value).is_some() { "<set>" } else { "<unset>" }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("server_bind", &self.server_bind)
            .field("server_port", &self.server_port)
            .field("client_origin", &self.client_origin)
            .field("kiwoom_api_base_url", &self.kiwoom_api_base_url)
            .field("kiwoom_api_app_key", &mask(&self.kiwoom_api_app_key))
            .field("kiwoom_api_app_secret", &mask(&self.kiwoom_api_app_secret))
            .field("kiwoom_api_access_token", &mask(&self.kiwoom_api_access_token))
            .field("kiwoom_api_tr_id", &self.kiwoom_api_tr_id)
            .field("upstream_retry_attempts", &self.upstream_retry_attempts)
            .field("upstream_retry_initial_delay_ms", &self.upstream_retry_initial_delay_ms)
            .field("upstream_timeout_ms", &self.upstream_timeout_ms)
            .field("upstash_redis_rest_url", &self.upstash_redis_rest_url)
            .field("upstash_redis_rest_token", &mask(&self.upstash_redis_rest_token))
            .field("rate_limit_max_requests", &self.rate_limit_max_requests)
            .field("rate_limit_window_ms", &self.rate_limit_window_ms)
            .field("rate_limit_prefix", &self.rate_limit_prefix)
            .field("rate_limit_local", &self.rate_limit_local)
            .finish()
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("base_url", &self.base_url.as_str())
            .field("app_key", &"<redacted>")
            .field("app_secret", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("transaction_id", &self.transaction_id)
            .finish()
    }
}

impl fmt::Debug for UpstashConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstashConfig")
            .field("rest_url", &self.rest_url)
            .field("rest_token", &"<redacted>")
            .finish()
    }
}
