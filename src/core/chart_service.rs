// @file: chart_gateway/src/core/chart_service.rs
// @description: Chart query orchestration: config validation, request building, backoff fetch, normalization.
// @author: LAS.

use log::{error, info, warn};
use serde_json::{json, Value};
use std::sync::Arc;
use crate::connectors::kiwoom_rest::build_chart_request;
use crate::connectors::retry_fetch::{fetch_with_backoff, BackoffPolicy};
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::interfaces::HttpExecutor;
use crate::core::models::{ChartMetadata, ChartPayload, ChartQuery};
use crate::core::normalizer::extract_candles;
use crate::utils::config::{AppConfig, ConnectionConfig};


//
// CONSTANTS
//

pub const EMPTY_CHART_MESSAGE: &str = "Upstream responded successfully but the chart data is empty. Check the request parameters or the conversion rules.";
const ERROR_BODY_PARSE_FAILED: &str = "failed to parse upstream error body";


//
// SERVICE
//

#[derive(Clone)]
pub struct ChartService {
    connection: GatewayResult<ConnectionConfig>,
    executor: Arc<dyn HttpExecutor>,
    policy: BackoffPolicy,
}

impl ChartService {
    pub fn new(config: &AppConfig, executor: Arc<dyn HttpExecutor>, policy: BackoffPolicy) -> Self {
        Self::with_connection(config.connection(), executor, policy)
    }

    /// `connection` may be an error; it is reported on every call until fixed.
    pub fn with_connection(
        connection: GatewayResult<ConnectionConfig>,
        executor: Arc<dyn HttpExecutor>,
        policy: BackoffPolicy,
    ) -> Self {
        Self { connection, executor, policy }
    }

    pub fn is_configured(&self) -> bool {
        self.connection.is_ok()
    }

    pub async fn fetch_chart(&self, query: &ChartQuery) -> GatewayResult<ChartPayload> {
        // #1. Validate configuration (no network before this passes)
        let conn = match &self.connection {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Chart request for {} refused: {}", query.symbol, e);
                return Err(e.clone());
            }
        };

        // #2. Build request
        let request = build_chart_request(conn, query)?;

        // #3. Call upstream
        let response = fetch_with_backoff(self.executor.as_ref(), &request, &self.policy)
            .await
            .map_err(|e| {
                error!("Kiwoom request for {} failed: {}", query.symbol, e);
                e
            })?;

        if !response.is_success() {
            warn!("Kiwoom returned {} for {} ({})", response.status, query.symbol, query.interval);
            return Err(GatewayError::Upstream {
                status: response.status,
                details: error_details(&response.body),
            });
        }

        // #4. Normalize
        let payload: Value = serde_json::from_str(&response.body)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        let candles = extract_candles(&payload);

        if candles.is_empty() {
            info!("Kiwoom returned no usable candles for {} ({})", query.symbol, query.interval);
            return Ok(ChartPayload {
                candles,
                metadata: None,
                message: Some(EMPTY_CHART_MESSAGE.to_string()),
            });
        }

        info!("Fetched {} candles for {} ({})", candles.len(), query.symbol, query.interval);

        Ok(ChartPayload {
            metadata: Some(ChartMetadata {
                count: candles.len(),
                symbol: query.symbol.clone(),
                interval: query.interval,
                range: query.range,
            }),
            candles,
            message: None,
        })
    }
}


//
// INTERNAL HELPERS
//

fn error_details(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| {
        json!({ "message": ERROR_BODY_PARSE_FAILED, "error": e.to_string() })
    })
}
