// @file: chart_gateway/src/connectors/kiwoom_rest.rs
// @description: Kiwoom chart request construction and the reqwest-backed upstream executor.
// @author: LAS.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::interfaces::{HttpExecutor, UpstreamRequest, UpstreamResponse};
use crate::core::models::ChartQuery;
use crate::utils::config::ConnectionConfig;


//
// CONSTANTS
//

pub const CHART_PATH: &str = "/stock/chart";

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_APP_KEY: &str = "appkey";
pub const HEADER_APP_SECRET: &str = "appsecret";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_TR_ID: &str = "tr_id";


//
// REQUEST CONSTRUCTION
//

/// Builds `GET {base}/stock/chart?symbol=..&interval=..[&range=..]` with credential headers.
pub fn build_chart_request(conn: &ConnectionConfig, query: &ChartQuery) -> GatewayResult<UpstreamRequest> {
    // #1. URL (absolute path replaces any path on the base)
    let mut url = conn.base_url.join(CHART_PATH)?;
    {
        let mut params = url.query_pairs_mut();
        params.append_pair("symbol", &query.symbol);
        params.append_pair("interval", query.interval.as_str());
        if let Some(range) = query.range {
            params.append_pair("range", range.as_str());
        }
    }

    // #2. Headers
    let mut headers: Vec<(String, String)> = vec![
        (HEADER_CONTENT_TYPE.to_string(), "application/json".to_string()),
        (HEADER_APP_KEY.to_string(), conn.app_key.clone()),
        (HEADER_APP_SECRET.to_string(), conn.app_secret.clone()),
    ];

    if let Some(token) = &conn.access_token {
        headers.push((HEADER_AUTHORIZATION.to_string(), format!("Bearer {}", token)));
    }
    if let Some(tr_id) = &conn.transaction_id {
        headers.push((HEADER_TR_ID.to_string(), tr_id.clone()));
    }

    Ok(UpstreamRequest { url, headers })
}


//
// REQWEST EXECUTOR
//

#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    /// `timeout` bounds each individual attempt.
    pub fn new(timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::InvalidSettings(format!("http client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(&self, request: &UpstreamRequest) -> GatewayResult<UpstreamResponse> {
        let mut builder = self.client.get(request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(format!("reading body: {}", e.without_url())))?;

        Ok(UpstreamResponse { status, body })
    }
}
