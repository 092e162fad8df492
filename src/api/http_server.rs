// @file: chart_gateway/src/api/http_server.rs
// @description: HTTP boundary: chart and health routes, client identity, rate-limit headers, CORS, request log.
// @author: LAS.

use axum::extract::rejection::PathRejection;
use axum::extract::{ConnectInfo, FromRequestParts, Path, RawQuery, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{info, warn};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use url::form_urlencoded;
use crate::core::chart_service::ChartService;
use crate::core::error::{rate_limit_headers, GatewayError};
use crate::core::models::ChartQuery;
use crate::core::rate_limit::{resolve_identity, RateLimitGate};


//
// SHARED STATE
//

pub struct AppState {
    pub service: ChartService,
    pub gate: RateLimitGate,
    pub client_origin: Option<String>,
}

impl AppState {
    pub fn new(service: ChartService, gate: RateLimitGate, client_origin: Option<String>) -> Arc<Self> {
        Arc::new(Self { service, gate, client_origin })
    }
}


//
// ROUTER
//

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.client_origin.as_deref());

    Router::new()
        .route("/health", get(health))
        .route("/api/stock/chart/{symbol}", get(chart))
        .layer(middleware::from_fn(log_requests))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(state: Arc<AppState>, bind_address: &str) -> std::io::Result<()> {
    let listener: TcpListener = TcpListener::bind(bind_address).await?;
    info!("Kiwoom chart gateway listening on {}", listener.local_addr()?);

    let app = build_router(state);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match origin.map(str::trim).filter(|o| !o.is_empty()) {
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => base.allow_origin(value),
            Err(_) => {
                warn!("Ignoring invalid CLIENT_ORIGIN {:?}, allowing any origin", origin);
                base.allow_origin(Any)
            }
        },
        None => base.allow_origin(Any),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping server");
}


//
// CLIENT IDENTITY
//

/// Rate-limit identity: peer address, then `X-Forwarded-For`, then "anonymous".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl<S> FromRequestParts<S> for ClientIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok());

        Ok(Self(resolve_identity(peer.as_deref(), forwarded)))
    }
}


//
// HANDLERS
//

/// `interval` and `range` from the raw query string. The first occurrence of a
/// repeated key wins; anything unparseable is left for `ChartQuery` to default.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChartParams {
    pub interval: Option<String>,
    pub range: Option<String>,
}

impl ChartParams {
    pub fn from_query(raw: Option<&str>) -> Self {
        let mut params = Self::default();

        for (key, value) in form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            match &*key {
                "interval" if params.interval.is_none() => params.interval = Some(value.into_owned()),
                "range" if params.range.is_none() => params.range = Some(value.into_owned()),
                _ => {}
            }
        }

        params
    }
}

/// GET /api/stock/chart/{symbol}
async fn chart(
    State(state): State<Arc<AppState>>,
    ClientIdentity(identity): ClientIdentity,
    symbol: Result<Path<String>, PathRejection>,
    RawQuery(raw_query): RawQuery,
) -> Response {
    // #1. Gate before anything touches the upstream
    let decision = state.gate.check(&identity).await;
    if !decision.admitted {
        info!("Rate limit exceeded for {}", identity);
        return GatewayError::RateLimited {
            limit: decision.limit,
            reset_at: decision.reset_at,
        }
        .into_response();
    }

    // #2. Normalize the query
    let symbol = match symbol {
        Ok(Path(symbol)) => symbol,
        Err(rejection) => return GatewayError::InvalidQuery(rejection.body_text()).into_response(),
    };
    let params = ChartParams::from_query(raw_query.as_deref());
    let query = match ChartQuery::from_raw(&symbol, params.interval.as_deref(), params.range.as_deref()) {
        Ok(q) => q,
        Err(e) => return e.into_response(),
    };

    // #3. Fetch
    let headers = rate_limit_headers(decision.limit, decision.remaining, decision.reset_at);
    match state.service.fetch_chart(&query).await {
        Ok(payload) => (StatusCode::OK, headers, Json(payload)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    }))
}


//
// MIDDLEWARE
//

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        "{} {} {} {}ms",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}
