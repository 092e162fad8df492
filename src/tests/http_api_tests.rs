// @file: chart_gateway/src/tests/http_api_tests.rs
// @description: End-to-end router checks: status codes, rate-limit headers, identity, CORS and health.
// @author: LAS.

#[cfg(test)]
mod http_api_tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use axum::Router;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use crate::api::http_server::{build_router, AppState, ChartParams};
    use crate::connectors::memory_store::LocalWindowStore;
    use crate::connectors::retry_fetch::BackoffPolicy;
    use crate::core::chart_service::{ChartService, EMPTY_CHART_MESSAGE};
    use crate::core::error::{HEADER_RATE_LIMIT, HEADER_RATE_REMAINING, HEADER_RATE_RESET};
    use crate::core::interfaces::CounterStore;
    use crate::core::rate_limit::{RateLimitGate, RateLimiterMode};
    use crate::tests::mock_upstream::{configured_app_config, kiwoom_body, ScriptedExecutor};
    use crate::utils::config::AppConfig;

    //
    // HELPERS
    //

    fn sample_body() -> String {
        kiwoom_body(&[json!({
            "stck_bsop_date": "20240105",
            "stck_oprc": "100",
            "stck_hgpr": "110",
            "stck_lwpr": "95",
            "stck_prpr": "105"
        })])
    }

    fn limited_gate(limit: u32) -> RateLimitGate {
        let store: Arc<dyn CounterStore> = Arc::new(LocalWindowStore::new());
        RateLimitGate::new(RateLimiterMode::SlidingWindow(store), limit, Duration::from_secs(3600), "test")
    }

    fn app(config: &AppConfig, executor: Arc<ScriptedExecutor>, gate: RateLimitGate, origin: Option<&str>) -> Router {
        let policy = BackoffPolicy::new(1, Duration::from_millis(1)).unwrap();
        let service = ChartService::new(config, executor, policy);
        build_router(AppState::new(service, gate, origin.map(str::to_string)))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn get_from(uri: &str, forwarded_for: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", forwarded_for)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    //
    // CHART ROUTE
    //

    #[tokio::test]
    async fn test_chart_success() {
        let executor = Arc::new(ScriptedExecutor::always(200, &sample_body()));
        let router = app(&configured_app_config(), executor, RateLimitGate::disabled(), None);

        let response = router.oneshot(get("/api/stock/chart/005930?interval=1d&range=1m")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(HEADER_RATE_LIMIT).is_none());
        let body = json_body(response).await;
        assert_eq!(body["candles"], json!([{ "time": 1704412800.0, "open": 100.0, "high": 110.0, "low": 95.0, "close": 105.0 }]));
        assert_eq!(body["metadata"], json!({ "count": 1, "symbol": "005930", "interval": "1d", "range": "1m" }));
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn test_chart_empty_result() {
        let executor = Arc::new(ScriptedExecutor::always(200, &kiwoom_body(&[])));
        let router = app(&configured_app_config(), executor, RateLimitGate::disabled(), None);

        let response = router.oneshot(get("/api/stock/chart/005930")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "candles": [], "message": EMPTY_CHART_MESSAGE }));
    }

    #[tokio::test]
    async fn test_unknown_interval_and_range_are_normalized() {
        let executor = Arc::new(ScriptedExecutor::always(200, &sample_body()));
        let router = app(&configured_app_config(), executor.clone(), RateLimitGate::disabled(), None);

        let response = router
            .oneshot(get("/api/stock/chart/005930?interval=2m&range=forever"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let request = executor.last_request().unwrap();
        assert_eq!(request.url.query(), Some("symbol=005930&interval=1m"));
        let body = json_body(response).await;
        assert_eq!(body["metadata"]["interval"], "1m");
        assert_eq!(body["metadata"]["range"], Value::Null);
    }

    #[tokio::test]
    async fn test_repeated_query_keys_take_first_value() {
        let executor = Arc::new(ScriptedExecutor::always(200, &sample_body()));
        let router = app(&configured_app_config(), executor.clone(), RateLimitGate::disabled(), None);

        let response = router
            .oneshot(get("/api/stock/chart/005930?interval=5m&interval=1d&range=1y&range=5d"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let request = executor.last_request().unwrap();
        assert_eq!(request.url.query(), Some("symbol=005930&interval=5m&range=1y"));
    }

    #[tokio::test]
    async fn test_malformed_query_string_falls_back_to_defaults() {
        let executor = Arc::new(ScriptedExecutor::always(200, &sample_body()));
        let router = app(&configured_app_config(), executor.clone(), RateLimitGate::disabled(), None);

        let response = router
            .oneshot(get("/api/stock/chart/005930?interval=%ZZ&&range&=x&interval%5B%5D=1d"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let request = executor.last_request().unwrap();
        assert_eq!(request.url.query(), Some("symbol=005930&interval=1m"));
    }

    #[tokio::test]
    async fn test_undecodable_symbol_is_json_bad_request() {
        let executor = Arc::new(ScriptedExecutor::always(200, &sample_body()));
        let router = app(&configured_app_config(), executor.clone(), RateLimitGate::disabled(), None);

        let response = router.oneshot(get("/api/stock/chart/%FF%FE")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("UTF-8"));
        assert_eq!(executor.calls(), 0);
    }

    #[test]
    fn test_chart_params_from_query() {
        assert_eq!(ChartParams::from_query(None), ChartParams::default());
        assert_eq!(
            ChartParams::from_query(Some("range=3m&interval=1h&interval=1d")),
            ChartParams { interval: Some("1h".to_string()), range: Some("3m".to_string()) }
        );
        assert_eq!(
            ChartParams::from_query(Some("interval=1%20d&foo=bar")),
            ChartParams { interval: Some("1 d".to_string()), range: None }
        );
    }

    #[tokio::test]
    async fn test_blank_symbol_is_bad_request() {
        let executor = Arc::new(ScriptedExecutor::always(200, &sample_body()));
        let router = app(&configured_app_config(), executor.clone(), RateLimitGate::disabled(), None);

        let response = router.oneshot(get("/api/stock/chart/%20%20")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({ "error": "symbol must not be empty" }));
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_answers_503() {
        let config = AppConfig::defaults().unwrap();
        let executor = Arc::new(ScriptedExecutor::always(200, &sample_body()));
        let router = app(&config, executor.clone(), RateLimitGate::disabled(), None);

        let response = router.oneshot(get("/api/stock/chart/005930")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("KIWOOM_API_BASE_URL"));
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_passes_status_through() {
        let executor = Arc::new(ScriptedExecutor::always(404, r#"{"msg1":"no such symbol"}"#));
        let router = app(&configured_app_config(), executor, RateLimitGate::disabled(), None);

        let response = router.oneshot(get("/api/stock/chart/XXXX")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Kiwoom API request failed.", "status": 404, "details": { "msg1": "no such symbol" } })
        );
    }

    //
    // RATE LIMITING
    //

    #[tokio::test]
    async fn test_rate_limited_requests_get_429_with_headers() {
        let executor = Arc::new(ScriptedExecutor::always(200, &sample_body()));
        let router = app(&configured_app_config(), executor.clone(), limited_gate(2), None);

        for remaining in ["1", "0"] {
            let response = router.clone().oneshot(get_from("/api/stock/chart/005930", "198.51.100.4")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()[HEADER_RATE_LIMIT], "2");
            assert_eq!(response.headers()[HEADER_RATE_REMAINING], remaining);
        }

        let response = router.oneshot(get_from("/api/stock/chart/005930", "198.51.100.4")).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[HEADER_RATE_LIMIT], "2");
        assert_eq!(response.headers()[HEADER_RATE_REMAINING], "0");
        let reset: i64 = response.headers()[HEADER_RATE_RESET].to_str().unwrap().parse().unwrap();
        assert!(reset > 0);
        assert_eq!(reset % 3_600_000, 0);

        let body = json_body(response).await;
        assert!(body["error"].is_string());
        // Rejected before the upstream was touched
        assert_eq!(executor.calls(), 2);
    }

    #[tokio::test]
    async fn test_forwarded_for_separates_callers() {
        let executor = Arc::new(ScriptedExecutor::always(200, &sample_body()));
        let router = app(&configured_app_config(), executor, limited_gate(1), None);

        let first = router.clone().oneshot(get_from("/api/stock/chart/A", "203.0.113.1, 10.0.0.1")).await.unwrap();
        let again = router.clone().oneshot(get_from("/api/stock/chart/A", "203.0.113.1")).await.unwrap();
        let other = router.clone().oneshot(get_from("/api/stock/chart/A", "203.0.113.2")).await.unwrap();
        let anon = router.clone().oneshot(get("/api/stock/chart/A")).await.unwrap();
        let anon_again = router.oneshot(get("/api/stock/chart/A")).await.unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(other.status(), StatusCode::OK);
        assert_eq!(anon.status(), StatusCode::OK);
        assert_eq!(anon_again.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    //
    // HEALTH & CORS
    //

    #[tokio::test]
    async fn test_health() {
        let router = app(&AppConfig::defaults().unwrap(), Arc::new(ScriptedExecutor::new(vec![])), RateLimitGate::disabled(), None);

        let response = router.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        let stamp = body["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
        assert!(stamp.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_cors_uses_configured_origin() {
        let executor = Arc::new(ScriptedExecutor::always(200, &sample_body()));
        let router = app(&configured_app_config(), executor, RateLimitGate::disabled(), Some("http://localhost:3000"));

        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin_by_default() {
        let executor = Arc::new(ScriptedExecutor::always(200, &sample_body()));
        let router = app(&configured_app_config(), executor, RateLimitGate::disabled(), None);

        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "https://dashboard.example")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let router = app(&configured_app_config(), Arc::new(ScriptedExecutor::new(vec![])), RateLimitGate::disabled(), None);
        let response = router.oneshot(get("/api/stock/other")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
