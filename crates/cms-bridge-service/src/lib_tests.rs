//! Router tests for the bridge service

use super::*;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use cms_bridge_core::signing::{sign, signature_header_value};
use cms_bridge_core::WebhookTarget;
use serde_json::Value;
use tower::ServiceExt;

const SECRET: &str = "inbound-secret";

fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.targets.insert(
        "primary".to_string(),
        WebhookTarget::new("https://hooks.example.com/cms", "outbound-secret"),
    );
    config
        .inbound
        .insert("plain".to_string(), InboundSourceConfig::new(SECRET));

    let mut relayed = InboundSourceConfig::new(SECRET);
    relayed.relay_to = Some("primary".to_string());
    config.inbound.insert("relayed".to_string(), relayed);

    config.delivery.max_queue_size = 1;
    config
}

fn state() -> AppState {
    let state = AppState::from_config(test_config()).unwrap();
    // Keep relayed jobs in the queue instead of sending them
    state.queue.pause();
    state
}

fn inbound_request(source: &str, body: &'static str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/inbound/{}", source))
        .header("Content-Type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body)).unwrap()
}

fn signed(body: &str) -> Option<String> {
    Some(signature_header_value(&sign(body.as_bytes(), SECRET)))
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

mod inbound {
    use super::*;

    #[tokio::test]
    async fn test_valid_signature_is_accepted() {
        let body = r#"{"id":"abc123","title":"Hello"}"#;

        let response = create_router(state())
            .oneshot(inbound_request("plain", body, signed(body)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = json_body(response).await;
        assert_eq!(json["status"], "accepted");
        assert_eq!(json["source"], "plain");
    }

    #[tokio::test]
    async fn test_missing_signature_is_unauthorized() {
        let response = create_router(state())
            .oneshot(inbound_request("plain", r#"{"id":1}"#, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(response).await;
        assert_eq!(json["status"], 401);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_wrong_signature_is_unauthorized() {
        let signature = Some(signature_header_value(&sign(b"{}", "other-secret")));

        let response = create_router(state())
            .oneshot(inbound_request("plain", "{}", signature))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_source_is_not_found() {
        let body = "{}";

        let response = create_router(state())
            .oneshot(inbound_request("ghost", body, signed(body)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_signed_non_json_is_bad_request() {
        let body = "not json";

        let response = create_router(state())
            .oneshot(inbound_request("plain", body, signed(body)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_relay_is_queued_and_full_queue_asks_for_retry() {
        let state = state();
        let router = create_router(state.clone());
        let body = r#"{"id":"abc123","title":"Hello"}"#;

        let first = router
            .clone()
            .oneshot(inbound_request("relayed", body, signed(body)))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);
        assert_eq!(state.queue.stats().queued, 1);

        let second = router
            .oneshot(inbound_request("relayed", body, signed(body)))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(second.headers().get("Retry-After").unwrap(), "60");
    }
}

#[tokio::test]
async fn test_health_reports_queue_stats() {
    let response = create_router(state())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["queue"]["paused"], true);
    assert_eq!(json["queue"]["queued"], 0);
}

#[tokio::test]
async fn test_metrics_count_inbound_results() {
    let state = state();
    let router = create_router(state.clone());
    let body = "{}";

    router
        .clone()
        .oneshot(inbound_request("plain", body, signed(body)))
        .await
        .unwrap();
    router
        .clone()
        .oneshot(inbound_request("ghost", body, None))
        .await
        .unwrap();

    let response = router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains(r#"cms_bridge_inbound_requests_total{result="accepted",source="plain"} 1"#));
    assert!(text.contains(r#"cms_bridge_inbound_requests_total{result="rejected",source="unknown"} 1"#));
    assert!(text.contains("cms_bridge_queue_depth 0"));
}

#[tokio::test]
async fn test_invalid_inbound_preset_fails_state_construction() {
    let mut config = test_config();
    let mut source = InboundSourceConfig::new(SECRET);
    source.preset = Some("ghost".to_string());
    config.inbound.insert("ghost".to_string(), source);

    let result = AppState::from_config(config);

    assert!(matches!(result, Err(ServiceError::Configuration(_))));
}

mod graceful_shutdown {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_drain_is_cut_short_after_timeout() {
        let draining = Arc::new(Notify::new());
        let server = std::future::pending::<Result<(), std::io::Error>>();

        draining.notify_one();
        let started = tokio::time::Instant::now();
        let drained = run_with_drain_limit(server, draining, Duration::from_secs(30))
            .await
            .unwrap();

        assert!(!drained);
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_that_finishes_in_time_is_drained() {
        let draining = Arc::new(Notify::new());
        let server = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), std::io::Error>(())
        };

        draining.notify_one();
        let drained = run_with_drain_limit(server, draining, Duration::from_secs(30))
            .await
            .unwrap();

        assert!(drained);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_deadline_before_shutdown_starts() {
        let draining = Arc::new(Notify::new());
        let server = std::future::pending::<Result<(), std::io::Error>>();

        let result = tokio::time::timeout(
            Duration::from_secs(3600),
            run_with_drain_limit(server, draining, Duration::from_secs(30)),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_are_returned() {
        let draining = Arc::new(Notify::new());
        let server = async { Err::<(), _>(std::io::Error::other("listener closed")) };

        let result = run_with_drain_limit(server, draining, Duration::from_secs(30)).await;

        assert!(result.is_err());
    }
}
