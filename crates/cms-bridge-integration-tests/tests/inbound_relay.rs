//! End-to-end tests for the inbound endpoint
//!
//! A signed webhook from a CMS source is verified, transformed and relayed
//! as a newly signed delivery to a configured target.

mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use cms_bridge_core::signing::{sign, signature_header_value, verify_header, SIGNATURE_HEADER};
use cms_bridge_core::WebhookTarget;
use cms_bridge_service::{create_router, AppState, InboundSourceConfig, ServiceConfig};
use common::{wait_for_requests, SECRET};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INBOUND_SECRET: &str = "wordpress-secret";

fn config(server: &MockServer) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.delivery.poll_interval_ms = 10;
    config.targets.insert(
        "primary".to_string(),
        WebhookTarget::new(format!("{}/hook", server.uri()), SECRET),
    );

    let mut source = InboundSourceConfig::new(INBOUND_SECRET);
    source.preset = Some("wordpress".to_string());
    source.relay_to = Some("primary".to_string());
    source.event = "content.published".to_string();
    config.inbound.insert("wordpress".to_string(), source);
    config
}

fn inbound_request(body: &'static str, signature: Option<String>) -> Result<Request<Body>> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/inbound/wordpress")
        .header("Content-Type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    Ok(builder.body(Body::from(body))?)
}

#[tokio::test]
async fn test_signed_inbound_is_relayed_to_target() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let state = AppState::from_config(config(&server))?;
    let body = r#"{"id":42,"title":"Hello","status":"publish","meta":{"cms_id":"abc123"}}"#;
    let signature = signature_header_value(&sign(body.as_bytes(), INBOUND_SECRET));

    let response = create_router(state.clone())
        .oneshot(inbound_request(body, Some(signature))?)
        .await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let requests = wait_for_requests(&server, 1).await?;
    let delivered = &requests[0];
    let header = delivered
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    assert!(verify_header(&delivered.body, header, SECRET).is_ok());

    let payload: Value = serde_json::from_slice(&delivered.body)?;
    assert_eq!(payload["event"], "content.published");
    assert_eq!(payload["content_id"], "abc123");
    assert_eq!(payload["content"]["status"], "published");

    state.queue.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_unsigned_inbound_is_rejected_and_not_relayed() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let state = AppState::from_config(config(&server))?;
    let body = r#"{"id":42,"title":"Hello","meta":{"cms_id":"abc123"}}"#;

    let response = create_router(state.clone())
        .oneshot(inbound_request(body, None)?)
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(state.queue.stats().queued, 0);

    state.queue.shutdown();
    Ok(())
}
