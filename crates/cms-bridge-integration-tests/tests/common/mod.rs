//! Common test utilities for cms-bridge integration tests
//!
//! This module provides:
//! - Queue and policy builders with short delays
//! - Helpers for waiting on requests received by a mock server

use anyhow::{bail, Result};
use cms_bridge_service::{
    DeliveryExecutor, DeliveryQueue, QueueSettings, ReqwestTransport, RetryPolicy,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{MockServer, Request};

pub const SECRET: &str = "integration-secret";

/// Queue settings that poll fast enough for real-time tests
#[allow(dead_code)]
pub fn fast_settings() -> QueueSettings {
    QueueSettings {
        poll_interval: Duration::from_millis(10),
        ..QueueSettings::default()
    }
}

/// Backoff of 20ms doubling up to 200ms
#[allow(dead_code)]
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_millis(20),
        Duration::from_millis(200),
    )
}

/// Start a queue delivering over real HTTP
#[allow(dead_code)]
pub fn start_queue(policy: RetryPolicy) -> Result<DeliveryQueue> {
    let transport = ReqwestTransport::new(Duration::from_secs(5))?;
    let executor = DeliveryExecutor::new(Arc::new(transport));
    Ok(DeliveryQueue::start(fast_settings(), policy, executor))
}

/// Wait until the server has seen at least `count` requests
#[allow(dead_code)]
pub async fn wait_for_requests(server: &MockServer, count: usize) -> Result<Vec<Request>> {
    for _ in 0..200 {
        if let Some(requests) = server.received_requests().await {
            if requests.len() >= count {
                return Ok(requests);
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    bail!("mock server did not receive {} requests in time", count)
}
