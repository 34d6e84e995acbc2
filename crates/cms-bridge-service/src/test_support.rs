//! Scripted transport shared by the unit tests.

use crate::errors::TransportError;
use crate::transport::{OutboundRequest, TransportResponse, WebhookTransport};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// One recorded request and when it arrived
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: OutboundRequest,
    pub at: Instant,
}

/// Answers from a script, then with a fallback status
pub struct RecordingTransport {
    script: Mutex<VecDeque<Result<u16, TransportError>>>,
    fallback_status: u16,
    latency: Duration,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl RecordingTransport {
    pub fn always(status: u16) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback_status: status,
            latency: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted(
        script: impl IntoIterator<Item = Result<u16, TransportError>>,
        fallback_status: u16,
    ) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::always(fallback_status)
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl WebhookTransport for RecordingTransport {
    async fn post(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            request,
            at: Instant::now(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(self.fallback_status));

        next.map(|status| TransportResponse {
            status,
            headers: BTreeMap::new(),
            body: Bytes::from(format!("{{\"status\":{}}}", status)),
        })
    }
}
