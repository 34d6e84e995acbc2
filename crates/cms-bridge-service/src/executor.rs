//! # Delivery Executor
//!
//! Performs one delivery attempt: builds the payload, signs the exact bytes it
//! is about to send, POSTs them and classifies the response.
//!
//! The timestamp is read from the clock on every attempt, so each retry
//! carries a fresh timestamp and therefore a fresh signature.

use crate::errors::DeliveryError;
use crate::job::{DeliveryResponse, WebhookJob, WebhookPayload};
use crate::transport::{OutboundRequest, WebhookTransport};
use bytes::Bytes;
use cms_bridge_core::signing::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use cms_bridge_core::{Clock, SystemClock};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Longest response body kept in an HTTP failure message
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Default `User-Agent` for outbound webhooks
pub fn default_user_agent() -> String {
    format!("cms-bridge/{}", env!("CARGO_PKG_VERSION"))
}

/// Signs and sends single delivery attempts
pub struct DeliveryExecutor {
    transport: Arc<dyn WebhookTransport>,
    clock: Arc<dyn Clock>,
    user_agent: String,
}

impl DeliveryExecutor {
    pub fn new(transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            transport,
            clock: Arc::new(SystemClock),
            user_agent: default_user_agent(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Payload for an attempt made now
    pub fn build_payload(&self, job: &WebhookJob) -> WebhookPayload {
        WebhookPayload {
            event: job.event().to_string(),
            content_id: job.content_id().to_string(),
            content: job.content().clone(),
            timestamp: self.clock.now().unix_seconds(),
        }
    }

    /// Serialize, sign and wrap a payload into a request.
    ///
    /// The body bytes in the returned request are the bytes that were signed.
    pub fn prepare(
        &self,
        job: &WebhookJob,
        payload: &WebhookPayload,
    ) -> Result<OutboundRequest, DeliveryError> {
        let body = serde_json::to_vec(payload).map_err(|e| DeliveryError::Serialization {
            message: e.to_string(),
        })?;
        let signature = signing::sign(&body, job.secret().expose_secret());

        Ok(OutboundRequest {
            url: job.target_url().to_string(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                (
                    SIGNATURE_HEADER.to_string(),
                    signing::signature_header_value(&signature),
                ),
                (TIMESTAMP_HEADER.to_string(), payload.timestamp.to_string()),
                ("User-Agent".to_string(), self.user_agent.clone()),
            ],
            body: Bytes::from(body),
        })
    }

    /// Make one delivery attempt
    #[instrument(skip(self, job), fields(job_id = %job.id(), event = %job.event()))]
    pub async fn execute(&self, job: &WebhookJob) -> Result<DeliveryResponse, DeliveryError> {
        let payload = self.build_payload(job);
        let request = self.prepare(job, &payload)?;

        let response = self.transport.post(request).await?;

        if response.is_success() {
            debug!(status = response.status, "Delivery accepted");
            Ok(DeliveryResponse::new(
                response.status,
                response.headers,
                &response.body,
            ))
        } else {
            Err(DeliveryError::Http {
                status: response.status,
                body: truncate_body(&response.body),
            })
        }
    }
}

fn truncate_body(body: &Bytes) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
