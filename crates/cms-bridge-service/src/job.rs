//! Webhook jobs and the wire payload they turn into.

use bytes::Bytes;
use cms_bridge_core::{ContentId, JobId, SecretValue, Timestamp, ValidationError, WebhookTarget};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One outbound webhook waiting to be delivered
///
/// Everything except the attempt counter is fixed at enqueue time.
#[derive(Debug, Clone)]
pub struct WebhookJob {
    id: JobId,
    target_url: String,
    secret: SecretValue,
    event: String,
    content_id: ContentId,
    content: Value,
    enqueued_at: Timestamp,
    attempt_count: u32,
}

impl WebhookJob {
    /// Build a job for `content`, which must carry an `id` (or `_id`) field
    pub fn new(
        target: WebhookTarget,
        event: impl Into<String>,
        content: Value,
    ) -> Result<Self, ValidationError> {
        let event = event.into();
        if event.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "event".to_string(),
            });
        }

        if target.url.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "url".to_string(),
            });
        }

        let content_id = ContentId::from_document(&content)?;

        Ok(Self {
            id: JobId::new(),
            target_url: target.url,
            secret: target.secret,
            event,
            content_id,
            content,
            enqueued_at: Timestamp::now(),
            attempt_count: 0,
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn secret(&self) -> &SecretValue {
        &self.secret
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    pub fn enqueued_at(&self) -> Timestamp {
        self.enqueued_at
    }

    /// Failed deliveries so far
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub(crate) fn record_failure(&mut self) -> u32 {
        self.attempt_count += 1;
        self.attempt_count
    }
}

/// JSON body sent to the target
///
/// Field order is the wire order: `event`, `content_id`, `content`, `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub content_id: String,
    pub content: Value,
    /// Unix seconds at send time
    pub timestamp: i64,
}

/// What a successful delivery hands back to the enqueuer
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryResponse {
    pub status: u16,
    /// Parsed JSON body, or the body text as a string when it is not JSON
    pub data: Value,
    /// Response headers with lowercase names
    pub headers: BTreeMap<String, String>,
}

impl DeliveryResponse {
    pub fn new(status: u16, headers: BTreeMap<String, String>, body: &Bytes) -> Self {
        let data = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(body)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
        };

        Self {
            status,
            data,
            headers,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
