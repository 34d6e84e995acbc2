//! Error types for the delivery engine and HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use cms_bridge_core::{
    ContentId, CredentialError, SignatureError, Timestamp, TransformError, ValidationError,
};
use std::time::Duration;
use tracing::{error, warn};

// ============================================================================
// Transport Errors
// ============================================================================

/// Failure to get any HTTP response at all
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out after {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    #[error("Connection failed: {message}")]
    Connect { message: String },

    #[error("Request failed: {message}")]
    Request { message: String },

    #[error("HTTP client could not be built: {message}")]
    ClientBuild { message: String },
}

impl TransportError {
    pub(crate) fn from_reqwest(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout { timeout }
        } else if error.is_connect() {
            Self::Connect {
                message: error.to_string(),
            }
        } else {
            Self::Request {
                message: error.to_string(),
            }
        }
    }
}

// ============================================================================
// Delivery Errors
// ============================================================================

/// Why a webhook delivery did not succeed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Target answered with a non-2xx status
    #[error("Target responded with HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Delivery timed out after {timeout_seconds}s")]
    Timeout { timeout_seconds: u64 },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Payload could not be serialized: {message}")]
    Serialization { message: String },

    /// Every allowed attempt failed
    #[error("Delivery of '{event}' for content {content_id} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        event: String,
        content_id: ContentId,
        attempts: u32,
        last_error: Box<DeliveryError>,
    },

    /// The job was still waiting when the queue was cleared
    #[error("Queue was cleared before the job was delivered")]
    Cleared,

    /// The queue's processing loop is gone
    #[error("Delivery queue stopped before the job completed")]
    QueueStopped,
}

impl DeliveryError {
    /// Non-2xx responses and transport failures are retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Timeout { .. } | Self::Network { .. }
        )
    }

    /// HTTP status of the last response, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Exhausted { last_error, .. } => last_error.status(),
            _ => None,
        }
    }
}

impl From<TransportError> for DeliveryError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Timeout { timeout } => Self::Timeout {
                timeout_seconds: timeout.as_secs().max(1),
            },
            other => Self::Network {
                message: other.to_string(),
            },
        }
    }
}

// ============================================================================
// Queue Errors
// ============================================================================

/// Enqueue rejections; these never reach the delivery loop
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Delivery queue is full ({capacity} jobs)")]
    Full { capacity: usize },

    #[error("Job rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Target lookup failed: {0}")]
    Credential(#[from] CredentialError),

    #[error("Delivery queue has been shut down")]
    Stopped,
}

impl QueueError {
    /// A full queue may have room later, and a stopped one is replaced on restart
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Full { .. } | Self::Stopped => true,
            Self::Credential(e) => e.is_transient(),
            Self::Validation(_) => false,
        }
    }
}

// ============================================================================
// Inbound Handler Errors
// ============================================================================

/// Inbound webhook failures with HTTP status code mapping
///
/// - `401 Unauthorized`: missing or mismatched signature
/// - `404 Not Found`: the `{source}` segment names no configured source
/// - `400 Bad Request`: body is not JSON
/// - `422 Unprocessable Entity`: payload failed transformation
/// - `503 Service Unavailable`: relay queue full, retry later
/// - `500 Internal Server Error`: relay misconfiguration
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("Unknown inbound source: {source_name}")]
    UnknownSource { source_name: String },

    #[error("Signature verification failed: {0}")]
    Signature(#[from] SignatureError),

    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    #[error("Payload rejected: {0}")]
    Transform(#[from] TransformError),

    #[error("Relay failed: {0}")]
    Relay(#[from] QueueError),
}

impl IntoResponse for InboundError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match self {
            Self::UnknownSource { ref source_name } => {
                warn!(source = %source_name, "Inbound source not found");
                (StatusCode::NOT_FOUND, self.to_string(), None)
            }
            Self::Signature(_) => {
                warn!("Rejected inbound webhook with invalid signature");
                (StatusCode::UNAUTHORIZED, self.to_string(), None)
            }
            Self::MalformedPayload { .. } => (StatusCode::BAD_REQUEST, self.to_string(), None),
            Self::Transform(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string(), None),
            Self::Relay(ref e) if e.is_transient() => {
                warn!(error = %e, "Relay queue unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string(), Some(60))
            }
            Self::Relay(ref e) => {
                // Details stay server-side
                error!(error = %e, "Relay misconfigured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error occurred. Please try again later.".to_string(),
                    None,
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": Timestamp::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

// ============================================================================
// Service and Configuration Errors
// ============================================================================

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Process exit code for the service binary
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration loading failed: {0}")]
    Loading(#[from] config::ConfigError),

    #[error("Transform preset for '{source_name}' is invalid: {error}")]
    Mapping {
        source_name: String,
        error: TransformError,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
