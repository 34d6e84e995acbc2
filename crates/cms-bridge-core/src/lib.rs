//! # CMS Bridge Core
//!
//! Core business logic for synchronizing content between a headless CMS and
//! third-party platforms (WordPress, Shopify, Drupal, social networks).
//!
//! This crate contains the parts of the bridge that carry real invariants:
//! payload signing and verification, the bidirectional content transformation
//! layer, and the create-vs-update sync orchestration.
//!
//! ## Architecture
//!
//! - Business logic depends only on trait abstractions ([`Clock`],
//!   [`sync::RemotePlatform`], [`sync::SyncLedger`], [`credentials::CredentialStore`])
//! - Infrastructure implementations (HTTP transports, REST adapters) live in the
//!   service crate and are injected at runtime
//!
//! ## Usage
//!
//! ```rust
//! use cms_bridge_core::{ContentId, JobId};
//!
//! let job_id = JobId::new();
//! let content_id = ContentId::new("abc123").unwrap();
//! assert_eq!(content_id.as_str(), "abc123");
//! assert!(!job_id.to_string().is_empty());
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

// Re-export commonly used types
pub use ulid::Ulid;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Unique identifier for a queued webhook delivery job
///
/// Uses ULID so identifiers sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(Ulid);

impl JobId {
    /// Generate a new unique job ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = s.parse::<Ulid>().map_err(|_| ParseError::InvalidFormat {
            expected: "ULID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(ulid))
    }
}

/// Identifier of a content item in the CMS
///
/// Content identifiers arrive as strings or numbers depending on the CMS
/// collection; both are normalized to their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(String);

impl ContentId {
    /// Create new content ID with validation
    ///
    /// # Validation Rules
    /// - Must not be empty or whitespace only
    /// - Must be at most 256 characters
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "content_id".to_string(),
            });
        }

        if value.len() > 256 {
            return Err(ValidationError::TooLong {
                field: "content_id".to_string(),
                max_length: 256,
            });
        }

        Ok(Self(value))
    }

    /// Extract the identifier of a content document.
    ///
    /// Looks at `id` first and falls back to `_id`. String and integer values
    /// are accepted; anything else is reported as missing.
    pub fn from_document(document: &serde_json::Value) -> Result<Self, ValidationError> {
        for key in ["id", "_id"] {
            match document.get(key) {
                Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {
                    return Self::new(s.clone())
                }
                Some(serde_json::Value::Number(n)) => return Self::new(n.to_string()),
                _ => continue,
            }
        }

        Err(ValidationError::Required {
            field: "id".to_string(),
        })
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Identifier a remote platform assigned to a synced record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from Unix seconds
    pub fn from_unix_seconds(seconds: i64) -> Result<Self, ParseError> {
        Utc.timestamp_opt(seconds, 0)
            .single()
            .map(Self)
            .ok_or_else(|| ParseError::InvalidFormat {
                expected: "Unix timestamp in seconds".to_string(),
                actual: seconds.to_string(),
            })
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Seconds since the Unix epoch
    pub fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Add a duration to the timestamp
    pub fn add_duration(&self, duration: Duration) -> Self {
        let chrono_duration = chrono::Duration::from_std(duration).unwrap_or_default();
        Self(self.0 + chrono_duration)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

/// Source of wall-clock time.
///
/// Delivery payloads carry the send time, so anything that stamps a request
/// reads it through this trait and tests can pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<RwLock<Timestamp>>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Arc::new(RwLock::new(start)),
        }
    }

    /// Replace the current time
    pub fn set(&self, timestamp: Timestamp) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = timestamp;
    }

    /// Move the current time forward
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = current.add_duration(duration);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry and alerting decisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that should be retried
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
    /// Security-related failures requiring immediate attention
    Security,
    /// Configuration errors preventing startup
    Configuration,
}

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Required fields missing or empty: {}", .fields.join(", "))]
    MissingFields { fields: Vec<String> },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },
}

impl ValidationError {
    /// Names of every field this error reports on
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Required { field }
            | Self::InvalidFormat { field, .. }
            | Self::TooLong { field, .. } => vec![field.as_str()],
            Self::MissingFields { fields } => fields.iter().map(String::as_str).collect(),
        }
    }
}

/// Error type for string parsing failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

/// Top-level error type for bridge operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Signature error: {0}")]
    Signature(#[from] signing::SignatureError),

    #[error("Transform error: {0}")]
    Transform(#[from] transform::TransformError),

    #[error("Sync error: {0}")]
    Sync(#[from] sync::SyncError),

    #[error("Credential error: {0}")]
    Credential(#[from] credentials::CredentialError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl BridgeError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Sync(e) => e.is_transient(),
            Self::Validation(_)
            | Self::Parse(_)
            | Self::Signature(_)
            | Self::Transform(_)
            | Self::Credential(_)
            | Self::Configuration { .. } => false,
        }
    }

    /// Get error category for monitoring and alerting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::Parse(_) | Self::Transform(_) => ErrorCategory::Permanent,
            Self::Signature(_) => ErrorCategory::Security,
            Self::Credential(_) | Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Sync(e) if e.is_transient() => ErrorCategory::Transient,
            Self::Sync(_) => ErrorCategory::Permanent,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// HMAC-SHA256 payload signing and verification
pub mod signing;

/// Bidirectional content transformation between CMS and platform shapes
pub mod transform;

/// Platform error normalization
pub mod platform;

/// Create-vs-update sync orchestration
pub mod sync;

/// Webhook target credentials
pub mod credentials;

// Re-export key types for convenience
pub use credentials::{
    CredentialError, CredentialStore, InMemoryCredentialStore, SecretValue, WebhookTarget,
};
pub use platform::{PlatformError, PlatformErrorKind, PlatformKind};
pub use signing::{sign, verify, verify_header, SignatureError, SIGNATURE_PREFIX};
pub use sync::{
    InMemorySyncLedger, RemotePlatform, RemoteRecord, SyncError, SyncLedger, SyncOrchestrator,
    SyncOutcome, SyncPolicy, SyncState,
};
pub use transform::{Direction, TransformError, TransformMapping, Transformer};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
