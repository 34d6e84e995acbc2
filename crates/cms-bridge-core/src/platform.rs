//! Platform error normalization.
//!
//! Every platform reports failures in its own body shape. The functions here
//! turn a status code and raw body into a [`PlatformError`] so the sync and
//! delivery cores only ever branch on [`PlatformErrorKind`].
//!
//! | Platform | Body shape |
//! |----------|------------|
//! | WordPress | `{"code": "...", "message": "...", "data": {"status": 404}}` |
//! | Shopify | `{"errors": "..."}` or `{"errors": {"title": ["can't be blank"]}}` |
//! | Drupal (JSON:API) | `{"errors": [{"title": "...", "detail": "..."}]}` |
//! | Facebook Graph | `{"error": {"message": "...", "type": "...", "code": 190}}` |
//! | LinkedIn | `{"message": "...", "status": 401, "serviceErrorCode": 65600}` |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::ParseError;

/// Platforms with a dedicated error normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    WordPress,
    Shopify,
    Drupal,
    Facebook,
    LinkedIn,
    #[default]
    Generic,
}

impl PlatformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WordPress => "wordpress",
            Self::Shopify => "shopify",
            Self::Drupal => "drupal",
            Self::Facebook => "facebook",
            Self::LinkedIn => "linkedin",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wordpress" | "wp" => Ok(Self::WordPress),
            "shopify" => Ok(Self::Shopify),
            "drupal" => Ok(Self::Drupal),
            "facebook" | "fb" => Ok(Self::Facebook),
            "linkedin" => Ok(Self::LinkedIn),
            "generic" => Ok(Self::Generic),
            _ => Err(ParseError::InvalidFormat {
                expected: "wordpress, shopify, drupal, facebook, linkedin, or generic".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

/// Broad classification of a platform failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformErrorKind {
    /// The request never produced a response (DNS, connect, timeout)
    Network,
    /// The platform answered with a non-success status
    Http { status: u16 },
    /// The request was rejected locally before it was sent
    Validation,
}

impl fmt::Display for PlatformErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network error"),
            Self::Http { status } => write!(f, "HTTP {}", status),
            Self::Validation => write!(f, "validation error"),
        }
    }
}

/// A platform failure with its message already extracted
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{platform} {kind}: {message}")]
pub struct PlatformError {
    pub platform: PlatformKind,
    pub kind: PlatformErrorKind,
    pub message: String,
    /// Raw response body, when there was one
    pub raw: Option<Value>,
}

impl PlatformError {
    pub fn new(
        platform: PlatformKind,
        kind: PlatformErrorKind,
        message: impl Into<String>,
        raw: Option<Value>,
    ) -> Self {
        Self {
            platform,
            kind,
            message: message.into(),
            raw,
        }
    }

    pub fn network(platform: PlatformKind, message: impl Into<String>) -> Self {
        Self::new(platform, PlatformErrorKind::Network, message, None)
    }

    pub fn validation(platform: PlatformKind, message: impl Into<String>) -> Self {
        Self::new(platform, PlatformErrorKind::Validation, message, None)
    }

    /// HTTP status, when the platform responded
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            PlatformErrorKind::Http { status } => Some(status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404) | Some(410))
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// Network failures, throttling, and server errors may succeed later
    pub fn is_transient(&self) -> bool {
        match self.kind {
            PlatformErrorKind::Network => true,
            PlatformErrorKind::Http { status } => status == 408 || status == 429 || status >= 500,
            PlatformErrorKind::Validation => false,
        }
    }
}

/// Build a [`PlatformError`] from an HTTP status and response body.
///
/// The body is parsed as JSON when possible and the platform's message field
/// extracted; otherwise the trimmed body text (or the status reason) is used.
pub fn normalize_http_error(platform: PlatformKind, status: u16, body: &str) -> PlatformError {
    let raw: Option<Value> = serde_json::from_str(body).ok();

    let message = raw
        .as_ref()
        .and_then(|value| extract_message(platform, value))
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| truncate(trimmed, 512))
        })
        .unwrap_or_else(|| format!("request failed with status {}", status));

    PlatformError::new(platform, PlatformErrorKind::Http { status }, message, raw)
}

fn extract_message(platform: PlatformKind, body: &Value) -> Option<String> {
    let specific = match platform {
        PlatformKind::WordPress => string_at(body, "message"),
        PlatformKind::Shopify => shopify_message(body),
        PlatformKind::Drupal => drupal_message(body),
        PlatformKind::Facebook => body.get("error").and_then(|e| string_at(e, "message")),
        PlatformKind::LinkedIn => string_at(body, "message"),
        PlatformKind::Generic => None,
    };

    specific.or_else(|| generic_message(body))
}

fn shopify_message(body: &Value) -> Option<String> {
    match body.get("errors")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(fields) => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(field, messages)| match messages {
                    Value::Array(items) => {
                        let joined: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                        format!("{} {}", field, joined.join(", "))
                    }
                    Value::String(s) => format!("{} {}", field, s),
                    other => format!("{} {}", field, other),
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

fn drupal_message(body: &Value) -> Option<String> {
    let errors = body.get("errors")?.as_array()?;
    let parts: Vec<String> = errors
        .iter()
        .filter_map(|error| {
            string_at(error, "detail").or_else(|| string_at(error, "title"))
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("; "))
}

fn generic_message(body: &Value) -> Option<String> {
    string_at(body, "message")
        .or_else(|| body.get("error").and_then(|e| string_at(e, "message")))
        .or_else(|| string_at(body, "error"))
        .or_else(|| string_at(body, "detail"))
}

fn string_at(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
#[path = "platform_tests.rs"]
mod tests;
