//! # Webhook Target Credentials
//!
//! Resolves a named delivery target to the endpoint URL and the shared secret
//! used to sign payloads for it. Secrets are held in [`SecretValue`], which
//! zeroes its buffer on drop and never prints its contents.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use zeroize::Zeroizing;

// ============================================================================
// Secret Value
// ============================================================================

/// Secure container for a shared secret
///
/// Debug output and serialization both redact the value.
#[derive(Clone)]
pub struct SecretValue {
    inner: Zeroizing<String>,
}

impl SecretValue {
    pub fn from_string(value: String) -> Self {
        Self {
            inner: Zeroizing::new(value),
        }
    }

    /// Get secret as string (only for immediate use)
    pub fn expose_secret(&self) -> &str {
        self.inner.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.trim().is_empty()
    }

    /// Get secret length without exposing content
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::from_string(value.to_string())
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("length", &self.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for SecretValue {
    fn eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.inner.as_bytes().ct_eq(other.inner.as_bytes()).into()
    }
}

impl Eq for SecretValue {}

impl Serialize for SecretValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from_string)
    }
}

// ============================================================================
// Targets
// ============================================================================

/// Where a webhook goes and how it is signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookTarget {
    pub url: String,
    pub secret: SecretValue,
}

impl WebhookTarget {
    pub fn new(url: impl Into<String>, secret: impl Into<SecretValue>) -> Self {
        Self {
            url: url.into(),
            secret: secret.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("No webhook target named '{name}'")]
    NotFound { name: String },

    #[error("Webhook target '{name}' is misconfigured: {message}")]
    Invalid { name: String, message: String },

    #[error("Credential store unavailable: {message}")]
    Unavailable { message: String },
}

impl CredentialError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Source of `(url, secret)` pairs per named target
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<WebhookTarget, CredentialError>;

    /// Names of every target the store knows about
    async fn target_names(&self) -> Vec<String>;
}

/// Credential store backed by configuration loaded at startup
///
/// # Example
///
/// ```rust
/// use cms_bridge_core::{CredentialStore, InMemoryCredentialStore, WebhookTarget};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryCredentialStore::new()
///     .with_target("blog", WebhookTarget::new("https://blog.example.com/hook", "s3cret"));
///
/// let target = store.resolve("blog").await.unwrap();
/// assert_eq!(target.url, "https://blog.example.com/hook");
/// assert!(store.resolve("shop").await.is_err());
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    targets: HashMap<String, WebhookTarget>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, name: impl Into<String>, target: WebhookTarget) -> Self {
        self.targets.insert(name.into(), target);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, target: WebhookTarget) {
        self.targets.insert(name.into(), target);
    }
}

impl FromIterator<(String, WebhookTarget)> for InMemoryCredentialStore {
    fn from_iter<I: IntoIterator<Item = (String, WebhookTarget)>>(iter: I) -> Self {
        Self {
            targets: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn resolve(&self, name: &str) -> Result<WebhookTarget, CredentialError> {
        let target = self
            .targets
            .get(name)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound {
                name: name.to_string(),
            })?;

        if target.url.trim().is_empty() {
            return Err(CredentialError::Invalid {
                name: name.to_string(),
                message: "url is empty".to_string(),
            });
        }

        if target.secret.is_empty() {
            return Err(CredentialError::Invalid {
                name: name.to_string(),
                message: "secret is empty".to_string(),
            });
        }

        Ok(target)
    }

    async fn target_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.targets.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
