//! Generic JSON REST adapter for [`RemotePlatform`].
//!
//! Covers the common collection/item shape shared by most headless CMS
//! targets:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | lookup | `GET {base_url}?{lookup_param}={content_id}` |
//! | create | `POST {base_url}` |
//! | update | `PUT` or `PATCH {base_url}/{remote_id}` |
//! | delete | `DELETE {base_url}/{remote_id}` |
//!
//! Platforms that wrap documents in an envelope (Shopify's
//! `{"product": {...}}`) set `envelope` and `collection_envelope`. Error
//! bodies are normalized per [`PlatformKind`].

use async_trait::async_trait;
use cms_bridge_core::platform::normalize_http_error;
use cms_bridge_core::transform::path::get_path;
use cms_bridge_core::{
    ContentId, PlatformError, PlatformKind, RemoteId, RemotePlatform, RemoteRecord, SecretValue,
};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateMethod {
    #[default]
    Put,
    Patch,
}

impl UpdateMethod {
    fn as_method(&self) -> Method {
        match self {
            Self::Put => Method::PUT,
            Self::Patch => Method::PATCH,
        }
    }
}

/// Connection settings for one remote platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestPlatformConfig {
    pub kind: PlatformKind,

    /// Collection endpoint, e.g. `https://example.com/wp-json/wp/v2/posts`
    pub base_url: String,

    /// Query parameter carrying the CMS id on lookup
    pub lookup_param: String,

    /// Field of a returned record holding its remote id
    pub id_field: String,

    pub update_method: UpdateMethod,

    /// Sent as `Authorization: Bearer ...` when present
    pub token: Option<SecretValue>,

    /// Key wrapping single documents in requests and responses
    pub envelope: Option<String>,

    /// Path to the record list in lookup responses
    pub collection_envelope: Option<String>,

    /// Transformer preset used when syncing to this platform
    pub preset: Option<String>,

    pub request_timeout_seconds: u64,
}

impl Default for RestPlatformConfig {
    fn default() -> Self {
        Self {
            kind: PlatformKind::Generic,
            base_url: String::new(),
            lookup_param: "external_id".to_string(),
            id_field: "id".to_string(),
            update_method: UpdateMethod::Put,
            token: None,
            envelope: None,
            collection_envelope: None,
            preset: None,
            request_timeout_seconds: 10,
        }
    }
}

impl RestPlatformConfig {
    pub fn new(kind: PlatformKind, base_url: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

/// [`RemotePlatform`] over a JSON REST API
#[derive(Debug, Clone)]
pub struct RestPlatform {
    client: Client,
    config: RestPlatformConfig,
}

impl RestPlatform {
    pub fn new(config: RestPlatformConfig) -> Result<Self, PlatformError> {
        if url::Url::parse(&config.base_url).is_err() {
            return Err(PlatformError::validation(
                config.kind,
                format!("base_url '{}' is not a valid URL", config.base_url),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(crate::executor::default_user_agent())
            .build()
            .map_err(|e| PlatformError::network(config.kind, e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RestPlatformConfig {
        &self.config
    }

    fn collection_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn item_url(&self, remote_id: &RemoteId) -> String {
        format!("{}/{}", self.collection_url(), remote_id.as_str())
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.config.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    fn wrap(&self, document: &Value) -> Value {
        match &self.config.envelope {
            Some(key) => {
                let mut wrapped = serde_json::Map::new();
                wrapped.insert(key.clone(), document.clone());
                Value::Object(wrapped)
            }
            None => document.clone(),
        }
    }

    fn unwrap_single(&self, body: Value) -> Value {
        match &self.config.envelope {
            Some(key) => match body {
                Value::Object(mut fields) => fields.remove(key).unwrap_or(Value::Null),
                other => other,
            },
            None => body,
        }
    }

    fn record_from(&self, data: Value) -> Result<RemoteRecord, PlatformError> {
        let remote_id = match get_path(&data, &self.config.id_field) {
            Some(Value::String(s)) if !s.is_empty() => RemoteId::new(s.clone()),
            Some(Value::Number(n)) => RemoteId::new(n.to_string()),
            _ => {
                return Err(PlatformError::validation(
                    self.config.kind,
                    format!("response has no '{}' field", self.config.id_field),
                ))
            }
        };
        Ok(RemoteRecord::new(remote_id, data))
    }

    /// Send and return the parsed JSON body, normalizing non-2xx statuses
    async fn send(&self, builder: RequestBuilder) -> Result<Value, PlatformError> {
        let response = builder
            .send()
            .await
            .map_err(|e| PlatformError::network(self.config.kind, e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PlatformError::network(self.config.kind, e.to_string()))?;

        if !status.is_success() {
            return Err(normalize_http_error(self.config.kind, status.as_u16(), &text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            PlatformError::validation(self.config.kind, format!("response is not JSON: {}", e))
        })
    }
}

#[async_trait]
impl RemotePlatform for RestPlatform {
    fn kind(&self) -> PlatformKind {
        self.config.kind
    }

    #[instrument(skip(self), fields(platform = %self.config.kind))]
    async fn find_by_external_key(
        &self,
        content_id: &ContentId,
    ) -> Result<Option<RemoteRecord>, PlatformError> {
        let builder = self
            .request(Method::GET, self.collection_url())
            .query(&[(self.config.lookup_param.as_str(), content_id.as_str())]);
        let body = self.send(builder).await?;

        let records = match &self.config.collection_envelope {
            Some(path) => get_path(&body, path).cloned().unwrap_or(Value::Null),
            None => body,
        };

        let first = match records {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            Value::Array(_) | Value::Null => {
                debug!("No remote record for content");
                return Ok(None);
            }
            Value::Object(fields) => Value::Object(fields),
            _ => {
                return Err(PlatformError::validation(
                    self.config.kind,
                    "lookup response is not a list of records",
                ))
            }
        };

        self.record_from(first).map(Some)
    }

    #[instrument(skip(self, document), fields(platform = %self.config.kind))]
    async fn create(&self, document: &Value) -> Result<RemoteRecord, PlatformError> {
        let builder = self
            .request(Method::POST, self.collection_url())
            .json(&self.wrap(document));
        let body = self.send(builder).await?;
        self.record_from(self.unwrap_single(body))
    }

    #[instrument(skip(self, document), fields(platform = %self.config.kind, remote_id = %remote_id))]
    async fn update(
        &self,
        remote_id: &RemoteId,
        document: &Value,
    ) -> Result<RemoteRecord, PlatformError> {
        let builder = self
            .request(self.config.update_method.as_method(), &self.item_url(remote_id))
            .json(&self.wrap(document));
        let body = self.unwrap_single(self.send(builder).await?);

        // Some APIs answer updates with an empty body
        if body.is_null() {
            return Ok(RemoteRecord::new(remote_id.clone(), document.clone()));
        }
        self.record_from(body)
    }

    #[instrument(skip(self), fields(platform = %self.config.kind, remote_id = %remote_id))]
    async fn delete(&self, remote_id: &RemoteId) -> Result<(), PlatformError> {
        let builder = self.request(Method::DELETE, &self.item_url(remote_id));
        self.send(builder).await.map(|_| ())
    }
}

#[cfg(test)]
#[path = "rest_platform_tests.rs"]
mod tests;
