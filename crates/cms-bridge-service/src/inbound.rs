//! # Inbound Webhooks
//!
//! Verification and handling of webhooks that platforms send back to the
//! bridge. A request is accepted only if its `X-CMS-Signature` header matches
//! an HMAC-SHA256 of the raw body under the source's configured secret.
//! Verification always runs over the exact bytes received, before the body is
//! parsed.

use crate::config::InboundSourceConfig;
use crate::errors::InboundError;
use crate::queue::DeliveryQueue;
use async_trait::async_trait;
use cms_bridge_core::{verify_header, Transformer};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Receives verified inbound payloads
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, source: &str, payload: Value) -> Result<(), InboundError>;
}

/// A configured source with its transformer resolved up front
#[derive(Debug, Clone)]
struct InboundSource {
    config: InboundSourceConfig,
    transformer: Option<Transformer>,
}

/// The set of sources allowed to call `/inbound/{source}`
#[derive(Debug, Clone, Default)]
pub struct InboundSources {
    sources: BTreeMap<String, InboundSource>,
}

impl InboundSources {
    /// Build from configuration; fails on an unknown transformer preset
    pub fn from_config(
        config: &BTreeMap<String, InboundSourceConfig>,
    ) -> Result<Self, InboundError> {
        let mut sources = BTreeMap::new();
        for (name, source) in config {
            let transformer = source
                .preset
                .as_deref()
                .map(Transformer::preset)
                .transpose()?;
            sources.insert(
                name.clone(),
                InboundSource {
                    config: source.clone(),
                    transformer,
                },
            );
        }
        Ok(Self { sources })
    }

    pub fn contains(&self, source: &str) -> bool {
        self.sources.contains_key(source)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    /// Check the signature over the raw body, then parse it.
    pub fn verify(
        &self,
        source: &str,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<Value, InboundError> {
        let entry = self.get(source)?;

        verify_header(body, signature, entry.config.secret.expose_secret())?;

        serde_json::from_slice(body).map_err(|e| InboundError::MalformedPayload {
            message: e.to_string(),
        })
    }

    fn get(&self, source: &str) -> Result<&InboundSource, InboundError> {
        self.sources
            .get(source)
            .ok_or_else(|| InboundError::UnknownSource {
                source_name: source.to_string(),
            })
    }
}

/// Converts inbound payloads to CMS documents and relays them to the
/// source's configured target through the delivery queue.
///
/// Relaying is fire-and-forget: the handler returns once the job is queued.
/// Sources without a `relay_to` target are only logged.
#[derive(Clone)]
pub struct RelayInboundHandler {
    sources: InboundSources,
    queue: DeliveryQueue,
}

impl RelayInboundHandler {
    pub fn new(sources: InboundSources, queue: DeliveryQueue) -> Self {
        Self { sources, queue }
    }
}

#[async_trait]
impl InboundHandler for RelayInboundHandler {
    async fn handle(&self, source: &str, payload: Value) -> Result<(), InboundError> {
        let entry = self.sources.get(source)?;

        let document = match &entry.transformer {
            Some(transformer) => transformer.backward(&payload)?,
            None => payload,
        };

        let Some(target) = entry.config.relay_to.as_deref() else {
            debug!(source, "Inbound payload accepted without relay target");
            return Ok(());
        };

        let handle = self
            .queue
            .enqueue_for_target(target, &entry.config.event, document)
            .await?;

        info!(
            source,
            target,
            job_id = %handle.job_id(),
            event = %entry.config.event,
            "Inbound payload relayed"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "inbound_tests.rs"]
mod tests;
