//! Configuration types for the bridge service
//!
//! Every section carries serde defaults, so an empty file (or no file at all)
//! produces a runnable configuration.

use crate::errors::ConfigError;
use crate::queue::QueueSettings;
use crate::rest_platform::RestPlatformConfig;
use crate::retry::RetryPolicy;
use cms_bridge_core::{InMemoryCredentialStore, SecretValue, Transformer, WebhookTarget};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

/// Environment variable naming an explicit configuration file
pub const CONFIG_FILE_ENV: &str = "CMS_BRIDGE_CONFIG_FILE";

/// Prefix for `CMS_BRIDGE__SECTION__KEY` overrides
pub const ENV_PREFIX: &str = "CMS_BRIDGE";

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub delivery: DeliveryConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,

    /// Named outbound webhook targets
    pub targets: BTreeMap<String, WebhookTarget>,

    /// Named inbound webhook sources, addressed as `/inbound/{name}`
    pub inbound: BTreeMap<String, InboundSourceConfig>,

    /// Named remote platforms for content sync
    pub platforms: BTreeMap<String, RestPlatformConfig>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Grace period for in-flight requests on shutdown
    pub shutdown_timeout_seconds: u64,

    /// Maximum inbound request body in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Outbound delivery limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub max_queue_size: usize,
    pub max_concurrent: usize,
    pub rate_limit_per_minute: u32,
    pub poll_interval_ms: u64,
    pub request_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        let queue = QueueSettings::default();
        Self {
            max_queue_size: queue.max_queue_size,
            max_concurrent: queue.max_concurrent,
            rate_limit_per_minute: queue.rate_limit_per_minute,
            poll_interval_ms: queue.poll_interval.as_millis() as u64,
            request_timeout_seconds: 10,
            user_agent: crate::executor::default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_percent: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 300_000,
            jitter_percent: 0.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "cms_bridge_service=info,cms_bridge_core=info,tower_http=debug".to_string(),
            json_format: false,
        }
    }
}

/// One inbound webhook source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundSourceConfig {
    /// Shared secret the source signs its requests with
    pub secret: SecretValue,

    /// Transformer preset turning the source's payload into a CMS document
    #[serde(default)]
    pub preset: Option<String>,

    /// Target to relay accepted payloads to
    #[serde(default)]
    pub relay_to: Option<String>,

    /// Event name used when relaying
    #[serde(default = "default_inbound_event")]
    pub event: String,
}

fn default_inbound_event() -> String {
    "content.updated".to_string()
}

impl InboundSourceConfig {
    pub fn new(secret: impl Into<SecretValue>) -> Self {
        Self {
            secret: secret.into(),
            preset: None,
            relay_to: None,
            event: default_inbound_event(),
        }
    }
}

impl ServiceConfig {
    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        if self.server.port == 0 {
            return invalid("server.port must not be 0".to_string());
        }

        let delivery = &self.delivery;
        if delivery.max_queue_size == 0 {
            return invalid("delivery.max_queue_size must be at least 1".to_string());
        }
        if delivery.max_concurrent == 0 {
            return invalid("delivery.max_concurrent must be at least 1".to_string());
        }
        if delivery.rate_limit_per_minute == 0 {
            return invalid("delivery.rate_limit_per_minute must be at least 1".to_string());
        }
        if delivery.poll_interval_ms == 0 {
            return invalid("delivery.poll_interval_ms must be at least 1".to_string());
        }
        if delivery.request_timeout_seconds == 0 {
            return invalid("delivery.request_timeout_seconds must be at least 1".to_string());
        }

        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".to_string());
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return invalid("retry.max_delay_ms must not be below retry.base_delay_ms".to_string());
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_percent) {
            return invalid("retry.jitter_percent must be between 0.0 and 1.0".to_string());
        }

        for (name, target) in &self.targets {
            if url::Url::parse(&target.url).is_err() {
                return invalid(format!("targets.{}.url '{}' is not a valid URL", name, target.url));
            }
            if target.secret.is_empty() {
                return invalid(format!("targets.{}.secret must not be empty", name));
            }
        }

        for (name, source) in &self.inbound {
            if source.secret.is_empty() {
                return invalid(format!("inbound.{}.secret must not be empty", name));
            }
            if let Some(preset) = &source.preset {
                Transformer::preset(preset).map_err(|error| ConfigError::Mapping {
                    source_name: name.clone(),
                    error,
                })?;
            }
            if let Some(target) = &source.relay_to {
                if !self.targets.contains_key(target) {
                    return invalid(format!(
                        "inbound.{}.relay_to names unknown target '{}'",
                        name, target
                    ));
                }
            }
        }

        for (name, platform) in &self.platforms {
            if url::Url::parse(&platform.base_url).is_err() {
                return invalid(format!(
                    "platforms.{}.base_url '{}' is not a valid URL",
                    name, platform.base_url
                ));
            }
            if let Some(preset) = &platform.preset {
                Transformer::preset(preset).map_err(|error| ConfigError::Mapping {
                    source_name: name.clone(),
                    error,
                })?;
            }
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
        )
        .with_jitter_percent(self.retry.jitter_percent)
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            max_queue_size: self.delivery.max_queue_size,
            max_concurrent: self.delivery.max_concurrent,
            rate_limit_per_minute: self.delivery.rate_limit_per_minute,
            poll_interval: Duration::from_millis(self.delivery.poll_interval_ms),
            ..QueueSettings::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery.request_timeout_seconds)
    }

    /// Credential store holding every configured target
    pub fn credential_store(&self) -> InMemoryCredentialStore {
        self.targets
            .iter()
            .map(|(name, target)| (name.clone(), target.clone()))
            .collect()
    }
}

/// Load, deserialize and validate the service configuration.
///
/// Sources, later ones overriding earlier ones:
///
/// 1. `/etc/cms-bridge/service.yaml`
/// 2. `./config/service.yaml`
/// 3. `explicit`, or else the file named by `CMS_BRIDGE_CONFIG_FILE`
/// 4. `CMS_BRIDGE__SECTION__KEY` environment variables
///
/// Missing default files are fine; a named file that is missing or malformed
/// is an error.
pub fn load_config(explicit: Option<&str>) -> Result<ServiceConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/cms-bridge/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    let env_path = std::env::var(CONFIG_FILE_ENV).ok();
    let explicit_path = explicit
        .map(str::to_string)
        .or(env_path)
        .filter(|path| !path.is_empty());

    if let Some(path) = &explicit_path {
        builder = builder.add_source(
            config::File::with_name(path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
        info!(path = %path, "Loading configuration from explicit path");
    }

    let service_config: ServiceConfig = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;

    service_config.validate()?;
    Ok(service_config)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
