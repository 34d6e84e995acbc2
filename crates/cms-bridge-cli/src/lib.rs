//! # CMS Bridge CLI
//!
//! Command-line front-end for the CMS bridge.
//!
//! This module provides CLI commands for:
//! - Signing payloads and verifying signatures
//! - Running the transformer over a document
//! - Sending a single signed webhook through a delivery queue
//! - Syncing a document to a configured platform
//! - Validating and printing configuration
//!
//! Every command returns its output as a string so it can be tested without
//! capturing stdout.

use clap::{Parser, Subcommand};
use cms_bridge_core::signing::{sign, signature_header_value};
use cms_bridge_core::{
    verify, ContentId, Direction, PlatformError, SyncError, SyncOrchestrator, SyncOutcome,
    TransformError, TransformMapping, Transformer, WebhookTarget,
};
use cms_bridge_service::config::LoggingConfig;
use cms_bridge_service::{
    load_config, ConfigError, DeliveryError, DeliveryExecutor, DeliveryQueue, QueueError,
    ReqwestTransport, RestPlatform, ServiceConfig, WebhookJob,
};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// CLI Structure
// ============================================================================

/// CMS bridge CLI - signed webhooks and content sync for headless CMSs
#[derive(Parser, Debug)]
#[command(name = "cms-bridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Signed webhook delivery and content sync for headless CMSs")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CMS_BRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `cms_bridge_service=debug`
    #[arg(short, long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
///
/// Document arguments (`--data`) accept inline JSON, `@path` to read a file,
/// or `-` to read stdin.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the HMAC-SHA256 signature of a payload
    Sign {
        #[arg(short, long)]
        secret: String,

        /// Payload to sign
        #[arg(short, long, default_value = "-")]
        data: String,

        /// Print the full header value (`sha256=<hex>`)
        #[arg(long)]
        header: bool,
    },

    /// Check a payload against a signature
    Verify {
        #[arg(short, long)]
        secret: String,

        /// Signature, bare hex or `sha256=<hex>`
        #[arg(long)]
        signature: String,

        #[arg(short, long, default_value = "-")]
        data: String,
    },

    /// Transform a document with a preset or mapping file
    Transform {
        /// Built-in preset: wordpress, shopify or drupal
        #[arg(short, long, conflicts_with = "mapping", required_unless_present = "mapping")]
        preset: Option<String>,

        /// YAML or JSON mapping file
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// `forward`, `backward`, or a direction name such as `cms_to_wp`
        #[arg(long, default_value = "forward")]
        direction: String,

        #[arg(short, long, default_value = "-")]
        data: String,
    },

    /// Deliver one signed webhook and wait for the outcome
    Send {
        /// Target URL; requires --secret
        #[arg(short, long, requires = "secret", conflicts_with = "target")]
        url: Option<String>,

        #[arg(short, long)]
        secret: Option<String>,

        /// Named target from the configuration file
        #[arg(short, long, required_unless_present = "url")]
        target: Option<String>,

        /// Event name, e.g. `content.published`
        #[arg(short, long)]
        event: String,

        #[arg(short, long, default_value = "-")]
        data: String,
    },

    /// Push a CMS document to a configured platform
    Sync {
        /// Platform name from the configuration file
        #[arg(short, long)]
        platform: String,

        #[arg(short, long, default_value = "-")]
        data: String,

        /// Delete the document's remote copy instead
        #[arg(long)]
        delete: bool,
    },

    /// Validate configuration
    Config {
        /// Configuration file to validate; defaults to --config
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Show resolved configuration
        #[arg(short, long)]
        show: bool,

        /// Output format for configuration
        #[arg(short = 'F', long, default_value = "yaml")]
        format: ConfigFormat,
    },
}

/// Configuration format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

// ============================================================================
// Errors
// ============================================================================

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Signature does not match")]
    VerificationFailed,

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Could not queue delivery: {0}")]
    Queue(#[from] QueueError),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Platform setup failed: {0}")]
    Platform(#[from] PlatformError),
}

impl CliError {
    /// Process exit code for the CLI binary
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::VerificationFailed => 1,
            Self::InvalidArgument { .. } => 2,
            Self::Configuration(_) => 3,
            Self::Io(_) => 4,
            Self::Transform(_) => 5,
            Self::Delivery(_) | Self::Queue(_) => 6,
            Self::Sync(_) | Self::Platform(_) => 7,
        }
    }

    fn invalid(arg: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg: arg.to_string(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Parse arguments, set up logging and run the selected command
pub async fn run_cli() -> Result<String, CliError> {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: cli.log_level.clone(),
        json_format: cli.json_logs,
    };
    // A second init only happens in tests
    let _ = cms_bridge_service::logging::init_tracing(&logging);

    execute(cli).await
}

/// Run a parsed command and return what it prints
pub async fn execute(cli: Cli) -> Result<String, CliError> {
    let config_path = cli.config;

    match cli.command {
        Commands::Sign {
            secret,
            data,
            header,
        } => {
            let payload = read_input(&data)?;
            let digest = sign(payload.as_bytes(), &secret);
            Ok(if header {
                signature_header_value(&digest)
            } else {
                digest
            })
        }

        Commands::Verify {
            secret,
            signature,
            data,
        } => {
            let payload = read_input(&data)?;
            if verify(payload.as_bytes(), &signature, &secret) {
                Ok("Signature is valid".to_string())
            } else {
                Err(CliError::VerificationFailed)
            }
        }

        Commands::Transform {
            preset,
            mapping,
            direction,
            data,
        } => {
            let transformer = match (preset, mapping) {
                (Some(name), _) => Transformer::preset(&name)?,
                (None, Some(path)) => {
                    let source = std::fs::read_to_string(&path)?;
                    Transformer::new(TransformMapping::from_yaml(&source)?)?
                }
                (None, None) => {
                    return Err(CliError::invalid("preset", "either --preset or --mapping is required"))
                }
            };
            let document = parse_json("data", &read_input(&data)?)?;
            let direction = resolve_direction(&transformer, &direction)?;

            let output = transformer.apply(direction, &document)?;
            to_pretty_json(&output)
        }

        Commands::Send {
            url,
            secret,
            target,
            event,
            data,
        } => {
            let config = load_cli_config(config_path.as_deref())?;
            let content = parse_json("data", &read_input(&data)?)?;
            execute_send(&config, url, secret, target, &event, content).await
        }

        Commands::Sync {
            platform,
            data,
            delete,
        } => {
            let config = load_cli_config(config_path.as_deref())?;
            let document = parse_json("data", &read_input(&data)?)?;
            execute_sync(&config, &platform, &document, delete).await
        }

        Commands::Config { file, show, format } => {
            let path = file.or(config_path);
            let config = load_cli_config(path.as_deref())?;

            if !show {
                return Ok("Configuration is valid".to_string());
            }

            match format {
                ConfigFormat::Yaml => serde_yaml::to_string(&config)
                    .map_err(|e| CliError::invalid("format", e.to_string())),
                ConfigFormat::Json => to_pretty_json(&config),
            }
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

#[derive(Debug, Serialize)]
struct SendOutput {
    job_id: String,
    status: u16,
    data: Value,
}

async fn execute_send(
    config: &ServiceConfig,
    url: Option<String>,
    secret: Option<String>,
    target: Option<String>,
    event: &str,
    content: Value,
) -> Result<String, CliError> {
    let transport = ReqwestTransport::new(config.request_timeout())
        .map_err(|e| CliError::invalid("timeout", e.to_string()))?;
    let executor = DeliveryExecutor::new(Arc::new(transport))
        .with_user_agent(config.delivery.user_agent.clone());

    let queue = DeliveryQueue::builder(config.queue_settings(), config.retry_policy(), executor)
        .credentials(Arc::new(config.credential_store()))
        .start();

    let handle = match (url, secret, target) {
        (Some(url), Some(secret), _) => {
            let job = WebhookJob::new(WebhookTarget::new(url, secret), event, content)
                .map_err(QueueError::from)?;
            queue.enqueue(job)?
        }
        (None, _, Some(target)) => queue.enqueue_for_target(&target, event, content).await?,
        _ => {
            return Err(CliError::invalid(
                "target",
                "either --target or --url with --secret is required",
            ))
        }
    };

    let job_id = handle.job_id();
    info!(job_id = %job_id, event, "Webhook queued");

    let result = handle.wait().await;
    queue.shutdown();
    let response = result?;

    to_pretty_json(&SendOutput {
        job_id: job_id.to_string(),
        status: response.status,
        data: response.data,
    })
}

async fn execute_sync(
    config: &ServiceConfig,
    platform_name: &str,
    document: &Value,
    delete: bool,
) -> Result<String, CliError> {
    let platform_config = config
        .platforms
        .get(platform_name)
        .cloned()
        .ok_or_else(|| CliError::invalid("platform", format!("'{}' is not configured", platform_name)))?;

    let preset = platform_config.preset.clone().ok_or_else(|| {
        CliError::invalid(
            "platform",
            format!("'{}' has no transformer preset", platform_name),
        )
    })?;
    let transformer = Transformer::preset(&preset)?;
    let platform = RestPlatform::new(platform_config)?;
    let orchestrator = SyncOrchestrator::new(Arc::new(platform), transformer);

    let outcome = if delete {
        let content_id = ContentId::from_document(document)
            .map_err(|e| CliError::invalid("data", e.to_string()))?;
        orchestrator.delete(&content_id).await?
    } else {
        orchestrator.sync(document).await?
    };

    debug!(platform = platform_name, outcome = ?outcome, "Sync finished");
    Ok(describe_outcome(&outcome))
}

fn describe_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Created { remote_id } => format!("created {}", remote_id),
        SyncOutcome::Updated { remote_id } => format!("updated {}", remote_id),
        SyncOutcome::Deleted { remote_id } => format!("deleted {}", remote_id),
        SyncOutcome::AlreadyAbsent => "already absent".to_string(),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Load configuration from `path`, or use built-in defaults without one
pub fn load_cli_config(path: Option<&Path>) -> Result<ServiceConfig, CliError> {
    match path {
        Some(path) => {
            let path = path
                .to_str()
                .ok_or_else(|| CliError::invalid("config", "path is not valid UTF-8"))?;
            Ok(load_config(Some(path))?)
        }
        None => Ok(ServiceConfig::default()),
    }
}

/// Resolve `-` (stdin), `@path` (file) or an inline value
pub fn read_input(value: &str) -> Result<String, CliError> {
    if value == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }

    if let Some(path) = value.strip_prefix('@') {
        return Ok(std::fs::read_to_string(path)?);
    }

    Ok(value.to_string())
}

fn parse_json(arg: &str, raw: &str) -> Result<Value, CliError> {
    serde_json::from_str(raw).map_err(|e| CliError::invalid(arg, format!("not valid JSON: {}", e)))
}

fn resolve_direction(transformer: &Transformer, name: &str) -> Result<Direction, CliError> {
    match name {
        "forward" => Ok(Direction::Forward),
        "backward" => Ok(Direction::Backward),
        other => Ok(transformer.mapping().direction_named(other)?),
    }
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::invalid("output", e.to_string()))
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
