//! # CMS Bridge Service
//!
//! Outbound webhook delivery engine and HTTP service for the CMS bridge.
//!
//! This crate provides:
//! - The delivery queue with its concurrency/rate governor and retry scheduler
//! - Signed webhook delivery over `reqwest`
//! - A generic REST adapter for content sync
//! - The inbound verification endpoint, health and metrics over `axum`

pub mod config;
pub mod errors;
pub mod events;
pub mod executor;
pub mod inbound;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod queue;
pub mod rest_platform;
pub mod retry;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use config::{load_config, InboundSourceConfig, ServiceConfig};
pub use errors::{ConfigError, DeliveryError, InboundError, QueueError, ServiceError, TransportError};
pub use events::{ChannelObserver, DeliveryEvent, DeliveryObserver, ObserverSet, TracingObserver};
pub use executor::DeliveryExecutor;
pub use inbound::{InboundHandler, InboundSources, RelayInboundHandler};
pub use job::{DeliveryResponse, WebhookJob, WebhookPayload};
pub use metrics::DeliveryMetrics;
pub use queue::{DeliveryHandle, DeliveryQueue, QueueSettings, QueueStats};
pub use rest_platform::{RestPlatform, RestPlatformConfig, UpdateMethod};
pub use retry::RetryPolicy;
pub use transport::{ReqwestTransport, WebhookTransport};

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use cms_bridge_core::signing::SIGNATURE_HEADER;
use serde::Serialize;
use std::future::{Future, IntoFuture};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::Notify;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,

    /// Outbound delivery queue
    pub queue: DeliveryQueue,

    /// Sources allowed on `/inbound/{source}`
    pub inbound: InboundSources,

    /// Receives verified inbound payloads
    pub inbound_handler: Arc<dyn InboundHandler>,

    pub metrics: Arc<DeliveryMetrics>,
}

impl AppState {
    /// Wire the queue, observers and inbound handling from configuration.
    ///
    /// Must be called inside a tokio runtime; the queue's processing task
    /// starts immediately.
    pub fn from_config(config: ServiceConfig) -> Result<Self, ServiceError> {
        let invalid = |message: String| ServiceError::Configuration(ConfigError::Invalid { message });

        let metrics = DeliveryMetrics::new()
            .map_err(|e| invalid(format!("Failed to initialize metrics: {}", e)))?;

        let transport = ReqwestTransport::new(config.request_timeout())
            .map_err(|e| invalid(e.to_string()))?;
        let executor = DeliveryExecutor::new(Arc::new(transport))
            .with_user_agent(config.delivery.user_agent.clone());

        let observers = ObserverSet::new()
            .with(Arc::new(TracingObserver))
            .with(metrics.clone());

        let queue = DeliveryQueue::builder(config.queue_settings(), config.retry_policy(), executor)
            .observer(Arc::new(observers))
            .credentials(Arc::new(config.credential_store()))
            .start();

        let inbound =
            InboundSources::from_config(&config.inbound).map_err(|e| invalid(e.to_string()))?;
        let inbound_handler = Arc::new(RelayInboundHandler::new(inbound.clone(), queue.clone()));

        Ok(Self {
            config: Arc::new(config),
            queue,
            inbound,
            inbound_handler,
            metrics,
        })
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let inbound_routes = Router::new().route("/inbound/{source}", post(handle_inbound));

    let health_routes = Router::new().route("/health", get(handle_health_check));

    let observability_routes = Router::new().route("/metrics", get(metrics_endpoint));

    let max_body_size = state.config.server.max_body_size;

    Router::new()
        .merge(inbound_routes)
        .merge(health_routes)
        .merge(observability_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

/// Run the HTTP server until SIGINT/SIGTERM, then drain the delivery queue.
///
/// Jobs still waiting at shutdown are rejected; nothing is persisted.
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let server = &state.config.server;
    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .map_err(|e: std::net::AddrParseError| ServiceError::BindFailed {
            address: format!("{}:{}", server.host, server.port),
            message: e.to_string(),
        })?;
    let shutdown_timeout = Duration::from_secs(server.shutdown_timeout_seconds);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: addr.to_string(),
            message: e.to_string(),
        })?;

    info!("Starting HTTP server on {}", addr);

    let queue = state.queue.clone();
    let app = create_router(state);

    let draining = Arc::new(Notify::new());
    let signal_draining = Arc::clone(&draining);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal(shutdown_timeout).await;
            signal_draining.notify_one();
        })
        .into_future();

    let drained = run_with_drain_limit(server, draining, shutdown_timeout)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;
    if !drained {
        warn!(
            timeout_seconds = shutdown_timeout.as_secs(),
            "Graceful shutdown timed out; dropping open connections"
        );
    }

    let rejected = queue.clear();
    queue.shutdown();
    info!(rejected, "HTTP server shutdown complete");
    Ok(())
}

/// Drive `server` to completion, but give up `timeout` after `draining` fires.
///
/// Returns `Ok(false)` when the drain was cut short.
async fn run_with_drain_limit<F, E>(
    server: F,
    draining: Arc<Notify>,
    timeout: Duration,
) -> Result<bool, E>
where
    F: Future<Output = Result<(), E>>,
{
    let deadline = async {
        draining.notified().await;
        tokio::time::sleep(timeout).await;
    };

    tokio::select! {
        result = server => result.map(|()| true),
        _ = deadline => Ok(false),
    }
}

async fn shutdown_signal(shutdown_timeout: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
        },
    }
}

// ============================================================================
// Inbound Handlers
// ============================================================================

/// Verify and accept a webhook from a configured source
///
/// The signature is checked over the raw body bytes before anything is
/// parsed. Accepted payloads are handed to the inbound handler and answered
/// with `202 Accepted`.
#[instrument(skip(state, headers, body), fields(body_len = body.len()))]
pub async fn handle_inbound(
    State(state): State<AppState>,
    Path(source): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<InboundResponse>), InboundError> {
    // Unknown names share one label
    let source_label = if state.inbound.contains(&source) {
        source.as_str()
    } else {
        "unknown"
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let result = match state.inbound.verify(&source, &body, signature) {
        Ok(payload) => state.inbound_handler.handle(&source, payload).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        state.metrics.record_inbound(source_label, "rejected");
        return Err(e);
    }

    state.metrics.record_inbound(source_label, "accepted");
    info!(source = %source, "Inbound webhook accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(InboundResponse {
            status: "accepted".to_string(),
            source,
        }),
    ))
}

// ============================================================================
// Health and Observability Handlers
// ============================================================================

async fn handle_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        queue: state.queue.stats(),
    })
}

/// Prometheus text exposition
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.observe_stats(&state.queue.stats());
    state.metrics.encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct InboundResponse {
    pub status: String,
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub queue: QueueStats,
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
