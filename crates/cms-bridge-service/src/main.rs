//! # CMS Bridge Service
//!
//! Binary entry point for the bridge HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes structured logging
//! - Starts the delivery queue and the inbound HTTP server
//! - On SIGINT/SIGTERM stops the server and rejects undelivered jobs

use cms_bridge_service::{load_config, logging, start_server, AppState};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Configuration is read before logging so the configured level applies.
    // Failures are reported on stderr since no subscriber exists yet.
    let config = match load_config(None) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(3);
        }
    };

    if let Err(e) = logging::init_tracing(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        targets = config.targets.len(),
        inbound_sources = config.inbound.len(),
        "Starting CMS bridge service"
    );

    let state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to initialize service; aborting");
            std::process::exit(e.exit_code());
        }
    };

    if let Err(e) = start_server(state).await {
        error!("Server failed: {}", e);
        std::process::exit(e.exit_code());
    }
}
