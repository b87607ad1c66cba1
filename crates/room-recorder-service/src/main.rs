//! # Room-Recorder Service
//!
//! Binary entry point for the Room-Recorder HTTP service.
//!
//! This executable:
//! - Parses command-line flags
//! - Initializes logging
//! - Resolves and validates configuration (defaults < file < environment)
//! - Wires the webhook authenticator and egress client
//! - Starts the HTTP server from room-recorder-api
//!
//! Exit codes: 1 bind failure, 2 server failure, 3 invalid configuration.

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, LogFormat};
use room_recorder_api::{start_server, AppState, ServiceError, TwirpEgressClient};
use room_recorder_core::{
    ConfigResolver, Configuration, SimpleKeyProvider, TokenWebhookAuthenticator,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str =
    "room_recorder_service=info,room_recorder_api=info,room_recorder_core=info,tower_http=debug";

const EXIT_CONFIGURATION: i32 = 3;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Room-Recorder Service");

    // -------------------------------------------------------------------------
    // Load configuration
    //
    // A missing file falls back to defaults and environment variables. Any
    // validation failure is fatal.
    // -------------------------------------------------------------------------
    let resolver = ConfigResolver::from_process_env(&cli.config);
    let config = match resolver.resolve() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!(
                path = %resolver.config_path().display(),
                error = %e,
                "Configuration is invalid; aborting"
            );
            std::process::exit(EXIT_CONFIGURATION);
        }
    };

    if cli.command() == Commands::CheckConfig {
        info!(
            storage = %config.storage.provider(),
            destination = %config.storage.destination(),
            "Configuration is valid"
        );
        return;
    }

    let state = match build_state(config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize service; aborting: {:#}", e);
            std::process::exit(EXIT_CONFIGURATION);
        }
    };

    if let Err(e) = start_server(state).await {
        error!("Failed to run server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
        };

        std::process::exit(exit_code);
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

/// Wire the authenticator and egress client around the resolved configuration
fn build_state(config: Arc<Configuration>) -> anyhow::Result<AppState> {
    let egress = TwirpEgressClient::from_config(&config)
        .context("Failed to create egress client")?;
    info!(
        livekit = %egress.base_url(),
        storage = %config.storage.provider(),
        "Egress client ready"
    );

    let keys = SimpleKeyProvider::from_config(&config);
    let authenticator = TokenWebhookAuthenticator::new(Arc::new(keys));

    Ok(AppState::new(
        config,
        Arc::new(authenticator),
        Arc::new(egress),
    ))
}
