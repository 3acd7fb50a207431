// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `strand serve` command implementation.
//!
//! Wires the SQLite store, the Anthropic producer, the in-memory stream
//! broker, and the gateway router together, then serves until interrupted.

use std::sync::Arc;

use strand_anthropic::AnthropicProducer;
use strand_broker::{DisabledBroker, MemoryBroker};
use strand_config::StrandConfig;
use strand_core::traits::StreamBroker;
use strand_core::StrandError;
use strand_gateway::{start_server, AppState, ServerConfig};
use strand_storage::Database;
use tracing::{error, info, warn};

/// Runs the `strand serve` command.
pub async fn run_serve(config: StrandConfig) -> Result<(), StrandError> {
    init_tracing(&config.server.log_level);

    info!("starting strand serve");

    let db = Database::open_with_wal(&config.storage.database_path, config.storage.wal_mode)
        .await?;
    info!(path = %config.storage.database_path, "storage initialized");

    let producer = {
        let p = AnthropicProducer::new(&config.anthropic).map_err(|e| {
            error!(error = %e, "failed to initialize Anthropic producer");
            eprintln!(
                "error: Anthropic API key required. Set anthropic.api_key in config or the ANTHROPIC_API_KEY environment variable."
            );
            e
        })?;
        Arc::new(p)
    };

    let broker: Arc<dyn StreamBroker> = if config.stream.resumable {
        info!("resumable streams enabled (in-memory broker)");
        Arc::new(MemoryBroker::new())
    } else {
        info!("resumable streams disabled by configuration");
        Arc::new(DisabledBroker)
    };

    let auth = strand_gateway::auth::AuthRegistry::from_sessions(&config.sessions);
    if auth.is_empty() {
        warn!("no sessions configured; all /chat requests will be rejected");
    }

    let state = AppState {
        db: db.clone(),
        producer,
        broker: broker.clone(),
        auth,
        limits: config.limits.clone(),
        stream: config.stream.clone(),
        default_model: config.anthropic.default_model.clone(),
    };

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    tokio::select! {
        result = start_server(&server_config, state) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    // Drop in-flight topics and close the database cleanly.
    if let Err(e) = broker.teardown().await {
        warn!(error = %e, "broker teardown failed");
    }
    db.close().await?;
    info!("strand serve stopped");

    Ok(())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("strand={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
