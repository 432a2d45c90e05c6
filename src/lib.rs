//! Kite Gateway - Kite Connect login broker
//!
//! Serves the Kite login flow over HTTP, persists the resulting session to
//! disk and polls the account on a schedule using that session.

pub mod brokers;
pub mod config;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod security;
pub mod server;
pub mod services;
pub mod state;
pub mod storage;

#[cfg(test)]
pub mod testkit;

use config::Config;
use logging::RemoteLogger;
use scheduler::JobRunner;
use state::AppState;
use std::sync::Arc;

/// Run the gateway until Ctrl-C or SIGTERM
pub async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting Kite App...");

    let addr = config.listen_addr()?;
    let logger = RemoteLogger::new(
        &config.log_endpoint,
        config.log_api_key(),
        &config.environment,
    )?;
    let state = Arc::new(AppState::from_config(&config, logger.clone())?);

    let runner = JobRunner::new();
    scheduler::register_default_jobs(&runner, state.kite.clone(), logger.clone(), &config)?;
    runner.start();
    logger.info("Scheduler started").await;

    let served = server::serve(addr, state, shutdown_signal()).await;

    // Jobs stop after the listener has drained
    runner.shutdown().await;
    logger.info("Kite App stopped").await;

    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
