//! Serve command - runs the worker pool and the HTTP gateway
//!
//! Usage:
//!   agent-gateway serve                        # defaults, PORT from env
//!   agent-gateway serve --port 9000            # override listen port
//!   agent-gateway serve --workers 4            # larger pool
//!   agent-gateway serve --agents-dir ./agents  # script directory

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;

use agent_gateway::api;
use agent_gateway::{Dispatcher, GatewayConfig, ProcessExecutor};

pub async fn run(config: GatewayConfig) -> Result<()> {
    let registry = config.registry();
    if !config.agents.dir.is_dir() {
        log::warn!(
            "agents directory {} does not exist; every job will fail until it does",
            config.agents.dir.display()
        );
    }

    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        ProcessExecutor::new(config.executor_settings()),
        config.timeout(),
    ));
    let pool = dispatcher
        .start_workers(config.worker_count())
        .context("Failed to start worker pool")?;

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    log::info!(
        "{} listening on {} ({} workers, {} agents, timeout {}s)",
        api::SERVICE_NAME,
        addr,
        pool.size(),
        dispatcher.registry().len(),
        config.workers.timeout_secs
    );

    axum::serve(listener, api::router(dispatcher))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    log::info!("shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
