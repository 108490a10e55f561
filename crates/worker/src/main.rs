//! `plugrid-worker` -- job dispatch daemon.
//!
//! Consumes job messages from the broker, fans them out round-robin to
//! a fixed pool of plugin executors, runs each plugin in its own
//! container, and reports outcomes on the status queue.
//!
//! Startup order: connect the consumer connection, declare the queue
//! topology (fatal if an existing queue disagrees on arguments), open
//! one status-publisher connection per executor, spawn the pool, then
//! consume until the channel dies or a shutdown signal arrives.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plugrid_broker::{consume_jobs, topology, StatusPublisher};
use plugrid_executor::{ExecutorPool, PluginExecutor};
use plugrid_runtime::DockerRuntime;
use plugrid_worker::config::WorkerConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plugrid_worker=info,plugrid_broker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(pool_size = config.pool_size, "Starting plugrid-worker");

    if let Err(e) = run(config).await {
        tracing::error!(error = ?e, "Worker exited with error");
        std::process::exit(1);
    }
}

async fn run(config: WorkerConfig) -> anyhow::Result<()> {
    let consumer_conn = plugrid_broker::connect(&config.amqp_url)
        .await
        .context("connecting consumer to broker")?;
    let channel = consumer_conn
        .create_channel()
        .await
        .context("opening consumer channel")?;

    topology::declare(&channel)
        .await
        .context("declaring queue topology")?;

    let runtime = Arc::new(DockerRuntime::connect().context("connecting to Docker daemon")?);

    // Each executor owns a publisher with its own broker connection, so
    // status publishing never contends across slots.
    let mut executors = Vec::with_capacity(config.pool_size);
    for slot in 0..config.pool_size {
        let publisher = StatusPublisher::connect(&config.amqp_url)
            .await
            .with_context(|| format!("connecting status publisher for slot {slot}"))?;
        executors.push(PluginExecutor::new(slot, Arc::clone(&runtime), publisher));
    }

    let pool = ExecutorPool::spawn(executors);
    tracing::info!(pool_size = pool.size(), "Executor pool ready");

    tokio::select! {
        result = consume_jobs(&channel, "plugrid-worker", &pool) => {
            result.context("job consumer loop")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    if let Err(e) = consumer_conn.close(200, "worker shutdown").await {
        tracing::warn!(error = %e, "Error closing broker connection");
    }

    Ok(())
}
