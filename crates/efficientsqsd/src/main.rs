//! efficientsqsd: buffers small producer messages and ships them to the
//! downstream queue in packed batches.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use efficientsqs_api::ApiState;
use efficientsqs_core::config::{BufferBackend, DownstreamBackend, EfficientSqsConfig, RuntimeMode};
use efficientsqs_services::{
    BatchDispatcher, Buffer, ConsolidationStats, Consolidator, DownstreamQueue, MemoryBuffer,
    MemoryQueue, QueueHandle, RedisBuffer, SqsQueue,
};

/// Queue name the memory backend uses when none is configured.
const LOCAL_QUEUE_NAME: &str = "efficientsqs-local";

/// How long in-flight ingestion requests may hold off the drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let wrote_default = EfficientSqsConfig::write_default_if_missing();
    let loaded = EfficientSqsConfig::load().and_then(|config| {
        config.validate()?;
        Ok(config)
    });

    init_tracing(loaded.as_ref().map(|c| c.server.mode).unwrap_or_default());

    if let Err(e) = wrote_default {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(
                error = %e,
                path = %EfficientSqsConfig::file_path().display(),
                "invalid configuration"
            );
            std::process::exit(1);
        }
    };

    run(config).await
}

fn init_tracing(mode: RuntimeMode) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(mode.default_log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: EfficientSqsConfig) -> Result<()> {
    tracing::info!(mode = ?config.server.mode, "efficientsqsd starting");
    tracing::warn!("delivery is at-most-once: messages in a failed batch are not retried or requeued");

    // ── Startup dependencies ─────────────────────────────────────────────────

    let buffer = connect_buffer(&config).await?;
    let (queue, handle) = resolve_downstream(&config).await?;

    let stats = Arc::new(ConsolidationStats::new());
    let dispatcher = Arc::new(BatchDispatcher::new(queue, handle));
    let consolidator = Consolidator::new(&config, buffer.clone(), dispatcher, stats.clone());

    let listener = TcpListener::bind(("0.0.0.0", config.server.port))
        .await
        .with_context(|| format!("failed to bind ingestion port {}", config.server.port))?;

    // ── Shutdown tokens ──────────────────────────────────────────────────────
    //
    // Ingestion stops first; the loop is only told to drain once the server
    // has finished its in-flight requests, or SHUTDOWN_GRACE has passed, so
    // the drain sees every message accepted in time.

    let stop_ingest = CancellationToken::new();
    let stop_consolidation = CancellationToken::new();

    {
        let stop_ingest = stop_ingest.clone();
        tokio::spawn(async move {
            let signal = wait_for_termination().await;
            tracing::info!(signal, "received signal, initiating graceful shutdown");
            stop_ingest.cancel();
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let api_task = tokio::spawn(efficientsqs_api::serve(
        ApiState::new(&config, buffer, stats),
        listener,
        stop_ingest.clone(),
        SHUTDOWN_GRACE,
    ));
    let loop_task = tokio::spawn(consolidator.run(stop_consolidation.clone()));

    // ── Wait for exit ────────────────────────────────────────────────────────

    match api_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "ingestion server failed"),
        Err(e) => tracing::error!(error = %e, "ingestion task exited"),
    }
    stop_consolidation.cancel();

    let drained = loop_task.await.context("consolidation task exited")?;
    tracing::info!(
        messages = drained.messages,
        lost = drained.messages_lost,
        "shutdown complete"
    );
    Ok(())
}

async fn connect_buffer(config: &EfficientSqsConfig) -> Result<Arc<dyn Buffer>> {
    let buffer: Arc<dyn Buffer> = match config.buffer.backend {
        BufferBackend::Redis => Arc::new(
            RedisBuffer::connect(&config.buffer.host, config.buffer.port)
                .await
                .context("failed to connect to redis buffer")?,
        ),
        BufferBackend::Memory => {
            tracing::warn!("in-memory buffer: buffered messages are lost on crash");
            Arc::new(MemoryBuffer::new())
        }
    };
    Ok(buffer)
}

/// Resolve the downstream queue. Failure here is fatal.
async fn resolve_downstream(
    config: &EfficientSqsConfig,
) -> Result<(Arc<dyn DownstreamQueue>, QueueHandle)> {
    let (queue, name): (Arc<dyn DownstreamQueue>, String) = match config.downstream.backend {
        DownstreamBackend::Sqs => (
            Arc::new(SqsQueue::from_env().await),
            config.downstream.queue_name.clone(),
        ),
        DownstreamBackend::Memory => {
            let name = if config.downstream.queue_name.is_empty() {
                LOCAL_QUEUE_NAME.to_string()
            } else {
                config.downstream.queue_name.clone()
            };
            tracing::warn!(queue = %name, "in-memory downstream queue: batches are discarded on exit");
            (Arc::new(MemoryQueue::with_queue(&name)), name)
        }
    };

    let handle = queue
        .resolve_queue(&name)
        .await
        .with_context(|| format!("couldn't get queue URL for {name}"))?;
    tracing::info!(queue = %handle.name, url = %handle.url, "downstream queue resolved");
    Ok((queue, handle))
}

/// Wait for SIGINT or SIGTERM and return its name.
async fn wait_for_termination() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                return tokio::select! {
                    _ = tokio::signal::ctrl_c() => "SIGINT",
                    _ = term.recv() => "SIGTERM",
                };
            }
            Err(e) => tracing::warn!(error = %e, "failed to install SIGTERM handler"),
        }
    }
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}
