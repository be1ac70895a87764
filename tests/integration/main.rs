//! efficientsqs integration test harness.
//!
//! Each test runs the ingestion server and the consolidation loop in-process
//! on an ephemeral port, wired to the memory buffer and memory queue:
//!
//!   cargo test --test integration
//!
//! Tests own their daemon and must shut it down before returning.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use efficientsqs_api::ApiState;
use efficientsqs_core::codec;
use efficientsqs_core::config::{BufferBackend, DownstreamBackend, EfficientSqsConfig};
use efficientsqs_services::{
    BatchDispatcher, ConsolidationStats, Consolidator, CycleReport, DownstreamQueue, MemoryBuffer,
    MemoryQueue,
};

mod drain;
mod ingest;
mod status;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const DESTINATION: &str = "integration-out";
pub const SEPARATOR: &str = "|~|";
pub const ROUTE: &str = "/sqs";
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(300);

/// Small limits so a handful of messages spans several bins.
pub fn test_config() -> EfficientSqsConfig {
    let mut config = EfficientSqsConfig::default();
    config.buffer.backend = BufferBackend::Memory;
    config.downstream.backend = DownstreamBackend::Memory;
    config.downstream.queue_name = DESTINATION.into();
    config.server.route_pattern = ROUTE.into();
    config.consolidation.separator = SEPARATOR.into();
    config.consolidation.max_message_size = 256;
    config.consolidation.max_batch_bytes = 2560;
    config.consolidation.polling_ms = 50;
    config
}

pub struct TestDaemon {
    pub addr: SocketAddr,
    pub config: EfficientSqsConfig,
    pub buffer: Arc<MemoryBuffer>,
    pub queue: Arc<MemoryQueue>,
    pub stats: Arc<ConsolidationStats>,
    stop_ingest: CancellationToken,
    stop_consolidation: CancellationToken,
    api_task: JoinHandle<Result<()>>,
    loop_task: Option<JoinHandle<CycleReport>>,
}

impl TestDaemon {
    /// Ingestion plus the consolidation loop.
    pub async fn start(config: EfficientSqsConfig) -> Result<Self> {
        Self::spawn(config, true).await
    }

    /// Ingestion only. Accepted messages stay in the buffer.
    pub async fn ingest_only(config: EfficientSqsConfig) -> Result<Self> {
        Self::spawn(config, false).await
    }

    async fn spawn(config: EfficientSqsConfig, run_loop: bool) -> Result<Self> {
        config.validate().context("test config is invalid")?;

        let buffer = Arc::new(MemoryBuffer::new());
        let queue = Arc::new(MemoryQueue::with_queue(DESTINATION));
        let stats = Arc::new(ConsolidationStats::new());

        let handle = queue.resolve_queue(DESTINATION).await?;
        let dispatcher = Arc::new(BatchDispatcher::new(queue.clone(), handle));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stop_ingest = CancellationToken::new();
        let stop_consolidation = CancellationToken::new();

        let api_task = tokio::spawn(efficientsqs_api::serve(
            ApiState::new(&config, buffer.clone(), stats.clone()),
            listener,
            stop_ingest.clone(),
            SHUTDOWN_GRACE,
        ));
        let loop_task = run_loop.then(|| {
            let consolidator = Consolidator::new(&config, buffer.clone(), dispatcher, stats.clone());
            tokio::spawn(consolidator.run(stop_consolidation.clone()))
        });

        Ok(Self {
            addr,
            config,
            buffer,
            queue,
            stats,
            stop_ingest,
            stop_consolidation,
            api_task,
            loop_task,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post(&self, body: impl Into<reqwest::Body>) -> Result<reqwest::Response> {
        reqwest::Client::new()
            .post(self.url(ROUTE))
            .body(body)
            .send()
            .await
            .context("ingest request failed")
    }

    pub async fn status(&self) -> Result<serde_json::Value> {
        reqwest::get(self.url("/status"))
            .await?
            .json()
            .await
            .context("failed to parse /status")
    }

    /// Stop ingestion, then drain. Returns the drain report when the loop ran.
    /// Call once per daemon.
    pub async fn shutdown(&mut self) -> Result<Option<CycleReport>> {
        self.stop_ingest.cancel();
        (&mut self.api_task).await??;
        self.stop_consolidation.cancel();
        match self.loop_task.take() {
            Some(task) => Ok(Some(task.await?)),
            None => Ok(None),
        }
    }

    /// Every message delivered downstream, split out of its bin and decoded.
    pub fn delivered_messages(&self) -> Result<Vec<Vec<u8>>> {
        let compression = self.config.consolidation.compression;
        let mut messages = Vec::new();
        for bin in self.queue.delivered(DESTINATION) {
            for part in codec::split_bin(&bin, SEPARATOR.as_bytes()) {
                messages.push(codec::decode(part, compression)?);
            }
        }
        Ok(messages)
    }
}
