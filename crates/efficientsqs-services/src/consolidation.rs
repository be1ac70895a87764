//! Consolidation loop: polls the buffer, packs, chunks and dispatches.
//!
//! States:
//!   Running : cycle, then sleep `polling_ms`, until the token is cancelled
//!   Draining: one last cycle over whatever is still buffered
//!   Stopped : drain dispatches have all returned
//!
//! Cancellation only interrupts the sleep. A cycle that has started always
//! finishes, so the drain never races an in-flight dispatch for the same
//! messages.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use efficientsqs_core::config::EfficientSqsConfig;
use efficientsqs_core::{chunk_bins, BatchLimits, PackLimits};

use crate::buffer::Buffer;
use crate::dispatcher::BatchDispatcher;
use crate::pack::pack_buffer;
use crate::stats::{ConsolidationStats, LoopState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    Scheduled,
    Drain,
}

/// Outcome of one pack → chunk → dispatch pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Messages popped and packed.
    pub messages: usize,
    pub messages_sent: usize,
    pub messages_lost: usize,
    /// Messages popped but dropped because no bin could hold them.
    pub skipped: usize,
    pub bins: usize,
    pub batches: usize,
    pub batches_failed: usize,
    pub entries_failed: usize,
    pub pop_failed: bool,
}

pub struct Consolidator {
    buffer: Arc<dyn Buffer>,
    buffer_queue: String,
    dispatcher: Arc<BatchDispatcher>,
    pack_limits: PackLimits,
    batch_limits: BatchLimits,
    polling: Duration,
    stats: Arc<ConsolidationStats>,
}

impl Consolidator {
    pub fn new(
        config: &EfficientSqsConfig,
        buffer: Arc<dyn Buffer>,
        dispatcher: Arc<BatchDispatcher>,
        stats: Arc<ConsolidationStats>,
    ) -> Self {
        Self {
            buffer,
            buffer_queue: config.buffer.queue_name.clone(),
            dispatcher,
            pack_limits: config.pack_limits(),
            batch_limits: config.batch_limits(),
            polling: config.polling_interval(),
            stats,
        }
    }

    /// Run until `shutdown` is cancelled, then drain. Returns the drain
    /// cycle's report.
    pub async fn run(self, shutdown: CancellationToken) -> CycleReport {
        self.stats.set_state(LoopState::Running);
        tracing::info!(
            buffer = %self.buffer_queue,
            destination = %self.dispatcher.destination().name,
            polling_ms = self.polling.as_millis() as u64,
            "consolidation loop running"
        );

        while !shutdown.is_cancelled() {
            self.run_cycle(CycleKind::Scheduled).await;
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(self.polling) => {}
            }
        }

        self.stats.set_state(LoopState::Draining);
        tracing::info!("draining buffer and flushing to downstream queue");
        let drained = self.run_cycle(CycleKind::Drain).await;
        self.stats.set_state(LoopState::Stopped);
        tracing::info!(bins_flushed = drained.bins, messages = drained.messages, "drain complete");
        drained
    }

    pub async fn run_cycle(&self, kind: CycleKind) -> CycleReport {
        let started = Instant::now();

        let packed = pack_buffer(self.buffer.as_ref(), &self.buffer_queue, &self.pack_limits).await;
        if let Some(e) = &packed.error {
            tracing::error!(error = %e, ?kind, "failed to pop from buffer");
        }

        let mut report = CycleReport {
            messages: packed.messages,
            skipped: packed.skipped,
            bins: packed.bins.len(),
            pop_failed: packed.error.is_some(),
            ..CycleReport::default()
        };

        let batches = chunk_bins(packed.bins, self.batch_limits);
        report.batches = batches.len();

        let mut sends = JoinSet::new();
        for batch in batches {
            let dispatcher = self.dispatcher.clone();
            sends.spawn(async move {
                let result = dispatcher.dispatch(&batch).await;
                (batch, result)
            });
        }

        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok((batch, Ok(()))) => {
                    report.messages_sent += batch.message_count();
                    tracing::debug!(bins = batch.len(), bytes = batch.byte_size(), ?kind, "batch sent");
                }
                Ok((batch, Err(e))) => {
                    let lost = e.lost_messages(&batch);
                    report.batches_failed += 1;
                    report.entries_failed += e.failed_entries(&batch);
                    report.messages_lost += lost;
                    report.messages_sent += batch.message_count().saturating_sub(lost);
                    tracing::error!(error = %e, bins = batch.len(), lost, ?kind, "batch failed");
                }
                Err(e) => {
                    // the batch went down with the task; its size is unknown here
                    report.batches_failed += 1;
                    tracing::error!(error = %e, ?kind, "dispatch task aborted");
                }
            }
        }

        self.stats.record_cycle(&report);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if report.messages > 0 || report.skipped > 0 || report.pop_failed || kind == CycleKind::Drain {
            tracing::info!(
                ?kind,
                messages = report.messages,
                bins = report.bins,
                batches = report.batches,
                batches_failed = report.batches_failed,
                entries_failed = report.entries_failed,
                skipped = report.skipped,
                elapsed_ms,
                "consolidation cycle"
            );
        } else {
            tracing::trace!(elapsed_ms, "consolidation cycle idle");
        }

        report
    }
}
