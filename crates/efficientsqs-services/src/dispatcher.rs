//! Batch dispatcher: ships one batch as a single downstream call.
//!
//! No retries happen here. A failed send loses the batch's messages: they
//! were popped from the buffer and are never pushed back.

use std::collections::HashSet;
use std::sync::Arc;

use efficientsqs_core::Batch;

use crate::queue::{BatchEntry, DownstreamQueue, FailedEntry, QueueError, QueueHandle};

/// A bin the downstream queue refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedBin {
    /// `None` when the queue reported an id this batch never sent.
    pub bin_index: Option<usize>,
    pub id: String,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("batch send failed: {0}")]
    Transport(#[from] QueueError),
    #[error("batch contains {} failed messages", .failed.len())]
    Partial { failed: Vec<FailedBin> },
}

impl DispatchError {
    /// Entries of `batch` that did not reach the queue. An id the queue
    /// reports twice counts once.
    pub fn failed_entries(&self, batch: &Batch) -> usize {
        match self {
            DispatchError::Transport(_) => batch.len(),
            DispatchError::Partial { failed } => failed
                .iter()
                .map(|f| f.id.as_str())
                .collect::<HashSet<_>>()
                .len(),
        }
    }

    /// Messages of `batch` lost to this failure.
    pub fn lost_messages(&self, batch: &Batch) -> usize {
        match self {
            DispatchError::Transport(_) => batch.message_count(),
            DispatchError::Partial { failed } => failed
                .iter()
                .filter_map(|f| f.bin_index)
                .collect::<HashSet<_>>()
                .into_iter()
                .filter_map(|i| batch.bins().iter().find(|b| b.index == i))
                .map(|b| b.message_count())
                .sum(),
        }
    }
}

pub struct BatchDispatcher {
    queue: Arc<dyn DownstreamQueue>,
    handle: QueueHandle,
}

impl BatchDispatcher {
    pub fn new(queue: Arc<dyn DownstreamQueue>, handle: QueueHandle) -> Self {
        Self { queue, handle }
    }

    pub fn destination(&self) -> &QueueHandle {
        &self.handle
    }

    pub async fn dispatch(&self, batch: &Batch) -> Result<(), DispatchError> {
        let entries: Vec<BatchEntry> = batch
            .bins()
            .iter()
            .map(|bin| BatchEntry {
                id: bin.entry_id(),
                body: bin.body().clone(),
            })
            .collect();

        let out = self.queue.send_batch(&self.handle, entries).await?;
        if out.failed.is_empty() {
            return Ok(());
        }

        let failed: Vec<FailedBin> = out
            .failed
            .into_iter()
            .map(|FailedEntry { id, reason }| {
                tracing::error!(id = %id, msg = %reason, queue = %self.handle.name, "partial batch failure");
                FailedBin {
                    bin_index: batch.bin_for_entry(&id).map(|b| b.index),
                    id,
                    reason,
                }
            })
            .collect();
        Err(DispatchError::Partial { failed })
    }
}
