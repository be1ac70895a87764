//! Downstream queue: the batched, pay-per-call service bins are shipped to.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use efficientsqs_core::MAX_BATCH_ITEMS;

/// A resolved downstream queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueHandle {
    pub name: String,
    pub url: String,
}

/// One entry of a batch submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub id: String,
    pub body: Bytes,
}

/// An entry the downstream service refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEntry {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct SendBatchOutput {
    pub failed: Vec<FailedEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue {name} not found: {reason}")]
    NotFound { name: String, reason: String },
    #[error("batch of {0} entries exceeds the limit of {MAX_BATCH_ITEMS}")]
    TooManyEntries(usize),
    #[error("transport: {0}")]
    Transport(String),
}

#[async_trait]
pub trait DownstreamQueue: Send + Sync {
    /// Look a queue up by name. Called once at startup.
    async fn resolve_queue(&self, name: &str) -> Result<QueueHandle, QueueError>;

    /// Submit up to [`MAX_BATCH_ITEMS`] entries in one call.
    ///
    /// `Ok` may still carry per-entry rejections; `Err` means nothing is
    /// known about any entry.
    async fn send_batch(
        &self,
        queue: &QueueHandle,
        entries: Vec<BatchEntry>,
    ) -> Result<SendBatchOutput, QueueError>;
}

// ── In-memory ─────────────────────────────────────────────────────────────────

/// Process-local downstream queue. Records every accepted entry body and
/// supports injected failures.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    queues: Arc<DashMap<String, Vec<Bytes>>>,
    /// entry id -> rejection reason
    rejections: Arc<DashMap<String, String>>,
    failing_sends: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    latency_ms: Arc<AtomicU64>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue that resolves `name`.
    pub fn with_queue(name: &str) -> Self {
        let queue = Self::new();
        queue.create_queue(name);
        queue
    }

    pub fn create_queue(&self, name: &str) {
        self.queues.entry(name.to_string()).or_default();
    }

    /// Reject entries with this id on every send.
    pub fn reject_entry(&self, id: &str, reason: &str) {
        self.rejections.insert(id.to_string(), reason.to_string());
    }

    /// Fail the next `n` sends at the transport level.
    pub fn fail_next_sends(&self, n: usize) {
        self.failing_sends.store(n, Ordering::SeqCst);
    }

    /// Delay every send by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Bodies accepted on `name`, in arrival order.
    pub fn delivered(&self, name: &str) -> Vec<Bytes> {
        self.queues
            .get(name)
            .map(|bodies| bodies.clone())
            .unwrap_or_default()
    }

    /// Number of `send_batch` calls, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DownstreamQueue for MemoryQueue {
    async fn resolve_queue(&self, name: &str) -> Result<QueueHandle, QueueError> {
        if !self.queues.contains_key(name) {
            return Err(QueueError::NotFound {
                name: name.to_string(),
                reason: "no such queue".into(),
            });
        }
        Ok(QueueHandle {
            name: name.to_string(),
            url: format!("memory://{name}"),
        })
    }

    async fn send_batch(
        &self,
        queue: &QueueHandle,
        entries: Vec<BatchEntry>,
    ) -> Result<SendBatchOutput, QueueError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if entries.len() > MAX_BATCH_ITEMS {
            return Err(QueueError::TooManyEntries(entries.len()));
        }
        if self.take_failure() {
            return Err(QueueError::Transport("injected send failure".into()));
        }

        let mut failed = Vec::new();
        let mut accepted = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.rejections.get(&entry.id) {
                Some(reason) => failed.push(FailedEntry {
                    id: entry.id.clone(),
                    reason: reason.clone(),
                }),
                None => accepted.push(entry.body),
            }
        }

        let mut bodies = self
            .queues
            .get_mut(&queue.name)
            .ok_or_else(|| QueueError::Transport(format!("queue {} vanished", queue.name)))?;
        bodies.extend(accepted);

        Ok(SendBatchOutput { failed })
    }
}
