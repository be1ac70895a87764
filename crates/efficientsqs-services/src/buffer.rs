//! Intermediate buffer: the FIFO list producers push onto and the
//! consolidation loop pops from.
//!
//! Producers push to the head, the engine pops from the tail, so the oldest
//! message always comes out first.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("buffer unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Buffer: Send + Sync {
    /// Pop the oldest message. `Ok(None)` means the list is empty.
    async fn pop_oldest(&self, queue: &str) -> Result<Option<Bytes>, BufferError>;

    /// Push a message behind every message already queued.
    async fn push_newest(&self, queue: &str, message: Bytes) -> Result<(), BufferError>;

    /// Number of messages waiting.
    async fn len(&self, queue: &str) -> Result<usize, BufferError>;
}

// ── Redis ─────────────────────────────────────────────────────────────────────

/// Buffer backed by a Redis list (LPUSH / RPOP).
#[derive(Clone)]
pub struct RedisBuffer {
    conn: ConnectionManager,
}

impl RedisBuffer {
    pub async fn connect(host: &str, port: u16) -> Result<Self, BufferError> {
        let client = redis::Client::open(format!("redis://{host}:{port}/"))?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!(host, port, "connected to redis buffer");
        Ok(Self { conn })
    }
}

#[async_trait]
impl Buffer for RedisBuffer {
    async fn pop_oldest(&self, queue: &str) -> Result<Option<Bytes>, BufferError> {
        let mut conn = self.conn.clone();
        let item: Option<Vec<u8>> = conn.rpop(queue, None).await?;
        Ok(item.map(Bytes::from))
    }

    async fn push_newest(&self, queue: &str, message: Bytes) -> Result<(), BufferError> {
        let mut conn = self.conn.clone();
        let _: usize = conn.lpush(queue, message.as_ref()).await?;
        Ok(())
    }

    async fn len(&self, queue: &str) -> Result<usize, BufferError> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(queue).await?)
    }
}

// ── In-memory ─────────────────────────────────────────────────────────────────

/// Process-local buffer. Used for single-process deployments and tests.
#[derive(Clone, Default)]
pub struct MemoryBuffer {
    lists: Arc<DashMap<String, VecDeque<Bytes>>>,
    failing_pops: Arc<AtomicUsize>,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` pops fail with [`BufferError::Unavailable`].
    pub fn fail_next_pops(&self, n: usize) {
        self.failing_pops.store(n, Ordering::SeqCst);
    }

    /// Snapshot of a list, oldest first.
    pub fn contents(&self, queue: &str) -> Vec<Bytes> {
        self.lists
            .get(queue)
            .map(|list| list.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    fn take_failure(&self) -> bool {
        self.failing_pops
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Buffer for MemoryBuffer {
    async fn pop_oldest(&self, queue: &str) -> Result<Option<Bytes>, BufferError> {
        if self.take_failure() {
            return Err(BufferError::Unavailable("injected pop failure".into()));
        }
        Ok(self.lists.get_mut(queue).and_then(|mut list| list.pop_back()))
    }

    async fn push_newest(&self, queue: &str, message: Bytes) -> Result<(), BufferError> {
        self.lists
            .entry(queue.to_string())
            .or_default()
            .push_front(message);
        Ok(())
    }

    async fn len(&self, queue: &str) -> Result<usize, BufferError> {
        Ok(self.lists.get(queue).map(|list| list.len()).unwrap_or(0))
    }
}
