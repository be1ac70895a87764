//! Runtime counters shared between the consolidation loop and the HTTP API.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::consolidation::CycleReport;

/// Consolidation loop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    Running,
    Draining,
    Stopped,
}

impl LoopState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LoopState::Running,
            1 => LoopState::Draining,
            _ => LoopState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LoopState::Running => 0,
            LoopState::Draining => 1,
            LoopState::Stopped => 2,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConsolidationStats {
    state: AtomicU8,
    cycles: AtomicU64,
    messages_packed: AtomicU64,
    messages_sent: AtomicU64,
    messages_lost: AtomicU64,
    messages_skipped: AtomicU64,
    bins: AtomicU64,
    batches_sent: AtomicU64,
    batches_failed: AtomicU64,
    entries_failed: AtomicU64,
    pop_errors: AtomicU64,
    ingest_accepted: AtomicU64,
    ingest_rejected: AtomicU64,
}

/// Point-in-time copy of [`ConsolidationStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub state: LoopState,
    pub cycles: u64,
    pub messages_packed: u64,
    pub messages_sent: u64,
    pub messages_lost: u64,
    pub messages_skipped: u64,
    pub bins: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub entries_failed: u64,
    pub pop_errors: u64,
    pub ingest_accepted: u64,
    pub ingest_rejected: u64,
}

impl ConsolidationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: LoopState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    pub fn record_cycle(&self, report: &CycleReport) {
        let add = |counter: &AtomicU64, n: usize| {
            counter.fetch_add(n as u64, Ordering::Relaxed);
        };
        add(&self.cycles, 1);
        add(&self.messages_packed, report.messages);
        add(&self.messages_sent, report.messages_sent);
        add(&self.messages_lost, report.messages_lost);
        add(&self.messages_skipped, report.skipped);
        add(&self.bins, report.bins);
        add(&self.batches_sent, report.batches - report.batches_failed);
        add(&self.batches_failed, report.batches_failed);
        add(&self.entries_failed, report.entries_failed);
        add(&self.pop_errors, usize::from(report.pop_failed));
    }

    pub fn record_ingest(&self, accepted: bool) {
        let counter = if accepted {
            &self.ingest_accepted
        } else {
            &self.ingest_rejected
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            state: self.state(),
            cycles: get(&self.cycles),
            messages_packed: get(&self.messages_packed),
            messages_sent: get(&self.messages_sent),
            messages_lost: get(&self.messages_lost),
            messages_skipped: get(&self.messages_skipped),
            bins: get(&self.bins),
            batches_sent: get(&self.batches_sent),
            batches_failed: get(&self.batches_failed),
            entries_failed: get(&self.entries_failed),
            pop_errors: get(&self.pop_errors),
            ingest_accepted: get(&self.ingest_accepted),
            ingest_rejected: get(&self.ingest_rejected),
        }
    }
}
