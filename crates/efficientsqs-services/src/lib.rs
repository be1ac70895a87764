//! efficientsqs-services: the consolidation engine and the adapters it
//! drives: the intermediate buffer, the downstream queue, and the loop that
//! moves messages from one to the other.

pub mod buffer;
pub mod consolidation;
pub mod dispatcher;
pub mod pack;
pub mod queue;
pub mod sqs;
pub mod stats;

pub use buffer::{Buffer, BufferError, MemoryBuffer, RedisBuffer};
pub use consolidation::{Consolidator, CycleKind, CycleReport};
pub use dispatcher::{BatchDispatcher, DispatchError, FailedBin};
pub use pack::{pack_buffer, PackOutcome};
pub use queue::{
    BatchEntry, DownstreamQueue, FailedEntry, MemoryQueue, QueueError, QueueHandle, SendBatchOutput,
};
pub use sqs::SqsQueue;
pub use stats::{ConsolidationStats, LoopState, StatsSnapshot};
