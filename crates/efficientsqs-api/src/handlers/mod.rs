//! HTTP handlers: producer ingestion and daemon status.

pub mod ingest;
pub mod status;

use std::sync::Arc;

use efficientsqs_core::config::{Compression, EfficientSqsConfig};
use efficientsqs_core::IngestPolicy;
use efficientsqs_services::{Buffer, ConsolidationStats};

pub use ingest::{handle_ingest, IngestResponse};
pub use status::{handle_status, LimitsInfo, StatusResponse};

#[derive(Clone)]
pub struct ApiState {
    pub buffer: Arc<dyn Buffer>,
    /// Buffer list accepted messages are pushed onto.
    pub buffer_queue: String,
    pub policy: Arc<IngestPolicy>,
    pub stats: Arc<ConsolidationStats>,
    /// Route producers POST to.
    pub route_pattern: String,
    pub limits: LimitsInfo,
}

impl ApiState {
    pub fn new(
        config: &EfficientSqsConfig,
        buffer: Arc<dyn Buffer>,
        stats: Arc<ConsolidationStats>,
    ) -> Self {
        let c = &config.consolidation;
        Self {
            buffer,
            buffer_queue: config.buffer.queue_name.clone(),
            policy: Arc::new(config.ingest_policy()),
            stats,
            route_pattern: config.server.route_pattern.clone(),
            limits: LimitsInfo {
                min_message_size: c.min_message_size,
                max_message_size: c.max_message_size,
                max_batch_bytes: c.max_batch_bytes,
                max_batch_items: config.batch_limits().max_items,
                polling_ms: c.polling_ms,
                compression: match c.compression {
                    Compression::Gzip => "gzip".into(),
                    Compression::None => "none".into(),
                },
            },
        }
    }
}
