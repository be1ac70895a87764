//! efficientsqs-core: configuration, bin packing, batch chunking and the
//! ingestion payload rules. Pure and synchronous; the async engine lives in
//! efficientsqs-services.

pub mod batch;
pub mod codec;
pub mod config;
pub mod ingest;
pub mod packing;

pub use batch::{chunk_bins, Batch, BatchLimits, MAX_BATCH_ITEMS};
pub use codec::{split_bin, CodecError};
pub use config::{Compression, EfficientSqsConfig, RuntimeMode};
pub use ingest::{IngestError, IngestPolicy};
pub use packing::{Bin, BinPacker, PackError, PackLimits};
