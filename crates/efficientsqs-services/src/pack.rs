//! Pack pass: drains the buffer into bins until it reports empty.

use efficientsqs_core::{Bin, BinPacker, PackLimits};

use crate::buffer::{Buffer, BufferError};

/// Result of one pack pass. `error` is set when a pop failed; the bins
/// packed before the failure are still returned so nothing already popped
/// is dropped from the cycle.
#[derive(Debug)]
pub struct PackOutcome {
    pub bins: Vec<Bin>,
    pub messages: usize,
    pub skipped: usize,
    pub error: Option<BufferError>,
}

pub async fn pack_buffer(buffer: &dyn Buffer, queue: &str, limits: &PackLimits) -> PackOutcome {
    let mut packer = BinPacker::new(limits.clone());
    let mut messages = 0;
    let mut skipped = 0;

    let error = loop {
        let message = match buffer.pop_oldest(queue).await {
            Ok(Some(m)) => m,
            Ok(None) => break None,
            Err(e) => break Some(e),
        };
        match packer.push(&message) {
            Ok(_) => messages += 1,
            Err(e) => {
                tracing::warn!(error = %e, "dropping message that cannot be packed");
                skipped += 1;
            }
        }
    };

    PackOutcome {
        bins: packer.finish(),
        messages,
        skipped,
        error,
    }
}
