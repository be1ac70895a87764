//! Batch chunking: groups closed bins into downstream submissions.
//!
//! A batch closes when it holds `max_items` bins or when the next bin would
//! push its byte total over `max_bytes`. Bins are taken in ascending index
//! order, so batch composition is deterministic.

use crate::packing::Bin;

/// Entries per downstream batch call.
pub const MAX_BATCH_ITEMS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_items: usize,
    pub max_bytes: usize,
}

/// Bins submitted together in one downstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    bins: Vec<Bin>,
    bytes: usize,
}

impl Batch {
    fn new() -> Self {
        Self {
            bins: Vec::new(),
            bytes: 0,
        }
    }

    fn push(&mut self, bin: Bin) {
        self.bytes += bin.len();
        self.bins.push(bin);
    }

    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Summed body length of every bin.
    pub fn byte_size(&self) -> usize {
        self.bytes
    }

    pub fn message_count(&self) -> usize {
        self.bins.iter().map(Bin::message_count).sum()
    }

    /// Find the bin behind a downstream entry id.
    pub fn bin_for_entry(&self, entry_id: &str) -> Option<&Bin> {
        let index: usize = entry_id.strip_prefix("bin-")?.parse().ok()?;
        self.bins.iter().find(|b| b.index == index)
    }
}

/// Partition bins into batches. The first bin of a batch is always accepted.
pub fn chunk_bins(mut bins: Vec<Bin>, limits: BatchLimits) -> Vec<Batch> {
    bins.sort_by_key(|b| b.index);

    let mut batches = Vec::new();
    let mut current = Batch::new();

    for bin in bins {
        if !current.is_empty()
            && (current.len() >= limits.max_items
                || current.byte_size() + bin.len() > limits.max_bytes)
        {
            batches.push(std::mem::replace(&mut current, Batch::new()));
        }
        current.push(bin);
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packing::{BinPacker, PackLimits};
    use bytes::Bytes;

    fn bins_of(sizes: &[usize]) -> Vec<Bin> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| Bin::new(i, vec![b'm'; size], 1))
            .collect()
    }

    fn distinct_bins(n: usize) -> Vec<Bin> {
        // max_message_size 3 with a one-byte separator forces one message per bin
        let mut packer = BinPacker::new(PackLimits {
            max_message_size: 3,
            separator: Bytes::from_static(b"|"),
        });
        for _ in 0..n {
            packer.push(b"x").unwrap();
        }
        packer.finish()
    }

    #[test]
    fn fifteen_bins_make_ten_and_five() {
        let bins = distinct_bins(15);
        assert_eq!(bins.len(), 15);
        let batches = chunk_bins(
            bins,
            BatchLimits {
                max_items: MAX_BATCH_ITEMS,
                max_bytes: usize::MAX,
            },
        );
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![10, 5]);
    }

    #[test]
    fn batches_follow_ascending_bin_index() {
        let mut bins = distinct_bins(12);
        bins.reverse();
        let batches = chunk_bins(
            bins,
            BatchLimits {
                max_items: MAX_BATCH_ITEMS,
                max_bytes: usize::MAX,
            },
        );
        let indices: Vec<usize> = batches
            .iter()
            .flat_map(|b| b.bins().iter().map(|bin| bin.index))
            .collect();
        assert_eq!(indices, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn byte_budget_closes_batch_early() {
        let bins = bins_of(&[40, 40, 40, 40]);
        assert_eq!(bins.len(), 4);
        let batches = chunk_bins(
            bins,
            BatchLimits {
                max_items: MAX_BATCH_ITEMS,
                max_bytes: 100,
            },
        );
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![2, 2]);
        assert!(batches.iter().all(|b| b.byte_size() <= 100));
    }

    #[test]
    fn no_batch_exceeds_item_or_byte_limits() {
        let sizes: Vec<usize> = (0..57).map(|i| 5 + (i * 7) % 20).collect();
        let bins = bins_of(&sizes);
        let limits = BatchLimits {
            max_items: MAX_BATCH_ITEMS,
            max_bytes: 64,
        };
        let batches = chunk_bins(bins, limits);
        assert!(batches.iter().all(|b| b.len() <= MAX_BATCH_ITEMS));
        assert!(batches.iter().all(|b| b.byte_size() <= 64));
        let total: usize = batches.iter().map(Batch::len).sum();
        assert_eq!(total, 57);
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(chunk_bins(Vec::new(), BatchLimits { max_items: 10, max_bytes: 10 }).is_empty());
    }

    #[test]
    fn entry_ids_map_back_to_bins() {
        let batches = chunk_bins(
            distinct_bins(3),
            BatchLimits {
                max_items: MAX_BATCH_ITEMS,
                max_bytes: usize::MAX,
            },
        );
        let batch = &batches[0];
        assert_eq!(batch.bin_for_entry("bin-2").map(|b| b.index), Some(2));
        assert!(batch.bin_for_entry("bin-9").is_none());
        assert!(batch.bin_for_entry("nonsense").is_none());
    }
}
