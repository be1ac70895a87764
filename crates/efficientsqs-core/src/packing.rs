//! First-fit bin packing.
//!
//! Messages are joined into bins with the configured separator. A message
//! goes into the lowest-indexed open bin where
//!
//!   bin.len + separator.len + message.len < max_message_size
//!
//! and otherwise opens a new bin. Bins never reach `max_message_size`.

use bytes::{Bytes, BytesMut};

/// Limits the packer enforces.
#[derive(Debug, Clone)]
pub struct PackLimits {
    pub max_message_size: usize,
    pub separator: Bytes,
}

impl PackLimits {
    /// Whether `len` bytes could be placed into an empty bin.
    pub fn fits_empty_bin(&self, len: usize) -> bool {
        len + self.separator.len() < self.max_message_size
    }
}

/// A separator-joined run of messages headed for one downstream entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bin {
    pub index: usize,
    body: Bytes,
    messages: usize,
}

impl Bin {
    /// Build a closed bin directly. `messages` is how many payloads the
    /// body joins.
    pub fn new(index: usize, body: impl Into<Bytes>, messages: usize) -> Self {
        Self {
            index,
            body: body.into(),
            messages,
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Number of messages joined into this bin.
    pub fn message_count(&self) -> usize {
        self.messages
    }

    /// Downstream entry id, used to correlate per-entry failures.
    pub fn entry_id(&self) -> String {
        format!("bin-{}", self.index)
    }
}

#[derive(Debug)]
struct OpenBin {
    body: BytesMut,
    messages: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PackError {
    #[error("message of {len} bytes cannot fit an empty bin (max message size {max}, separator {separator} bytes)")]
    MessageTooLarge {
        len: usize,
        max: usize,
        separator: usize,
    },
    #[error("empty message")]
    EmptyMessage,
}

/// Append-only first-fit packer for one consolidation cycle.
#[derive(Debug)]
pub struct BinPacker {
    limits: PackLimits,
    bins: Vec<OpenBin>,
}

impl BinPacker {
    pub fn new(limits: PackLimits) -> Self {
        Self {
            limits,
            bins: Vec::new(),
        }
    }

    /// Place one message, returning the index of the bin it landed in.
    ///
    /// A message that cannot fit even an empty bin is rejected before any
    /// bin is probed.
    pub fn push(&mut self, message: &[u8]) -> Result<usize, PackError> {
        if message.is_empty() {
            return Err(PackError::EmptyMessage);
        }
        if !self.limits.fits_empty_bin(message.len()) {
            return Err(PackError::MessageTooLarge {
                len: message.len(),
                max: self.limits.max_message_size,
                separator: self.limits.separator.len(),
            });
        }

        let sep = &self.limits.separator;
        let needed = message.len() + sep.len();
        let max = self.limits.max_message_size;

        if let Some((index, bin)) = self
            .bins
            .iter_mut()
            .enumerate()
            .find(|(_, b)| b.body.len() + needed < max)
        {
            bin.body.extend_from_slice(sep);
            bin.body.extend_from_slice(message);
            bin.messages += 1;
            return Ok(index);
        }

        let mut body = BytesMut::with_capacity(message.len());
        body.extend_from_slice(message);
        self.bins.push(OpenBin { body, messages: 1 });
        Ok(self.bins.len() - 1)
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Close every bin, in ascending index order.
    pub fn finish(self) -> Vec<Bin> {
        self.bins
            .into_iter()
            .enumerate()
            .map(|(index, b)| Bin {
                index,
                body: b.body.freeze(),
                messages: b.messages,
            })
            .collect()
    }
}
