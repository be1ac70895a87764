//! Ingestion rules: decides whether a producer body may enter the buffer
//! and what payload gets stored for it.

use bytes::Bytes;

use crate::codec::{self, CodecError};
use crate::config::Compression;

#[derive(Debug, Clone)]
pub struct IngestPolicy {
    pub min_message_size: usize,
    pub max_message_size: usize,
    pub separator: Bytes,
    pub compression: Compression,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("message of {len} bytes is below the minimum of {min}")]
    TooSmall { len: usize, min: usize },
    #[error("message of {len} bytes exceeds the maximum of {max}")]
    TooLarge { len: usize, max: usize },
    #[error("message contains the separator sequence")]
    ContainsSeparator,
    #[error("message is not valid UTF-8")]
    NotUtf8,
    #[error("compressed message contains the separator sequence")]
    EncodedContainsSeparator,
    #[error("message ends with the start of the separator sequence")]
    EndsWithSeparatorPrefix,
    #[error("stored payload of {len} bytes cannot fit a bin")]
    StoredTooLarge { len: usize },
    #[error("compression failed: {0}")]
    Compression(#[from] CodecError),
}

impl IngestError {
    /// Whether the producer sent something the service cannot accept, as
    /// opposed to the service failing on a valid body.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, IngestError::Compression(_))
    }

    /// Whether the rejection is about size rather than content.
    pub fn is_size_error(&self) -> bool {
        matches!(
            self,
            IngestError::TooLarge { .. } | IngestError::StoredTooLarge { .. }
        )
    }
}

impl IngestPolicy {
    /// Validate a producer body and produce the payload to push.
    pub fn admit(&self, body: &[u8]) -> Result<Bytes, IngestError> {
        let len = body.len();
        if len < self.min_message_size {
            return Err(IngestError::TooSmall {
                len,
                min: self.min_message_size,
            });
        }
        if len > self.max_message_size {
            return Err(IngestError::TooLarge {
                len,
                max: self.max_message_size,
            });
        }
        if codec::contains(body, &self.separator) {
            return Err(IngestError::ContainsSeparator);
        }

        let stored = match self.compression {
            Compression::None => {
                if std::str::from_utf8(body).is_err() {
                    return Err(IngestError::NotUtf8);
                }
                Bytes::copy_from_slice(body)
            }
            Compression::Gzip => {
                let stored = codec::encode(body, Compression::Gzip)?;
                if codec::contains(&stored, &self.separator) {
                    return Err(IngestError::EncodedContainsSeparator);
                }
                stored
            }
        };

        if codec::overlaps_separator(&stored, &self.separator) {
            return Err(IngestError::EndsWithSeparatorPrefix);
        }
        if stored.len() + self.separator.len() >= self.max_message_size {
            return Err(IngestError::StoredTooLarge { len: stored.len() });
        }
        Ok(stored)
    }
}
