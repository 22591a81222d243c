//! Block codec
//!
//! Blocks are the unit of storage in chanstore. Each block travels as the
//! single attachment of one message, named by its 1-based index in decimal.
//! The container topic records the logical file size, also in decimal.

use crate::error::{ChanstoreError, Result};
use crate::transport::Attachment;
use bytes::Bytes;
use std::fmt;

/// Name of the first block, shared by single-shot and chunked uploads
pub const FIRST_BLOCK: u64 = 1;

/// A numbered slice of a logical file, ready to be sent
#[derive(Clone, PartialEq, Eq)]
pub struct Block {
    /// 1-based position within the file
    pub index: u64,

    /// Raw block payload
    pub data: Bytes,
}

impl Block {
    /// Create a block from its index and payload
    pub fn new(index: u64, data: impl Into<Bytes>) -> Self {
        Self {
            index,
            data: data.into(),
        }
    }

    /// Attachment name carrying this block
    pub fn name(&self) -> String {
        block_name(self.index)
    }

    /// Payload size in bytes
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("index", &self.index)
            .field("size", &self.data.len())
            .finish()
    }
}

/// What an attachment says about the block it carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub index: u64,
    pub size: u64,
}

/// Attachment name for block `index`
pub fn block_name(index: u64) -> String {
    index.to_string()
}

/// Parse an attachment name back into a block index
///
/// Only the canonical decimal form of a positive integer is accepted, so a
/// foreign or renamed attachment is reported instead of misread.
pub fn parse_block_name(name: &str) -> Result<u64> {
    let malformed = || ChanstoreError::MalformedBlockName(name.to_string());

    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    if name.len() > 1 && name.starts_with('0') {
        return Err(malformed());
    }

    match name.parse::<u64>() {
        Ok(0) | Err(_) => Err(malformed()),
        Ok(index) => Ok(index),
    }
}

/// Decode an attachment into its block index and payload size
pub fn decode_attachment(attachment: &Attachment) -> Result<BlockInfo> {
    Ok(BlockInfo {
        index: parse_block_name(&attachment.name)?,
        size: attachment.size,
    })
}

/// Topic value recording a logical file size
pub fn size_topic(size: u64) -> String {
    size.to_string()
}

/// Parse a container topic back into the logical file size
pub fn parse_topic(topic: Option<&str>) -> Result<u64> {
    let topic = topic.unwrap_or_default();
    topic
        .trim()
        .parse::<u64>()
        .map_err(|_| ChanstoreError::MalformedTopic(topic.to_string()))
}

/// Number of blocks a file of `size` bytes occupies
pub fn block_count(size: u64, block_size: u64) -> u64 {
    if block_size == 0 {
        return 0;
    }
    size.div_ceil(block_size)
}

/// Byte offset at which block `index` starts
pub fn block_offset(index: u64, block_size: u64) -> u64 {
    index.saturating_sub(1) * block_size
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(name: &str, size: u64) -> Attachment {
        Attachment {
            name: name.to_string(),
            size,
            url: String::new(),
        }
    }

    #[test]
    fn test_block_name() {
        let block = Block::new(FIRST_BLOCK, Bytes::from_static(b"payload"));
        assert_eq!(block.name(), "1");
        assert_eq!(block.size(), 7);
        assert_eq!(block_name(42), "42");
    }

    #[test]
    fn test_decode_attachment() {
        let info = decode_attachment(&attachment("17", 1024)).unwrap();
        assert_eq!(info, BlockInfo { index: 17, size: 1024 });
    }

    #[test]
    fn test_malformed_block_names() {
        for name in ["", "0", "01", "+1", "-3", "1.5", "block1", "image.png", "99999999999999999999999"] {
            let result = parse_block_name(name);
            assert!(
                matches!(result, Err(ChanstoreError::MalformedBlockName(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_topic() {
        assert_eq!(size_topic(12345), "12345");
        assert_eq!(parse_topic(Some("12345")).unwrap(), 12345);
        assert!(matches!(
            parse_topic(None),
            Err(ChanstoreError::MalformedTopic(_))
        ));
        assert!(matches!(
            parse_topic(Some("big")),
            Err(ChanstoreError::MalformedTopic(_))
        ));
    }

    #[test]
    fn test_block_count() {
        assert_eq!(block_count(1, 10), 1);
        assert_eq!(block_count(9, 10), 1);
        assert_eq!(block_count(10, 10), 1);
        assert_eq!(block_count(11, 10), 2);
        assert_eq!(block_count(107, 10), 11);
        assert_eq!(block_count(5, 0), 0);
    }

    #[test]
    fn test_block_offset() {
        assert_eq!(block_offset(1, 10), 0);
        assert_eq!(block_offset(4, 10), 30);
    }
}
