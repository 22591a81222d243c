//! Resume inspection
//!
//! No local transfer state is kept: the container is the ledger. The block
//! size a previous upload used is the size of its first attachment, and the
//! last complete block is the newest attachment. Remote reads here are never
//! retried.

use crate::codec::{decode_attachment, size_topic, FIRST_BLOCK};
use crate::error::{ChanstoreError, Result};
use crate::transport::{Container, MessageQuery, Transport};
use tracing::{debug, instrument};

/// Where an interrupted upload continues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePoint {
    /// Block size the upload was started with
    pub block_size: u64,
    /// Index of the last block present on the remote
    pub last_block: u64,
}

impl ResumePoint {
    /// Local byte offset of the first block still to send
    pub fn offset(&self) -> u64 {
        self.last_block * self.block_size
    }

    /// Index of the first block still to send
    pub fn next_block(&self) -> u64 {
        self.last_block + 1
    }
}

/// Work out where an interrupted upload of `local_size` bytes left off
#[instrument(skip(transport, container), fields(container = %container.name))]
pub async fn inspect<T>(
    transport: &T,
    container: &Container,
    local_size: u64,
    max_attachment_size: u64,
) -> Result<ResumePoint>
where
    T: Transport + ?Sized,
{
    let expected_topic = size_topic(local_size);
    let topic = container.topic.as_deref().unwrap_or_default();
    if topic != expected_topic {
        return Err(ChanstoreError::SizeMismatch {
            remote: topic.to_string(),
            local: local_size,
        });
    }

    let oldest = transport
        .list_messages(&container.id, MessageQuery::oldest(1))
        .await?;
    let first = match oldest.as_slice() {
        [message] if message.attachments.len() == 1 => &message.attachments[0],
        _ => return Err(ChanstoreError::CannotInferBlockSize),
    };
    let first = decode_attachment(first)?;
    if first.index != FIRST_BLOCK || first.size == 0 {
        return Err(ChanstoreError::CannotInferBlockSize);
    }

    let block_size = first.size;
    if block_size > max_attachment_size {
        return Err(ChanstoreError::BlockSizeExceedsLimit {
            inferred: block_size,
            max: max_attachment_size,
        });
    }
    debug!(block_size, "Inferred block size");

    // the newest message may be the pin notice for block 1
    let newest = transport
        .list_messages(&container.id, MessageQuery::newest(2))
        .await?;
    let last = newest
        .iter()
        .find_map(|m| m.attachment())
        .ok_or(ChanstoreError::CannotInferLastBlock)?;
    if last.size != block_size {
        return Err(ChanstoreError::IncompleteUploadFromPartialLastBlock {
            size: last.size,
            expected: block_size,
        });
    }
    let last = decode_attachment(last)?;

    let point = ResumePoint {
        block_size,
        last_block: last.index,
    };
    if point.offset() == local_size {
        return Err(ChanstoreError::AlreadyComplete);
    }
    if point.offset() > local_size {
        debug!(
            last_block = point.last_block,
            offset = point.offset(),
            local_size,
            "Remote holds more blocks than the file needs"
        );
        return Err(ChanstoreError::CannotInferLastBlock);
    }

    debug!(last_block = point.last_block, offset = point.offset(), "Resume point");
    Ok(point)
}
