//! Upload path
//!
//! Files no larger than the attachment ceiling go out as a single block.
//! Larger files are cut into blocks of `ceiling - safety margin` bytes. The
//! first block of a fresh upload is pinned as the file's anchor.

use crate::codec::{size_topic, Block, FIRST_BLOCK};
use crate::engine::TransferEngine;
use crate::error::{ChanstoreError, Result};
use crate::naming::encode_filename;
use crate::progress::Progress;
use crate::resume::{inspect, ResumePoint};
use crate::transport::{Container, Message, Transport, TransportError};
use crate::MAX_CONTAINERS;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

/// What to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Local file to read
    pub local: PathBuf,
    /// Logical remote name, defaults to the local file name
    pub remote: Option<String>,
    /// Continue an interrupted upload instead of starting a new one
    pub resume: bool,
}

impl UploadRequest {
    pub fn new(local: impl Into<PathBuf>) -> Self {
        Self {
            local: local.into(),
            remote: None,
            resume: false,
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    pub fn resuming(mut self) -> Self {
        self.resume = true;
        self
    }

    fn remote_name(&self) -> Result<String> {
        if let Some(remote) = &self.remote {
            return Ok(remote.clone());
        }
        self.local
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| ChanstoreError::InvalidFilename(self.local.display().to_string()))
    }
}

/// Outcome of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub remote: String,
    pub size: u64,
    /// Block size used by the file
    pub block_size: u64,
    /// Blocks sent by this invocation
    pub blocks_sent: u64,
    /// Index of the first block sent by this invocation
    pub first_block: u64,
    pub resumed: bool,
}

/// How the file will be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    SingleShot,
    Chunked { block_size: u64, last_sent: u64 },
}

impl<'a, T: Transport + ?Sized> TransferEngine<'a, T> {
    /// Upload a local file, or continue an interrupted upload of it
    pub async fn upload(
        &self,
        request: &UploadRequest,
        progress: &mut dyn Progress,
    ) -> Result<UploadReport> {
        let files = self.files().await?;

        if !request.resume && files.len() >= MAX_CONTAINERS {
            return Err(ChanstoreError::ChannelLimitReached {
                limit: MAX_CONTAINERS,
            });
        }

        let remote = request.remote_name()?;
        let existing = files.get(&remote).cloned();
        match (&existing, request.resume) {
            (Some(_), false) => return Err(ChanstoreError::AlreadyExists(remote)),
            (None, true) => return Err(ChanstoreError::NotFound(remote)),
            _ => {}
        }

        let mut file = File::open(&request.local).await?;
        let size = file.metadata().await?.len();
        if size == 0 {
            return Err(ChanstoreError::EmptyFile(request.local.display().to_string()));
        }

        let max = self.max_attachment_size().await?;

        let fresh = existing.is_none();
        let (container, plan) = match existing {
            Some(container) => {
                let point = inspect(self.transport, &container, size, max).await?;
                file.seek(std::io::SeekFrom::Start(point.offset())).await?;
                (container, resume_plan(point))
            }
            None => {
                let plan = self.fresh_plan(size, max)?;
                let container = self.create(&remote, size).await?;
                (container, plan)
            }
        };

        debug!(remote = %remote, size, ?plan, "Upload plan");

        let sent = match plan {
            Plan::SingleShot => self
                .send_whole(&container, &mut file, size, progress)
                .await
                .map(|()| (size, 1, FIRST_BLOCK)),
            Plan::Chunked {
                block_size,
                last_sent,
            } => self
                .send_blocks(&container, &mut file, size, block_size, last_sent, progress)
                .await
                .map(|sent| (block_size, sent, last_sent + 1)),
        };

        let (block_size, blocks_sent, first_block) = match sent {
            Ok(sent) => sent,
            Err(e) => {
                // a container without block 1 can be neither resumed nor re-created
                if fresh && e.failed_block() == Some(FIRST_BLOCK) {
                    self.discard(&container).await;
                }
                return Err(e);
            }
        };

        let report = UploadReport {
            remote,
            size,
            block_size,
            blocks_sent,
            first_block,
            resumed: request.resume,
        };

        info!(
            remote = %report.remote,
            size = report.size,
            blocks = report.blocks_sent,
            resumed = report.resumed,
            "Upload complete"
        );
        Ok(report)
    }

    fn fresh_plan(&self, size: u64, max: u64) -> Result<Plan> {
        if size <= max {
            return Ok(Plan::SingleShot);
        }

        let margin = self.config.safety_margin;
        match max.checked_sub(margin) {
            Some(block_size) if block_size > 0 => Ok(Plan::Chunked {
                block_size,
                last_sent: 0,
            }),
            _ => Err(ChanstoreError::ChunkTooSmall { max, margin }),
        }
    }

    /// Create the container and record the file size in its topic
    async fn create(&self, remote: &str, size: u64) -> Result<Container> {
        let encoded = encode_filename(remote)?;
        let container = self.transport.create_container(&encoded).await?;

        // resume relies on the topic, but the upload itself does not
        if let Err(e) = self.transport.set_topic(&container.id, &size_topic(size)).await {
            warn!(container = %container.id, error = %e, "Failed to record file size");
        }

        Ok(Container {
            topic: Some(size_topic(size)),
            ..container
        })
    }

    async fn send_whole(
        &self,
        container: &Container,
        file: &mut File,
        size: u64,
        progress: &mut dyn Progress,
    ) -> Result<()> {
        let mut data = Vec::with_capacity(size as usize);
        file.read_to_end(&mut data)
            .await
            .map_err(|source| ChanstoreError::LocalRead {
                block: FIRST_BLOCK,
                source,
            })?;

        progress.start(size, 0);
        let block = Block::new(FIRST_BLOCK, data);
        let message = self.send_block(container, &block).await?;
        self.pin(container, &message).await;
        progress.advance(block.size());
        progress.finish();
        Ok(())
    }

    /// Send blocks after `last_sent` until the file is exhausted
    async fn send_blocks(
        &self,
        container: &Container,
        file: &mut File,
        size: u64,
        block_size: u64,
        last_sent: u64,
        progress: &mut dyn Progress,
    ) -> Result<u64> {
        progress.start(size, last_sent * block_size);

        let mut index = last_sent;
        let mut sent = 0;
        loop {
            index += 1;

            // fresh buffer per block: the sent payload must never alias the next read
            let mut buf = vec![0u8; block_size as usize];
            let n = read_full(file, &mut buf)
                .await
                .map_err(|source| ChanstoreError::LocalRead {
                    block: index,
                    source,
                })? as u64;
            if n == 0 {
                break;
            }
            verify_chunk_size(index, n, block_size)?;
            buf.truncate(n as usize);

            let block = Block::new(index, buf);
            let message = self.send_block(container, &block).await?;
            if index == FIRST_BLOCK {
                self.pin(container, &message).await;
            }
            progress.advance(n);
            sent += 1;

            debug!(block = index, bytes = n, "Block sent");

            if n < block_size {
                break;
            }
        }

        progress.finish();
        Ok(sent)
    }

    /// Send one block, retrying transient failures
    async fn send_block(&self, container: &Container, block: &Block) -> Result<Message> {
        let name = block.name();
        self.config
            .retry
            .run_with_hint(
                "send block",
                |_| {
                    self.transport
                        .send_attachment(&container.id, &name, block.data.clone())
                },
                TransportError::retry_after,
            )
            .await
            .map_err(|e| ChanstoreError::RemoteWrite {
                block: block.index,
                attempts: e.attempts,
                source: e.source,
            })
    }

    /// Drop a container whose upload never got its first block acknowledged
    async fn discard(&self, container: &Container) {
        match self.transport.delete_container(&container.id).await {
            Ok(()) => info!(container = %container.id, "Removed container without blocks"),
            Err(e) => {
                warn!(container = %container.id, error = %e, "Failed to remove container without blocks")
            }
        }
    }

    /// Pin the anchor message; a missing pin only costs convenience
    async fn pin(&self, container: &Container, message: &Message) {
        if let Err(e) = self.transport.pin_message(&container.id, &message.id).await {
            warn!(container = %container.id, message = %message.id, error = %e, "Failed to pin first block");
        }
    }
}

fn resume_plan(point: ResumePoint) -> Plan {
    Plan::Chunked {
        block_size: point.block_size,
        last_sent: point.last_block,
    }
}

/// Reject chunks that are empty or larger than the block size
pub fn verify_chunk_size(block: u64, size: u64, block_size: u64) -> Result<()> {
    if size == 0 || size > block_size {
        return Err(ChanstoreError::ChunkSizeInvalid {
            block,
            size,
            max: block_size,
        });
    }
    Ok(())
}

/// Fill `buf` from `reader`, stopping early only at end of file
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
