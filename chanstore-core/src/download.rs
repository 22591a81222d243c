//! Download path
//!
//! Blocks are listed oldest first, checked for a gapless layout that adds up
//! to the size recorded in the topic, then fetched and written in order.

use crate::codec::{decode_attachment, parse_topic, BlockInfo, FIRST_BLOCK};
use crate::engine::TransferEngine;
use crate::error::{ChanstoreError, Result};
use crate::progress::Progress;
use crate::transport::{Attachment, Container, MessageQuery, Transport};
use crate::PAGE_SIZE;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Outcome of a successful download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub remote: String,
    pub size: u64,
    pub blocks: u64,
}

impl<'a, T: Transport + ?Sized> TransferEngine<'a, T> {
    /// Download `remote` into `dest`
    pub async fn download(
        &self,
        remote: &str,
        dest: &Path,
        overwrite: bool,
        progress: &mut dyn Progress,
    ) -> Result<DownloadReport> {
        let container = self.find(remote).await?;
        let size = parse_topic(container.topic.as_deref())?;

        let blocks = self.block_list(&container).await?;
        let infos = blocks
            .iter()
            .map(decode_attachment)
            .collect::<Result<Vec<_>>>()?;
        verify_layout(&infos, size)?;

        if dest.exists() && !overwrite {
            return Err(ChanstoreError::AlreadyExists(dest.display().to_string()));
        }

        // blocks land in a sibling file that only replaces dest once complete
        let partial = partial_path(dest);
        progress.start(size, 0);
        if let Err(e) = self.write_blocks(&partial, &blocks, &infos, progress).await {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial download");
            }
            return Err(e);
        }
        tokio::fs::rename(&partial, dest).await?;
        progress.finish();

        info!(remote, size, blocks = infos.len(), "Download complete");
        Ok(DownloadReport {
            remote: remote.to_string(),
            size,
            blocks: infos.len() as u64,
        })
    }

    async fn write_blocks(
        &self,
        path: &Path,
        blocks: &[Attachment],
        infos: &[BlockInfo],
        progress: &mut dyn Progress,
    ) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await?;

        for (attachment, info) in blocks.iter().zip(infos) {
            let data = self.transport.fetch_attachment(attachment).await?;
            if data.len() as u64 != info.size {
                return Err(ChanstoreError::BlockSizeInconsistent {
                    block: info.index,
                    size: data.len() as u64,
                    expected: info.size,
                });
            }
            file.write_all(&data)
                .await
                .map_err(|source| ChanstoreError::LocalWrite {
                    block: info.index,
                    source,
                })?;
            progress.advance(info.size);
            debug!(block = info.index, bytes = info.size, "Block received");
        }
        file.flush().await?;
        Ok(())
    }

    /// Every block attachment in a container, oldest first
    ///
    /// Messages without attachments, such as pin notices, are skipped.
    pub async fn block_list(&self, container: &Container) -> Result<Vec<Attachment>> {
        let mut blocks = Vec::new();
        let mut query = MessageQuery::oldest(PAGE_SIZE);

        loop {
            let page = self.transport.list_messages(&container.id, query).await?;
            let Some(last) = page.last() else {
                break;
            };
            let last_id = last.id.clone();
            let full = page.len() >= PAGE_SIZE;

            blocks.extend(page.into_iter().flat_map(|m| m.attachments));

            if !full {
                break;
            }
            query = MessageQuery::after(last_id, PAGE_SIZE);
        }

        Ok(blocks)
    }
}

/// Where a download into `dest` is written until it completes
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Check that blocks run 1..=n without gaps, that every block but the last
/// has the first block's size, and that the sizes add up to `size`
///
/// Returns the block size.
pub fn verify_layout(blocks: &[BlockInfo], size: u64) -> Result<u64> {
    let Some(first) = blocks.first() else {
        return Err(ChanstoreError::SizeVerification {
            expected: size,
            actual: 0,
        });
    };
    let block_size = first.size;

    let mut total: u64 = 0;
    for (i, block) in blocks.iter().enumerate() {
        let expected = FIRST_BLOCK + i as u64;
        if block.index != expected {
            return Err(ChanstoreError::BlockGap {
                expected,
                found: block.index,
            });
        }

        let is_last = i + 1 == blocks.len();
        let too_big = block.size > block_size;
        if block.size == 0 || too_big || (!is_last && block.size != block_size) {
            return Err(ChanstoreError::BlockSizeInconsistent {
                block: block.index,
                size: block.size,
                expected: block_size,
            });
        }
        total = total.saturating_add(block.size);
    }

    if total != size {
        return Err(ChanstoreError::SizeVerification {
            expected: size,
            actual: total,
        });
    }
    Ok(block_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infos(sizes: &[u64]) -> Vec<BlockInfo> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| BlockInfo {
                index: i as u64 + 1,
                size,
            })
            .collect()
    }

    #[test]
    fn test_verify_layout() {
        assert_eq!(verify_layout(&infos(&[10, 10, 3]), 23).unwrap(), 10);
        assert_eq!(verify_layout(&infos(&[7]), 7).unwrap(), 7);
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/tmp/out/data.bin")),
            PathBuf::from("/tmp/out/data.bin.part")
        );
        assert_eq!(partial_path(Path::new("notes")), PathBuf::from("notes.part"));
    }

    #[test]
    fn test_verify_layout_gap() {
        let mut blocks = infos(&[10, 10, 10]);
        blocks.remove(1);
        assert!(matches!(
            verify_layout(&blocks, 20),
            Err(ChanstoreError::BlockGap { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn test_verify_layout_inconsistent_size() {
        assert!(matches!(
            verify_layout(&infos(&[10, 4, 10]), 24),
            Err(ChanstoreError::BlockSizeInconsistent { block: 2, .. })
        ));
        assert!(matches!(
            verify_layout(&infos(&[10, 12]), 22),
            Err(ChanstoreError::BlockSizeInconsistent { block: 2, .. })
        ));
    }

    #[test]
    fn test_verify_layout_size_mismatch() {
        assert!(matches!(
            verify_layout(&infos(&[10, 10]), 25),
            Err(ChanstoreError::SizeVerification { expected: 25, actual: 20 })
        ));
        assert!(matches!(
            verify_layout(&[], 5),
            Err(ChanstoreError::SizeVerification { actual: 0, .. })
        ));
    }
}
