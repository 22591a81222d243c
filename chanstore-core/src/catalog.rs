//! Catalog operations
//!
//! Resolving logical filenames to containers, listing stored files and
//! removing them.

use crate::codec::parse_topic;
use crate::engine::TransferEngine;
use crate::error::{ChanstoreError, Result};
use crate::naming::file_map;
use crate::transport::{Container, Transport};
use std::collections::BTreeMap;
use tracing::info;

/// A stored file as seen from its container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Logical filename
    pub name: String,
    /// Recorded size, if the topic holds one
    pub size: Option<u64>,
    pub container: Container,
}

impl<'a, T: Transport + ?Sized> TransferEngine<'a, T> {
    /// Every stored file keyed by logical name
    pub async fn files(&self) -> Result<BTreeMap<String, Container>> {
        let containers = self.transport.list_containers().await?;
        Ok(file_map(containers))
    }

    /// Container holding `remote`
    pub async fn find(&self, remote: &str) -> Result<Container> {
        self.files()
            .await?
            .remove(remote)
            .ok_or_else(|| ChanstoreError::NotFound(remote.to_string()))
    }

    /// Every stored file, sorted by name
    pub async fn list(&self) -> Result<Vec<RemoteFile>> {
        Ok(self
            .files()
            .await?
            .into_iter()
            .map(|(name, container)| RemoteFile {
                name,
                size: parse_topic(container.topic.as_deref()).ok(),
                container,
            })
            .collect())
    }

    /// Delete `remote` and all its blocks
    pub async fn remove(&self, remote: &str) -> Result<()> {
        let container = self.find(remote).await?;
        self.transport.delete_container(&container.id).await?;
        info!(remote, container = %container.id, "Removed file");
        Ok(())
    }
}
